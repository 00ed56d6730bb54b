//! HTTP client for Harbor-style registries.
//!
//! Project, repository, tag and access-log listings use the registry's
//! management API (`/api/...`) behind a session cookie. Manifests are pulled
//! and pushed through the registry v2 API, answering bearer-token challenges
//! with the configured credentials.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::{
    HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE, WWW_AUTHENTICATE,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::RegistryApi;
use crate::config::{RegistryAuth, RegistryConfig};
use crate::error::{RegistryError, Result};
use crate::oci::{compute_digest, ErrorResponse, MediaType};
use crate::types::{AccessLogEntry, Project, PulledManifest, RegistryTag, Repository};

/// Largest page size the management API accepts.
const MAX_PAGE_SIZE: usize = 500;

/// Response header carrying the total item count of a paged listing.
const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

/// Response header carrying a manifest's content digest.
const CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Client for a Harbor-style registry.
///
/// Share it behind an [`Arc`]: the session cookie and the bearer-token cache
/// are internally synchronized so the background refresh loop and the
/// cleanup run can use the same client.
#[derive(Debug)]
pub struct HarborClient {
    config: RegistryConfig,
    http: reqwest::Client,
    session: RwLock<Option<HeaderValue>>,
    tokens: RwLock<HashMap<String, String>>,
}

impl HarborClient {
    /// Creates a client without logging in.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use regsweep_registry::{HarborClient, RegistryConfig};
    ///
    /// let config = RegistryConfig::new("https://harbor.example.com");
    /// let client = HarborClient::new(config)?;
    /// # Ok::<(), regsweep_registry::RegistryError>(())
    /// ```
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let http = Self::build_http_client(&config)?;

        Ok(Self {
            config,
            http,
            session: RwLock::new(None),
            tokens: RwLock::new(HashMap::new()),
        })
    }

    /// Creates a client and establishes a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the login
    /// is rejected.
    pub async fn connect(config: RegistryConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.login().await?;
        tracing::info!(url = %client.config.url, "Registry session established");
        Ok(client)
    }

    /// Returns the registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Logs in and replaces the session cookie.
    ///
    /// Does nothing when no credentials are configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry rejects the credentials or does not
    /// answer like a Harbor instance.
    pub async fn login(&self) -> Result<()> {
        let RegistryAuth::Basic { username, password } = &self.config.auth else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.config.login_url())
            .query(&[("principal", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        let cookie = session_cookie(&response);
        let body = response.text().await.unwrap_or_default();

        if status != StatusCode::OK {
            return Err(RegistryError::AuthenticationFailed {
                message: format!("login returned {status}: {}", body.trim()),
            });
        }

        // A 200 without a session cookie (or with a body) means the host is
        // not a Harbor instance.
        let cookie = match cookie {
            Some(cookie) if body.is_empty() => cookie,
            _ => {
                return Err(RegistryError::AuthenticationFailed {
                    message: format!("{} is not a valid registry", self.config.url),
                })
            }
        };

        *self.session.write() = Some(cookie);
        self.tokens.write().clear();
        Ok(())
    }

    /// Spawns the background loop that re-establishes the session every
    /// [`RegistryConfig::refresh_interval`] until `shutdown` turns true.
    pub fn spawn_refresh_loop(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let period = client.config.refresh_interval;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match client.login().await {
                            Ok(()) => tracing::info!(url = %client.config.url, "Registry session refreshed"),
                            Err(e) => tracing::error!(error = %e, "Refresh registry session failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("Shutdown requested, session refresh loop exiting");
                            return;
                        }
                    }
                }
            }
        })
    }

    /// Sends a management API request with the session cookie attached.
    ///
    /// A 401 or 5xx answer triggers an on-demand session refresh and is
    /// returned as an error.
    async fn send_api(&self, method: Method, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}{path}", self.config.url);
        tracing::debug!(%method, %url, "Registry API request");

        let mut request = self.http.request(method, &url).query(query);
        let session = self.session.read().clone();
        if let Some(cookie) = session {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            let err = RegistryError::HttpError {
                status: status.as_u16(),
                message,
            };
            tracing::error!(error = %err, "Unexpected registry answer, refreshing session");
            if let Err(refresh) = self.login().await {
                tracing::error!(error = %refresh, "Refresh registry session failed");
            }
            return Err(err);
        }

        Ok(response)
    }

    /// Fetches one page of a listing, returning the items and the total
    /// count advertised by the registry.
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
        page: usize,
    ) -> Result<(Vec<T>, Option<usize>)> {
        query.push(("page", page.to_string()));
        query.push(("page_size", MAX_PAGE_SIZE.to_string()));

        let response = self.send_api(Method::GET, path, &query).await?;
        let response = error_for_status(response, path).await?;

        let total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        let items: Vec<T> = response.json().await?;

        Ok((items, total))
    }

    /// Walks every page of a listing.
    async fn get_all<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let (batch, total) = self.get_page::<T>(path, query.to_vec(), page).await?;
            let short_page = batch.len() < MAX_PAGE_SIZE;
            items.extend(batch);

            let done = total.map_or(short_page, |total| total <= page * MAX_PAGE_SIZE);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }

    /// Sends a registry v2 request, answering a bearer challenge once.
    async fn send_v2<F>(&self, scope: &str, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let cached = self.tokens.read().get(scope).cloned();
        let mut request = build(&self.http);
        if let Some(token) = &cached {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(BearerChallenge::parse)
        else {
            return Ok(response);
        };

        let token = self.fetch_token(&challenge, scope).await?;
        self.tokens.write().insert(scope.to_string(), token.clone());

        build(&self.http).bearer_auth(token).send().await.map_err(Into::into)
    }

    /// Requests a bearer token from the challenge's realm.
    async fn fetch_token(&self, challenge: &BearerChallenge, scope: &str) -> Result<String> {
        let mut query = Vec::new();
        if let Some(service) = &challenge.service {
            query.push(("service", service.as_str()));
        }
        query.push(("scope", challenge.scope.as_deref().unwrap_or(scope)));

        let mut request = self.http.get(&challenge.realm).query(&query);
        if let RegistryAuth::Basic { username, password } = &self.config.auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RegistryError::AuthenticationFailed {
                message: format!(
                    "token request to {} returned {}",
                    challenge.realm,
                    response.status()
                ),
            });
        }

        let token: TokenResponse = response.json().await?;
        token
            .token
            .or(token.access_token)
            .ok_or_else(|| RegistryError::InvalidResponse {
                message: "token response carries no token".to_string(),
            })
    }

    /// Builds the HTTP client with proper configuration.
    fn build_http_client(config: &RegistryConfig) -> Result<reqwest::Client> {
        if url::Url::parse(&config.url).is_err() {
            return Err(RegistryError::InvalidUrl {
                url: config.url.clone(),
            });
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);

        if let Some(ref tls) = config.tls {
            if tls.insecure_skip_verify {
                builder = builder.danger_accept_invalid_certs(true);
            }

            if let Some(ref ca_cert) = tls.ca_cert {
                let cert_pem = std::fs::read(ca_cert).map_err(|e| RegistryError::IoError {
                    path: ca_cert.clone(),
                    source: e,
                })?;
                let cert = reqwest::Certificate::from_pem(&cert_pem).map_err(|e| {
                    RegistryError::InvalidResponse {
                        message: format!("Invalid CA certificate: {e}"),
                    }
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }

        builder.build().map_err(|e| RegistryError::ConnectionFailed {
            url: config.url.clone(),
            source: e,
        })
    }
}

#[async_trait]
impl RegistryApi for HarborClient {
    async fn list_all_projects(
        &self,
        name: Option<&str>,
        public: Option<bool>,
    ) -> Result<Vec<Project>> {
        let query = vec![
            ("name", name.unwrap_or_default().to_string()),
            ("public", public.map(|p| p.to_string()).unwrap_or_default()),
        ];
        self.get_all("/api/projects", &query).await
    }

    async fn list_all_repositories(&self, project_id: i64) -> Result<Vec<Repository>> {
        let query = vec![("project_id", project_id.to_string()), ("q", String::new())];
        self.get_all("/api/repositories", &query).await
    }

    async fn list_tags(&self, project: &str, repository: &str) -> Result<Vec<RegistryTag>> {
        let path = format!("/api/repositories/{project}/{repository}/tags");
        let response = self.send_api(Method::GET, &path, &[]).await?;
        let response = error_for_status(response, &path).await?;

        let mut tags: Vec<RegistryTag> = response.json().await?;
        tags.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(tags)
    }

    async fn delete_tag(&self, project: &str, repository: &str, tag: &str) -> Result<()> {
        let path = format!("/api/repositories/{project}/{repository}/tags/{tag}");
        let response = self.send_api(Method::DELETE, &path, &[]).await?;
        error_for_status(response, &path).await?;

        tracing::debug!(project, repository, tag, "Deleted tag");
        Ok(())
    }

    async fn pull_manifest(
        &self,
        repository: &str,
        reference: &str,
        accept: &[&str],
    ) -> Result<PulledManifest> {
        let url = format!("{}/v2/{repository}/manifests/{reference}", self.config.url);
        let scope = format!("repository:{repository}:pull");
        let accept = accept.join(", ");

        let response = self
            .send_v2(&scope, |http| http.get(&url).header(ACCEPT, accept.as_str()))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound {
                resource: format!("manifest {repository}@{reference}"),
            });
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::ManifestPullFailed {
                repository: repository.to_string(),
                reference: reference.to_string(),
                message: format!("{status}: {}", ErrorResponse::describe(&body)),
            });
        }

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| MediaType::new(MediaType::DOCKER_SCHEMA2), MediaType::normalize);
        let digest = header_string(&response, CONTENT_DIGEST_HEADER);
        let payload = response.bytes().await?.to_vec();
        let digest = digest.unwrap_or_else(|| compute_digest(&payload));

        Ok(PulledManifest {
            digest,
            media_type,
            payload,
        })
    }

    async fn push_manifest(
        &self,
        repository: &str,
        tag: &str,
        media_type: &str,
        payload: &[u8],
    ) -> Result<String> {
        let url = format!("{}/v2/{repository}/manifests/{tag}", self.config.url);
        let scope = format!("repository:{repository}:pull,push");

        let response = self
            .send_v2(&scope, |http| {
                http.put(&url)
                    .header(CONTENT_TYPE, media_type)
                    .body(payload.to_vec())
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::ManifestPushFailed {
                repository: repository.to_string(),
                tag: tag.to_string(),
                message: format!("{status}: {}", ErrorResponse::describe(&body)),
            });
        }

        Ok(header_string(&response, CONTENT_DIGEST_HEADER).unwrap_or_else(|| compute_digest(payload)))
    }

    async fn list_access_logs(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AccessLogEntry>> {
        let query = vec![
            ("begin_timestamp", start.timestamp().to_string()),
            ("end_timestamp", end.timestamp().to_string()),
            ("operation", String::new()),
        ];

        // The log endpoint does not advertise a total; stop on a short page.
        let mut logs = Vec::new();
        let mut page = 1;
        loop {
            let (batch, _) = self
                .get_page::<AccessLogEntry>("/api/logs", query.clone(), page)
                .await?;
            let short_page = batch.len() < MAX_PAGE_SIZE;
            logs.extend(batch);
            if short_page {
                return Ok(logs);
            }
            page += 1;
        }
    }
}

/// Maps non-2xx management API answers to errors.
async fn error_for_status(response: Response, path: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(RegistryError::NotFound {
            resource: path.to_string(),
        });
    }
    Err(RegistryError::HttpError {
        status: status.as_u16(),
        message,
    })
}

fn header_string(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Collapses `Set-Cookie` headers into a single `Cookie` header value.
fn session_cookie(response: &Response) -> Option<HeaderValue> {
    let pairs: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    if pairs.is_empty() {
        return None;
    }
    HeaderValue::from_str(&pairs.join("; ")).ok()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Parsed `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

impl BearerChallenge {
    fn parse(header: &str) -> Option<Self> {
        let params = header.trim().strip_prefix("Bearer ")?;
        let mut values: HashMap<String, String> = HashMap::new();

        // Quoted values may contain commas (`scope="repository:x:pull,push"`).
        let mut key = String::new();
        let mut value = String::new();
        let mut in_value = false;
        let mut quoted = false;
        for c in params.chars() {
            match c {
                '"' if in_value => quoted = !quoted,
                '=' if !in_value => in_value = true,
                ',' if !quoted => {
                    values.insert(key.trim().to_ascii_lowercase(), value.clone());
                    key.clear();
                    value.clear();
                    in_value = false;
                }
                _ if in_value => value.push(c),
                _ => key.push(c),
            }
        }
        if !key.trim().is_empty() {
            values.insert(key.trim().to_ascii_lowercase(), value);
        }

        Some(Self {
            realm: values.remove("realm")?,
            service: values.remove("service"),
            scope: values.remove("scope"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;

    #[test]
    fn test_client_creation() {
        let config = RegistryConfig::new("https://harbor.example.com");
        let client = HarborClient::new(config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_rejects_invalid_url() {
        let mut config = RegistryConfig::new("https://harbor.example.com");
        config.url = "http://".to_string();
        let err = HarborClient::new(config).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidUrl { .. }));
    }

    #[test]
    fn test_missing_ca_bundle_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.pem");
        let config = RegistryConfig::new("https://harbor.example.com")
            .with_tls(TlsConfig::new().with_ca_cert(&path));

        let err = HarborClient::new(config).unwrap_err();
        assert!(matches!(err, RegistryError::IoError { path: ref p, .. } if *p == path));
    }

    #[tokio::test]
    async fn test_login_without_credentials_is_noop() {
        let config = RegistryConfig::new("https://harbor.example.com");
        let client = HarborClient::new(config).unwrap();
        client.login().await.unwrap();
        assert!(client.session.read().is_none());
    }

    #[test]
    fn test_parse_bearer_challenge() {
        let header = r#"Bearer realm="https://harbor.example.com/service/token",service="harbor-registry",scope="repository:library/nginx:pull,push""#;
        let challenge = BearerChallenge::parse(header).unwrap();

        assert_eq!(challenge.realm, "https://harbor.example.com/service/token");
        assert_eq!(challenge.service.as_deref(), Some("harbor-registry"));
        assert_eq!(
            challenge.scope.as_deref(),
            Some("repository:library/nginx:pull,push")
        );
    }

    #[test]
    fn test_parse_bearer_challenge_requires_realm() {
        assert!(BearerChallenge::parse(r#"Bearer service="registry""#).is_none());
        assert!(BearerChallenge::parse(r#"Basic realm="registry""#).is_none());
    }
}
