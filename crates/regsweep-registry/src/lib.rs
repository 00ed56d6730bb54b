//! # Regsweep Registry
//!
//! Registry client used by regsweep to inventory and prune image tags.
//!
//! The crate exposes two things:
//!
//! - [`RegistryApi`] - the narrow contract the cleanup core depends on
//!   (list projects, repositories, tags and access logs; delete a tag;
//!   pull and push manifests).
//! - [`HarborClient`] - an HTTP implementation of that contract for
//!   Harbor-style registries, with session login, periodic credential
//!   refresh and registry v2 bearer-token challenges.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use regsweep_registry::{HarborClient, RegistryApi, RegistryAuth, RegistryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RegistryConfig::new("https://harbor.example.com")
//!         .with_version("1.7")
//!         .with_auth(RegistryAuth::basic("admin", "secret"));
//!
//!     let client = HarborClient::connect(config).await?;
//!     let projects = client.list_all_projects(None, None).await?;
//!     println!("{} projects", projects.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HarborClient                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  /api/...   │  │  Session    │  │  /v2 manifests      │  │
//! │  │  (paged)    │  │  cookies    │  │  (bearer tokens)    │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Harbor registry                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod api;
mod client;
mod config;
mod error;
mod oci;
mod types;

pub use api::RegistryApi;
pub use client::HarborClient;
pub use config::{RegistryAuth, RegistryConfig, TlsConfig};
pub use error::{RegistryError, Result};
pub use oci::{compute_digest, MediaType};
pub use types::{split_repository, AccessLogEntry, Project, PulledManifest, RegistryTag, Repository};
