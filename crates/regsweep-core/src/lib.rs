//! # Regsweep Core
//!
//! Retention policies and digest-safe tag cleanup for container registries.
//!
//! - [`policy`] - the `number`, `regex` and `recentlyNotTouched` retention
//!   policies behind the [`RetentionPolicy`] trait
//! - [`protection`] - finds retained tags that share a digest with a
//!   candidate and would vanish with it
//! - [`RepositoryCleaner`] - protect, delete and restore for one repository
//! - [`Sweeper`] - plans a run and executes it across repositories
//! - [`CronScheduler`] - single-flight cron trigger
//! - [`SweepConfig`] - YAML configuration
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use regsweep_core::{PolicyConfig, Sweeper};
//! use regsweep_test::{fixtures, MockRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = Arc::new(MockRegistry::new());
//! registry.add_image("library/app", "v1", "app-v1", fixtures::hours_ago(3));
//! registry.add_image("library/app", "v2", "app-v2", fixtures::hours_ago(2));
//!
//! let sweeper = Sweeper::new(registry.clone(), Vec::new(), PolicyConfig::number(1));
//! let result = sweeper.clean().await.unwrap();
//!
//! assert_eq!(result.deleted, 1);
//! assert_eq!(registry.tags("library/app"), vec!["v2"]);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cleaner;
pub mod config;
pub mod error;
pub mod inventory;
pub mod model;
pub mod policy;
pub mod protection;
pub mod retain;
pub mod scheduler;
pub mod sweeper;

pub use cleaner::RepositoryCleaner;
pub use config::{PolicyConfig, SweepConfig, DEFAULT_CONFIG_PATH};
pub use error::{Result, SweepError};
pub use model::{Candidate, DryRunSummary, ProtectedManifest, RepoTagSet, RunResult, Tag};
pub use policy::{build_policy, PolicyType, RetentionPolicy};
pub use retain::RetainPatterns;
pub use scheduler::{Cadence, CronScheduler, TickOutcome};
pub use sweeper::Sweeper;
