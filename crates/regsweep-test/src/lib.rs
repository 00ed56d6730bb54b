//! # Regsweep Test
//!
//! Test support for regsweep.
//!
//! - [`MockRegistry`] - an in-memory [`RegistryApi`](regsweep_registry::RegistryApi)
//!   that can emulate registries whose delete-by-tag removes every tag of
//!   the same digest, inject failures, and journal every call.
//! - [`fixtures`] - timestamps and manifest payloads for building scenarios.
//!
//! ## Example
//!
//! ```rust
//! use regsweep_test::{fixtures, MockRegistry};
//!
//! let registry = MockRegistry::new();
//! let digest = registry.add_image("library/nginx", "1.25", "nginx-1.25", fixtures::hours_ago(2));
//! registry.tag_image("library/nginx", "stable", &digest, fixtures::hours_ago(1));
//!
//! assert_eq!(registry.tags("library/nginx"), vec!["stable", "1.25"]);
//! ```

pub mod fixtures;
mod mock_registry;

pub use mock_registry::{DeleteSemantics, MockRegistry, RegistryCall};
