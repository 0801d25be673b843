//! Shared domain types and client-less behavior for the resource provider's
//! reconciliation framework.
//!
//! This crate has no I/O: it defines the canonical [`resource_id::ResourceId`], the
//! [`resource::Resource`] trait every stored kind implements, and the worked-example
//! domain entities (§3) that `rp-client`, `rp-runtime`, and `rp-controllers` build on.

pub mod entities;
pub mod error;
pub mod metadata;
pub mod resource;
pub mod resource_id;

pub use error::CoreError;
pub use metadata::CosmosMetadata;
pub use resource::{Resource, ResourceKind};
pub use resource_id::ResourceId;
