//! JSON helpers shared by requests and providers.
//!
//! # Responsibilities
//! - Address fields inside resource content (`JsonPointer`)
//! - Describe and apply partial modifications (`PatchOperation`)
//! - Parse and render query predicates (`QueryFilter`)
//! - Parse sort directives (`SortKey`)
//!
//! # Design Decisions
//! - Documents are plain `serde_json::Value`; no wrapper type
//! - Parse failures surface as `ResourceError::BadRequest`

pub mod patch;
pub mod pointer;
pub mod query_filter;
pub mod sort_key;

pub use patch::{apply_patch, PatchOp, PatchOperation};
pub use pointer::JsonPointer;
pub use query_filter::QueryFilter;
pub use sort_key::SortKey;
