//! Observation-block manifest model and association resolver.
//!
//! The manifest is a small typed tree; queries walk it by category sequence
//! rather than by a textual query language.
mod resolve;
mod types;

pub use resolve::{
    resolve_category, resolve_distortion_map, resolve_standard_associations, Axis,
    DistortionSource,
};
pub use types::{load_manifest, Association, Category, Manifest};
