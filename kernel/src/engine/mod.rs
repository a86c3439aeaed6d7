//! Provides engine implementations that implement the required traits. See the [`default`] module
//! for an engine backed by the [object_store] crate.

pub mod default;
