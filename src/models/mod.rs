// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod document;
pub mod location;

pub use document::{DisasterRecord, Document};
pub use location::{Location, LocationLookup};
