// file: src/geo/mod.rs
// description: location resolver module exports
// reference: internal module structure

pub mod resolver;

pub use resolver::{IpInfoResolver, LocationResolver, NoopLocationResolver};
