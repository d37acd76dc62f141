//! services/api/src/lib.rs
//!
//! The library crate behind the `api` binary: configuration, the concrete
//! adapters for the core ports, the lesson pipeline, and the web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod lesson;
pub mod web;
