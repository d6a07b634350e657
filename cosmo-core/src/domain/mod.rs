//! Core domain types
//!
//! Shared between the runner (which produces jobs and results) and the
//! HTTP surface and client (which expose and consume them).

pub mod job;
pub mod model;
