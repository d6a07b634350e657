//! Data Transfer Objects
//!
//! Wire shapes exchanged between the HTTP surface and its clients.
//! Field names are camelCase to stay compatible with the browser front end.

pub mod job;
