//! Cosmo Core
//!
//! Core types shared by the Cosmo solver services.
//!
//! This crate contains:
//! - Domain types: jobs, execution results and the validated model input
//! - DTOs: the wire shapes exchanged between the HTTP surface and its clients

pub mod domain;
pub mod dto;
