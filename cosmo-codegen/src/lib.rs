//! Cosmo Code Generation
//!
//! This crate turns a model description into fixed-form solver source.
//! It includes:
//! - An expression tokenizer and a fixed-form line builder
//! - The potential transformer (literal tagging, assignment prefix, wrapping)
//! - Parameter extraction, validation and substitution
//! - Include fragment rendering (potential, initial conditions, metric)
//! - Byte-exact patching of the solver template's field count

pub mod fixed_form;
pub mod includes;
pub mod lexer;
pub mod params;
pub mod template;
pub mod transform;

pub use fixed_form::{COLUMN_WIDTH, LineBuilder};
pub use includes::GeneratedSources;
pub use params::{extract_symbols, substitute, validate_parameters};
pub use template::{PREPARED_SOURCE, PrepareError, PrepareWarning, Prepared, prepare, prepare_file};
pub use transform::{DEFAULT_POTENTIAL, transform_metric_expression, transform_potential};
