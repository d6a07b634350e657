//! Model input domain types
//!
//! The validated description of one solver run: the potential expression,
//! the field vectors, parameter values, an optional metric and the scalar
//! tuning knobs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Input rejected before a job is created
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("fieldValues is missing or empty")]
    MissingFieldValues,

    #[error("fieldVelocities is missing or empty")]
    MissingFieldVelocities,

    #[error("fieldValues size ({values}) != fieldVelocities size ({velocities})")]
    LengthMismatch { values: usize, velocities: usize },

    #[error("Missing parameter values for: {}", .0.join(", "))]
    MissingParameters(Vec<String>),
}

/// Parameter symbol table
///
/// Lookup is case-insensitive: names are folded to lowercase on insert, so
/// `A` and `a` share a slot and the last write wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    entries: BTreeMap<String, f64>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: f64) {
        self.entries.insert(name.as_ref().to_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.get(&name.to_lowercase()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Iterates `(lowercase name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>> FromIterator<(K, f64)> for ParameterTable {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, value) in iter {
            table.insert(name, value);
        }
        table
    }
}

/// Initial field values and velocities
///
/// Both vectors are non-empty and of equal length; that length is the
/// field count `nf` patched into the solver template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVectors {
    values: Vec<f64>,
    velocities: Vec<f64>,
}

impl FieldVectors {
    pub fn new(values: Vec<f64>, velocities: Vec<f64>) -> Result<Self, ValidationError> {
        if values.is_empty() {
            return Err(ValidationError::MissingFieldValues);
        }
        if velocities.is_empty() {
            return Err(ValidationError::MissingFieldVelocities);
        }
        if values.len() != velocities.len() {
            return Err(ValidationError::LengthMismatch {
                values: values.len(),
                velocities: velocities.len(),
            });
        }
        Ok(Self { values, velocities })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn velocities(&self) -> &[f64] {
        &self.velocities
    }

    pub fn field_count(&self) -> usize {
        self.values.len()
    }
}

/// One cell of the metric table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricCell {
    Blank,
    Constant(f64),
    Expression(String),
}

impl MetricCell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return MetricCell::Blank;
        }
        match parse_fortran_number(trimmed) {
            Some(value) => MetricCell::Constant(value),
            None => MetricCell::Expression(trimmed.to_string()),
        }
    }
}

/// Field-space metric, indexed from zero here and from one in generated code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    rows: Vec<Vec<MetricCell>>,
}

impl MetricSpec {
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|c| MetricCell::parse(c.as_ref())).collect())
            .collect();
        Self { rows }
    }

    pub fn cell(&self, i: usize, j: usize) -> Option<&MetricCell> {
        self.rows.get(i).and_then(|row| row.get(j))
    }

    /// Constant value of cell `(i, j)`, falling back to the identity
    pub fn constant_or_identity(&self, i: usize, j: usize) -> f64 {
        match self.cell(i, j) {
            Some(MetricCell::Constant(value)) => *value,
            _ => identity(i, j),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn identity(i: usize, j: usize) -> f64 {
    if i == j { 1.0 } else { 0.0 }
}

/// Scalar integration knobs forwarded alongside the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParameters {
    pub initial_time: f64,
    pub time_step: f64,
    pub kstar: f64,
    pub cq: f64,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            initial_time: 0.0,
            time_step: 0.05,
            kstar: 0.05,
            cq: 100.0,
        }
    }
}

/// Shape-validated description of one run
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    /// Raw potential; `None` selects the built-in default potential
    pub potential_expression: Option<String>,
    pub fields: FieldVectors,
    pub parameters: ParameterTable,
    pub metric: Option<MetricSpec>,
    pub tuning: TuningParameters,
}

/// Parses a numeric literal, accepting Fortran `d`/`D` exponents
pub fn parse_fortran_number(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|c| if c == 'd' || c == 'D' { 'e' } else { c })
        .collect();
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
