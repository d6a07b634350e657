//! Include fragments
//!
//! The solver template pulls four generated fragments in at compile time.
//! Each one is rendered here as plain text and written next to the template.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use cosmo_core::domain::model::{MetricCell, MetricSpec, ModelInput};
use tracing::info;

use crate::fixed_form::LineBuilder;
use crate::params::substitute;
use crate::transform::{METRIC_PREFIX, transform_metric_expression, transform_potential};

pub const POTENTIAL_INC: &str = "potential.inc";
pub const INITIAL_CONDITIONS_INC: &str = "initial_conditions.inc";
pub const METRIC_INC: &str = "metric.inc";
pub const METRIC_FUNCTION_INC: &str = "metric_function.inc";

/// Rendered include fragments for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSources {
    pub potential: String,
    pub initial_conditions: String,
    pub metric: String,
    pub metric_function: String,
}

impl GeneratedSources {
    pub fn generate(model: &ModelInput) -> Self {
        let field_count = model.fields.field_count();

        let potential = model
            .potential_expression
            .as_deref()
            .map(|expr| substitute(expr, &model.parameters));

        Self {
            potential: finish(transform_potential(potential.as_deref())),
            initial_conditions: initial_conditions(model.fields.values()),
            metric: metric_table(model.metric.as_ref(), field_count),
            metric_function: metric_function(model.metric.as_ref(), field_count),
        }
    }

    /// Writes every fragment into `dir`, replacing previous ones
    pub fn write_to(&self, dir: &Path) -> io::Result<()> {
        for (name, contents) in self.files() {
            let path = dir.join(name);
            std::fs::write(&path, contents)?;
            info!("Wrote {}", path.display());
        }
        Ok(())
    }

    pub fn files(&self) -> [(&'static str, &str); 4] {
        [
            (POTENTIAL_INC, &self.potential),
            (INITIAL_CONDITIONS_INC, &self.initial_conditions),
            (METRIC_INC, &self.metric),
            (METRIC_FUNCTION_INC, &self.metric_function),
        ]
    }
}

/// Terminates the last statement and appends the trailing blank line
fn finish(mut body: String) -> String {
    body.push_str("\n\n");
    body
}

fn initial_conditions(values: &[f64]) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        let _ = writeln!(out, "      x({})={:.15}", i + 1, value);
    }
    out.push('\n');
    out
}

fn metric_table(metric: Option<&MetricSpec>, n: usize) -> String {
    let mut out = String::new();
    for i in 0..n {
        for j in 0..n {
            let value = match metric {
                Some(metric) => metric.constant_or_identity(i, j),
                None => cosmo_core::domain::model::identity(i, j),
            };
            let _ = writeln!(out, "      metric_matrix({},{})={:.15}d0", i + 1, j + 1, value);
        }
    }
    out.push('\n');
    out
}

fn metric_function(metric: Option<&MetricSpec>, n: usize) -> String {
    let Some(metric) = metric.filter(|m| !m.is_empty()) else {
        return "      ! No functional metric provided; using metric_matrix(i,j)\n\n".to_string();
    };

    let builder = LineBuilder::new(METRIC_PREFIX);
    let mut out = String::new();

    for i in 0..n {
        let keyword = if i == 0 { "if" } else { "else if" };
        let _ = writeln!(out, "      {} (i.eq.{}) then", keyword, i + 1);

        let mut wrote_any = false;
        for j in 0..n {
            let expr = match metric.cell(i, j) {
                None | Some(MetricCell::Blank) => continue,
                Some(MetricCell::Constant(value)) => format!("{:.15}d0", value),
                Some(MetricCell::Expression(expr)) => transform_metric_expression(expr),
            };

            let keyword = if wrote_any { "else if" } else { "if" };
            let _ = writeln!(out, "       {} (j.eq.{}) then", keyword, j + 1);
            for line in builder.wrap(&expr) {
                let _ = writeln!(out, "{}", line);
            }
            wrote_any = true;
        }

        if wrote_any {
            out.push_str("       endif\n");
        }
    }

    out.push_str("      endif\n\n");
    out
}
