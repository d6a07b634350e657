//! Submission building
//!
//! A request is read from an optional JSON file and then overridden field by
//! field with whatever was given on the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use cosmo_core::dto::job::SubmitJob;

/// Model options of the `submit` command
#[derive(Args, Debug, Default)]
pub struct SubmitArgs {
    /// JSON request file; flags override its fields
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Potential expression over x(1)..x(n)
    #[arg(short, long)]
    pub potential: Option<String>,

    /// Initial field values, comma separated
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub values: Vec<f64>,

    /// Initial field velocities, comma separated
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub velocities: Vec<f64>,

    /// Parameter value as NAME=VALUE (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, f64)>,

    /// One metric row with cells separated by ';' (repeat per row)
    #[arg(long = "metric-row")]
    pub metric_rows: Vec<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub initial_time: Option<f64>,

    #[arg(long)]
    pub time_step: Option<f64>,

    #[arg(long)]
    pub kstar: Option<f64>,

    #[arg(long)]
    pub cq: Option<f64>,
}

impl SubmitArgs {
    pub fn into_request(self) -> Result<SubmitJob> {
        let mut req = match &self.file {
            Some(path) => load_request(path)?,
            None => SubmitJob::default(),
        };

        if let Some(potential) = self.potential {
            req.potential_expression = Some(potential);
        }
        if !self.values.is_empty() {
            req.field_values = Some(self.values);
        }
        if !self.velocities.is_empty() {
            req.field_velocities = Some(self.velocities);
        }
        if !self.params.is_empty() {
            let values = req.parameter_values.get_or_insert_with(BTreeMap::new);
            values.extend(self.params);
        }
        if !self.metric_rows.is_empty() {
            req.metric = Some(self.metric_rows.iter().map(|row| parse_metric_row(row)).collect());
        }

        req.initial_time = self.initial_time.or(req.initial_time);
        req.time_step = self.time_step.or(req.time_step);
        req.kstar = self.kstar.or(req.kstar);
        req.cq = self.cq.or(req.cq);

        Ok(req)
    }
}

fn load_request(path: &Path) -> Result<SubmitJob> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse request file {}", path.display()))
}

/// Parses `NAME=VALUE`
fn parse_param(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{}'", raw));
    }

    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for {}: {}", name, e))?;

    Ok((name.to_string(), value))
}

fn parse_metric_row(row: &str) -> Vec<String> {
    row.split(';').map(|cell| cell.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SubmitArgs,
    }

    fn parse(args: &[&str]) -> SubmitArgs {
        TestCli::try_parse_from(std::iter::once("cosmo").chain(args.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("m=1e-5"), Ok(("m".to_string(), 1e-5)));
        assert_eq!(parse_param(" lambda = 0.1 "), Ok(("lambda".to_string(), 0.1)));
        assert!(parse_param("m").is_err());
        assert!(parse_param("=1").is_err());
        assert!(parse_param("m=abc").is_err());
    }

    #[test]
    fn test_flags_build_request() {
        let req = parse(&[
            "--potential",
            "m**2*x(1)**2/2",
            "--values",
            "6.33,-1.5",
            "--velocities",
            "0,0",
            "--param",
            "m=1e-5",
            "--metric-row",
            "1;0",
            "--metric-row",
            "0; Exp(2*x(1))",
            "--kstar",
            "0.05",
        ])
        .into_request()
        .unwrap();

        assert_eq!(req.potential_expression.as_deref(), Some("m**2*x(1)**2/2"));
        assert_eq!(req.field_values, Some(vec![6.33, -1.5]));
        assert_eq!(req.field_velocities, Some(vec![0.0, 0.0]));
        assert_eq!(req.parameter_values.unwrap()["m"], 1e-5);
        assert_eq!(
            req.metric,
            Some(vec![
                vec!["1".to_string(), "0".to_string()],
                vec!["0".to_string(), "Exp(2*x(1))".to_string()],
            ])
        );
        assert_eq!(req.kstar, Some(0.05));
        assert_eq!(req.cq, None);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{
                "potentialExpression": "lambda*x(1)**4",
                "fieldValues": [1.0],
                "fieldVelocities": [0.0],
                "parameterValues": {"lambda": 0.1},
                "cq": 50
            }"#,
        )
        .unwrap();

        let req = parse(&[
            "--file",
            path.to_str().unwrap(),
            "--values",
            "2.5",
            "--param",
            "mu=3",
        ])
        .into_request()
        .unwrap();

        assert_eq!(req.potential_expression.as_deref(), Some("lambda*x(1)**4"));
        assert_eq!(req.field_values, Some(vec![2.5]));
        assert_eq!(req.field_velocities, Some(vec![0.0]));
        let params = req.parameter_values.unwrap();
        assert_eq!(params["lambda"], 0.1);
        assert_eq!(params["mu"], 3.0);
        assert_eq!(req.cq, Some(50.0));
    }

    #[test]
    fn test_unreadable_file() {
        let err = parse(&["--file", "/nonexistent/model.json"])
            .into_request()
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read request file"));
    }
}
