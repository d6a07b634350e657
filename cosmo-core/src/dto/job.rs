//! Job DTOs exchanged over HTTP

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus};
use crate::domain::model::{
    FieldVectors, MetricSpec, ModelInput, ParameterTable, TuningParameters, ValidationError,
};

/// Request to submit a new calculation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJob {
    #[serde(default)]
    pub potential_expression: Option<String>,
    #[serde(default)]
    pub field_values: Option<Vec<f64>>,
    #[serde(default)]
    pub field_velocities: Option<Vec<f64>>,
    /// Parameter values by symbol; numbers or numeric strings
    #[serde(default, deserialize_with = "lenient_parameter_values")]
    pub parameter_values: Option<BTreeMap<String, f64>>,
    /// `[{name, value}]` list, used when `parameter_values` is empty
    #[serde(default)]
    pub parameters: Option<Vec<NamedParameter>>,
    /// N×N metric; each cell is a number or an expression over `x(i)`
    #[serde(default, deserialize_with = "lenient_metric")]
    pub metric: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub initial_time: Option<f64>,
    #[serde(default)]
    pub time_step: Option<f64>,
    #[serde(default)]
    pub kstar: Option<f64>,
    #[serde(default)]
    pub cq: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedParameter {
    pub name: String,
    pub value: JsonValue,
}

impl SubmitJob {
    /// Validates the request shape and converts it into a model input
    ///
    /// Parameter completeness is checked by the runner, which owns the
    /// expression tokenizer.
    pub fn into_model(self) -> Result<ModelInput, ValidationError> {
        let parameters = self.parameter_table();

        let values = self
            .field_values
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::MissingFieldValues)?;
        let velocities = self
            .field_velocities
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::MissingFieldVelocities)?;
        let fields = FieldVectors::new(values, velocities)?;

        let defaults = TuningParameters::default();
        let tuning = TuningParameters {
            initial_time: self.initial_time.unwrap_or(defaults.initial_time),
            time_step: self.time_step.unwrap_or(defaults.time_step),
            kstar: self.kstar.unwrap_or(defaults.kstar),
            cq: self.cq.unwrap_or(defaults.cq),
        };

        Ok(ModelInput {
            potential_expression: self
                .potential_expression
                .filter(|expr| !expr.trim().is_empty()),
            fields,
            parameters,
            metric: self
                .metric
                .filter(|rows| !rows.is_empty())
                .map(MetricSpec::from_rows),
            tuning,
        })
    }

    /// Builds the parameter table, preferring the map over the list form
    pub fn parameter_table(&self) -> ParameterTable {
        if let Some(values) = self.parameter_values.as_ref().filter(|m| !m.is_empty()) {
            return values.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        }

        self.parameters
            .iter()
            .flatten()
            .filter_map(|p| json_number(&p.value).map(|v| (p.name.as_str(), v)))
            .collect()
    }
}

/// Response to a successful submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub execution_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Poll response; terminal fields are present only once the job finished
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub execution_id: Uuid,
    pub status: JobStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_files: Option<Vec<String>>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        match (&job.result, job.status.is_terminal()) {
            (Some(result), true) => Self {
                execution_id: job.id,
                status: job.status,
                message: result.message.clone(),
                success: Some(result.success),
                output: result.output.clone(),
                output_files: Some(result.output_files.clone()),
            },
            _ => Self {
                execution_id: job.id,
                status: job.status,
                message: "Calculation is still running".to_string(),
                success: None,
                output: None,
                output_files: None,
            },
        }
    }
}

/// Cancel response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
}

fn json_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Accepts numbers and numeric strings, dropping anything else
fn lenient_parameter_values<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let JsonValue::Object(entries) = JsonValue::deserialize(deserializer)? else {
        return Ok(None);
    };

    Ok(Some(
        entries
            .iter()
            .filter_map(|(k, v)| json_number(v).map(|n| (k.clone(), n)))
            .collect(),
    ))
}

/// Accepts string, number, boolean and null cells, normalizing them to text
fn lenient_metric<'de, D>(deserializer: D) -> Result<Option<Vec<Vec<String>>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let rows = match JsonValue::deserialize(deserializer)? {
        JsonValue::Null => return Ok(None),
        JsonValue::Array(rows) => rows,
        _ => return Err(D::Error::custom("metric must be an array of rows")),
    };

    rows.into_iter()
        .map(|row| match row {
            JsonValue::Null => Ok(Vec::new()),
            JsonValue::Array(cells) => Ok(cells.into_iter().map(metric_cell_text).collect()),
            _ => Err(D::Error::custom("metric row must be an array")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn metric_cell_text(cell: JsonValue) -> String {
    match cell {
        JsonValue::Null => "0".to_string(),
        JsonValue::String(s) => s,
        JsonValue::Bool(b) => String::from(if b { "1" } else { "0" }),
        other => other.to_string(),
    }
}
