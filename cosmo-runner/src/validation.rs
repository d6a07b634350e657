//! Submission validation
//!
//! Runs on the caller's path before any job exists.

use cosmo_codegen::validate_parameters;
use cosmo_core::domain::model::{ModelInput, ValidationError};
use cosmo_core::dto::job::SubmitJob;

/// Checks shape and parameter completeness of a submission
pub fn validate_request(request: SubmitJob) -> Result<ModelInput, ValidationError> {
    let model = request.into_model()?;

    if let Some(expr) = &model.potential_expression {
        let missing = validate_parameters(expr, &model.parameters);
        if !missing.is_empty() {
            return Err(ValidationError::MissingParameters(missing));
        }
    }

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(expr: Option<&str>, values: Vec<f64>, velocities: Vec<f64>) -> SubmitJob {
        SubmitJob {
            potential_expression: expr.map(str::to_string),
            field_values: Some(values),
            field_velocities: Some(velocities),
            ..SubmitJob::default()
        }
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = validate_request(request(None, vec![1.0, 2.0], vec![1.0])).unwrap_err();
        assert!(matches!(err, ValidationError::LengthMismatch { .. }));
    }

    #[test]
    fn test_empty_vectors_rejected() {
        let err = validate_request(request(None, vec![], vec![])).unwrap_err();
        assert_eq!(err, ValidationError::MissingFieldValues);
    }

    #[test]
    fn test_missing_parameters_rejected() {
        let err = validate_request(request(Some("lambda*x(1)**4"), vec![1.0], vec![0.0]))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingParameters(vec!["lambda".into()]));
    }

    #[test]
    fn test_parameters_supplied() {
        let mut req = request(Some("Lambda*x(1)**4"), vec![1.0], vec![0.0]);
        req.parameter_values = Some([("lambda".to_string(), 0.1)].into_iter().collect());

        let model = validate_request(req).unwrap();
        assert_eq!(model.parameters.get("LAMBDA"), Some(0.1));
    }

    #[test]
    fn test_default_potential_needs_no_parameters() {
        assert!(validate_request(request(None, vec![6.33], vec![0.0])).is_ok());
    }
}
