//! Solver template preparation
//!
//! The template declares its field count as `integer, parameter :: nf = <n>`.
//! Preparing a run rewrites only those digits; every other byte, including
//! line endings and column layout, is copied through unchanged.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};
use thiserror::Error;
use tracing::{info, warn};

/// Name of the prepared copy written next to the template
pub const PREPARED_SOURCE: &str = "multifix_prepared.f";

static NF_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)(integer\s*,\s*parameter\s*::\s*nf\s*=\s*)\d+")
        .unwrap_or_else(|e| panic!("invalid nf declaration pattern: {}", e))
});

/// Non-fatal problems found while patching
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepareWarning {
    #[error("field count declaration not found, template copied unmodified")]
    DeclarationNotFound,

    #[error("{0} field count declarations found, only the first was patched")]
    MultipleDeclarations(usize),
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Solver template not found: {}", .0.display())]
    TemplateMissing(PathBuf),

    #[error("Failed to prepare solver source: {0}")]
    Io(#[from] std::io::Error),
}

/// Patched template bytes
#[derive(Debug, Clone)]
pub struct Prepared {
    pub source: Vec<u8>,
    pub warning: Option<PrepareWarning>,
}

/// Sets the field count declaration of `template` to `field_count`
pub fn prepare(template: &[u8], field_count: usize) -> Prepared {
    let found = NF_DECLARATION.find_iter(template).count();

    let warning = match found {
        0 => {
            return Prepared {
                source: template.to_vec(),
                warning: Some(PrepareWarning::DeclarationNotFound),
            };
        }
        1 => None,
        n => Some(PrepareWarning::MultipleDeclarations(n)),
    };

    let source = NF_DECLARATION
        .replacen(template, 1, |caps: &Captures<'_>| {
            let mut patched = caps[1].to_vec();
            patched.extend_from_slice(field_count.to_string().as_bytes());
            patched
        })
        .into_owned();

    Prepared { source, warning }
}

/// Reads `template_path` and writes the prepared copy next to it
///
/// Returns the path of the prepared source.
pub fn prepare_file(template_path: &Path, field_count: usize) -> Result<PathBuf, PrepareError> {
    if !template_path.is_file() {
        return Err(PrepareError::TemplateMissing(template_path.to_path_buf()));
    }

    info!("Preparing {} with nf={}", template_path.display(), field_count);

    let template = std::fs::read(template_path)?;
    let prepared = prepare(&template, field_count);

    if let Some(warning) = &prepared.warning {
        warn!("{}: {}", template_path.display(), warning);
    }

    let output = template_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(PREPARED_SOURCE);
    std::fs::write(&output, &prepared.source)?;

    info!("Prepared source written to {}", output.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &[u8] = b"      program multifix\r\n      integer, parameter :: nf = 1\r\n      real*8 x(nf)\r\n";

    #[test]
    fn test_patches_only_digits() {
        let prepared = prepare(TEMPLATE, 3);
        assert_eq!(prepared.warning, None);
        assert_eq!(
            prepared.source,
            b"      program multifix\r\n      integer, parameter :: nf = 3\r\n      real*8 x(nf)\r\n"
        );
    }

    #[test]
    fn test_case_and_spacing_tolerant() {
        let prepared = prepare(b"INTEGER,PARAMETER::NF=12\n", 2);
        assert_eq!(prepared.source, b"INTEGER,PARAMETER::NF=2\n");
    }

    #[test]
    fn test_missing_declaration_copies_unmodified() {
        let template = b"      integer nfields\n";
        let prepared = prepare(template, 4);
        assert_eq!(prepared.source, template);
        assert_eq!(prepared.warning, Some(PrepareWarning::DeclarationNotFound));
    }

    #[test]
    fn test_multiple_declarations_patch_first() {
        let template = b"integer, parameter :: nf = 1\ninteger, parameter :: nf = 1\n";
        let prepared = prepare(template, 5);
        assert_eq!(
            prepared.source,
            b"integer, parameter :: nf = 5\ninteger, parameter :: nf = 1\n"
        );
        assert_eq!(prepared.warning, Some(PrepareWarning::MultipleDeclarations(2)));
    }

    #[test]
    fn test_non_utf8_bytes_preserved() {
        let mut template = b"c \xe9t\xe9\n".to_vec();
        template.extend_from_slice(b"      integer, parameter :: nf = 1\n");
        let prepared = prepare(&template, 2);
        assert!(prepared.source.starts_with(b"c \xe9t\xe9\n"));
        assert!(prepared.source.ends_with(b"nf = 2\n"));
    }

    #[test]
    fn test_prepare_file() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("multifix.f");
        std::fs::write(&template, TEMPLATE).unwrap();

        let output = prepare_file(&template, 2).unwrap();
        assert_eq!(output, dir.path().join(PREPARED_SOURCE));
        assert_eq!(std::fs::read(&template).unwrap(), TEMPLATE);
        assert!(
            std::fs::read_to_string(&output)
                .unwrap()
                .contains("nf = 2")
        );
    }

    #[test]
    fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let result = prepare_file(&dir.path().join("multifix.f"), 1);
        assert!(matches!(result, Err(PrepareError::TemplateMissing(_))));
    }
}
