//! Artifact API Handler
//!
//! Serves solver output files and plots from the work directory.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use cosmo_runner::JobOrchestrator;

use crate::api::error::ApiResult;

/// GET /files/{name}
/// Download an artifact; responses are never cached
pub async fn get_file(
    State(orchestrator): State<JobOrchestrator>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    tracing::debug!("Serving file: {}", name);

    let artifact = orchestrator.fetch_artifact(&name).await?;

    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", artifact.name),
            ),
            (
                header::CACHE_CONTROL,
                "no-cache, no-store, must-revalidate".to_string(),
            ),
            (header::PRAGMA, "no-cache".to_string()),
            (header::EXPIRES, "0".to_string()),
        ],
        artifact.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use crate::api::{API_PREFIX, create_router};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use cosmo_runner::{JobOrchestrator, RunnerConfig};
    use tower::ServiceExt;

    async fn get(dir: &std::path::Path, name: &str) -> axum::response::Response {
        let app = create_router(JobOrchestrator::new(RunnerConfig::new(dir.to_path_buf())));
        app.oneshot(
            Request::builder()
                .uri(format!("{}/files/{}", API_PREFIX, name))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_serves_file_without_caching() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("n_prz_kmode_plot_1a2b3c4d.png"), b"\x89PNG").unwrap();

        let resp = get(dir.path(), "n_prz_kmode_plot_1a2b3c4d.png").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let headers = resp.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "0");

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"\x89PNG");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let resp = get(dir.path(), "gw2.txt").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_traversal_is_forbidden() {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("fortran");
        std::fs::create_dir(&work_dir).unwrap();
        std::fs::write(root.path().join("secret.txt"), "secret").unwrap();

        let resp = get(&work_dir, "..%2Fsecret.txt").await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Access denied");
    }
}
