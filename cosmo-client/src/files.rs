//! Artifact and health endpoints

use crate::SolverClient;
use crate::error::Result;

impl SolverClient {
    /// Download an artifact from the solver's output directory
    pub async fn fetch_artifact(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.url(&format!("/files/{}", name));
        let response = self.client.get(&url).send().await?;

        self.handle_bytes(response).await
    }

    /// Check that the service is up; returns its status line
    pub async fn health(&self) -> Result<String> {
        let response = self.client.get(self.url("/health")).send().await?;
        let bytes = self.handle_bytes(response).await?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
