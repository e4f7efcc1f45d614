//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per endpoint. When routes or query formats
//! change, update only this file.

use super::constants::*;
use reqwest::Response;
use std::time::Duration;

pub struct TestClient {
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// GET /api/download?id={id}
    pub async fn download(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/api/download", self.base_url))
            .query(&[("id", id)])
            .send()
            .await
            .expect("Download request failed")
    }

    /// GET /api/download without an id
    pub async fn download_without_id(&self) -> Response {
        self.client
            .get(format!("{}/api/download", self.base_url))
            .send()
            .await
            .expect("Download request failed")
    }

    /// GET /api/status?id={id}
    pub async fn status(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/api/status", self.base_url))
            .query(&[("id", id)])
            .send()
            .await
            .expect("Status request failed")
    }

    /// GET /health
    pub async fn health(&self) -> Response {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .expect("Health request failed")
    }
}
