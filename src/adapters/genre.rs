//! HTTP client for the genre classification service.

use crate::pipeline::GenreLookup;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct GenreResponse {
    genre: String,
}

pub struct GenreClient {
    client: reqwest::Client,
    base_url: String,
    path: String,
}

impl GenreClient {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            path: path.to_string(),
        })
    }
}

#[async_trait]
impl GenreLookup for GenreClient {
    async fn genre(&self, id: &str) -> Result<String> {
        let url = format!("{}{}?id={}", self.base_url, self.path, urlencoding::encode(id));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to genre service")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch genre for {}: status {}", id, response.status());
        }

        let body: GenreResponse = response
            .json()
            .await
            .context("Failed to parse genre response")?;
        Ok(body.genre)
    }
}
