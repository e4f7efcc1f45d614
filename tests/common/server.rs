//! Test server lifecycle management
//!
//! Each test gets its own server on a random port, backed by its own
//! [`TestPipeline`].

use super::fakes::TestPipeline;
use std::time::Duration;
use tokio::net::TcpListener;
use track_harvester::make_app;

/// When dropped, the server and the pipeline loops shut down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,
    pub port: u16,
    pub harness: TestPipeline,
}

impl TestServer {
    /// Server with the intake, redrive and housekeeping loops running.
    pub async fn spawn() -> Self {
        let harness = TestPipeline::new();
        harness.start();
        Self::serve(harness).await
    }

    /// Server whose intake queue is never drained.
    pub async fn spawn_without_intake(capacity: usize) -> Self {
        Self::serve(TestPipeline::with_intake_capacity(capacity)).await
    }

    async fn serve(harness: TestPipeline) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let app = make_app(harness.pipeline.clone());
        let shutdown = harness.shutdown_token();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .expect("Test server failed");
        });

        let server = Self {
            base_url,
            port,
            harness,
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if let Ok(response) = client.get(format!("{}/health", self.base_url)).send().await {
                if response.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Server failed to become ready within timeout");
    }
}
