//! Common test infrastructure
//!
//! In-process fakes for every pipeline collaborator, a pipeline harness and
//! an HTTP test server. Tests should only import from this module.

#![allow(dead_code)]

mod client;
mod constants;
mod fakes;
mod server;

pub use client::TestClient;
pub use constants::*;
pub use fakes::{
    CopyWriter, FakeCatalog, FakeGenre, FakeRetriever, FakeSourceMeta, FakeTranscoder,
    TestPipeline, TestPipelineBuilder,
};
pub use server::TestServer;

use std::future::Future;
use std::time::Duration;

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}
