//! Shared constants for end-to-end tests

/// A single-track id the fakes retrieve successfully.
pub const TRACK_OK_ID: &str = "aaaaaaaaaa1";

/// Second healthy track id.
pub const TRACK_OK_ID_2: &str = "aaaaaaaaaa2";

/// Retrieval of this id always fails.
pub const TRACK_RETRIEVAL_FAIL_ID: &str = "bbbbbbbbbb1";

/// A collection whose members are [`TRACK_OK_ID`] and [`TRACK_OK_ID_2`].
pub const COLLECTION_ID: &str = "PLcollection-ok";

/// A collection whose listing always fails.
pub const COLLECTION_LIST_FAIL_ID: &str = "PLcollection-broken";

/// Uploader reported by the fake retriever.
pub const FAKE_UPLOADER: &str = "Test Uploader";

/// Genre reported by the fake genre lookup.
pub const FAKE_GENRE: &str = "Rock";

/// Album every fake catalog candidate belongs to.
pub const FAKE_ALBUM: &str = "Test Album";

pub const POLL_INTERVAL_MS: u64 = 10;

/// How long to wait for asynchronous pipeline work in tests.
pub const SETTLE_TIMEOUT_SECS: u64 = 5;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Redrive cap used by every test pipeline.
pub const REDRIVE_CAP: u32 = 5;

/// Inline attempts per retried operation in test pipelines.
pub const INLINE_ATTEMPTS: u32 = 2;
