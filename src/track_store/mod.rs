mod models;
mod schema;
mod store;
mod trait_def;

pub use models::TrackRecord;
pub use store::SqliteTrackStore;
pub use trait_def::TrackStore;
