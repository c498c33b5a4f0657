//! Durable snapshot of which codebases are indexed, and how far along they are

pub mod checkpoint;
pub mod record;
pub mod store;

pub use checkpoint::CheckpointWriter;
pub use record::{IndexCompletion, IndexRecord, IndexStatus};
pub use store::SnapshotStore;
