//! Indexing lifecycle: state transitions, background tasks and reconciliation

pub mod lifecycle;
pub mod reconciler;
pub mod registry;
pub mod validation;

pub use lifecycle::{ClearOutcome, IndexLifecycleManager, IndexRequest, IndexStarted, IndexStatusReport};
pub use reconciler::{CloudReconciler, ReconcileReport};
pub use registry::TaskRegistry;
