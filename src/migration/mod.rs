//! Migration runs, their status and the workflow around them.
//!
//! [`MigrationOrchestrator`] drives a single remote-reindex run.
//! [`MigrationActions`] is the decision table the outer workflow consults
//! to choose a path and gate each step.

pub mod actions;
pub mod lock;
pub mod orchestrator;
pub mod run;
pub mod state;
pub mod status;

pub use actions::{
    ActionKind, MessageProcessing, MessageProcessingSwitch, MigrationAction, MigrationActions,
    PreflightChecks, ReindexParams, ReindexTrigger, StaticPreflight,
};
pub use lock::{FileMigrationLock, InMemoryMigrationLock, MigrationLock};
pub use orchestrator::{MigrationOrchestrator, RunHandle};
pub use run::{
    is_all_indices, IndexMigrationTask, IndexSelector, MigrationProgress, MigrationRun,
    RestartWait,
};
pub use state::{
    FileMigrationStateStore, InMemoryMigrationStateStore, MigrationPath, MigrationState,
    MigrationStateStore,
};
pub use status::{MigrationStatus, StatusCell};
