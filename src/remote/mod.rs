//! Talking to the remote source cluster and the local storage engine.

pub mod engine;
pub mod executor;
pub mod lister;

pub use engine::{
    match_all_query, HttpStorageEngine, ReindexRequest, ReindexResponse, RemoteInfo,
    StorageEngine,
};
pub use executor::RemoteReindexExecutor;
pub use lister::{parse_index_listing, HttpIndexLister, IndexLister};
