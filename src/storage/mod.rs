//! Durable per-replica storage: an ordered key/value store holding one
//! `Action` record per position plus a single `Metadata` record under a
//! fixed sentinel key.
//!
//! The store is expressed as a capability trait so that the disk-backed
//! implementation and the in-memory test double are interchangeable behind
//! a `Box<dyn Storage>` owned by the replica actor.

mod disk;
mod memory;

use std::path::Path;

use crate::message::{Metadata, Status};
use crate::utils::RepLogError;

use async_trait::async_trait;

pub use disk::DiskStorage;
pub use memory::MemStorage;

/// State restored from a store at startup.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct State {
    /// Restored metadata record (default if none was ever persisted).
    pub metadata: Metadata,

    /// Lowest non-truncated position held.
    pub begin: u64,

    /// Highest known position.
    pub end: u64,
}

/// Capability interface over one replica's durable store.
///
/// Every successful `persist_*` is durable on return. Persisting a TRUNCATE
/// action deletes all positions below its target in the same transaction,
/// in time proportional to the number of positions actually present there.
#[async_trait]
pub trait Storage: Send {
    /// Opens or creates the store at `path` and restores its state. Must be
    /// called exactly once, before any other operation.
    async fn restore(&mut self, path: &Path) -> Result<State, RepLogError>;

    /// Atomically writes `action` at `action.position`. For a TRUNCATE,
    /// also deletes every stored position below the truncation target.
    async fn persist_action(
        &mut self,
        action: &crate::message::Action,
    ) -> Result<(), RepLogError>;

    /// Atomically replaces the metadata record.
    async fn persist_metadata(
        &mut self,
        metadata: &Metadata,
    ) -> Result<(), RepLogError>;

    /// Reads the action stored at `position`; `None` if that position was
    /// truncated away or never written.
    async fn read(
        &mut self,
        position: u64,
    ) -> Result<Option<crate::message::Action>, RepLogError>;
}

/// Initializes the store at `path` for participation in a fresh replica
/// group: opens (creating if necessary) the store and flips an `Empty`
/// status to `Voting`, leaving everything else untouched. Idempotent.
pub async fn initialize(path: &Path) -> Result<(), RepLogError> {
    let mut storage = DiskStorage::new();
    let state = storage.restore(path).await?;
    if state.metadata.status == Status::Empty {
        storage
            .persist_metadata(&Metadata {
                status: Status::Voting,
                promised: state.metadata.promised,
            })
            .await?;
    }
    Ok(())
}
