//! Public interface to the RepLog library: a replicated append-only log
//! built on a Multi-Paxos consensus and storage core.
//!
//! The pieces, bottom up: `Storage` persists per-position `Action` records
//! and per-replica `Metadata`; a `Replica` actor wraps one storage and
//! enforces the acceptor rules; the `Network` actor tracks the peer set and
//! broadcasts to it; a `Coordinator` elects itself and drives appends and
//! truncations through the quorum; `catchup` and `recover` turn blank or
//! lagging replicas into voting members; `Log` with its `Writer`/`Reader`
//! is the thin façade most callers want.

#![allow(clippy::uninlined_format_args)]

#[macro_use]
pub mod utils;

mod catchup;
mod coordinator;
mod log;
mod message;
mod network;
mod recover;
mod replica;
mod storage;

pub use crate::log::{Entry, Log, LogConfig, Position, Reader, Writer};
pub use catchup::catchup;
pub use coordinator::Coordinator;
pub use message::{
    Action, LearnedMessage, Metadata, Op, PromiseRequest, PromiseResponse,
    Proposal, RecoverRequest, RecoverResponse, Status, WriteRequest,
    WriteResponse,
};
pub use network::{BroadcastRequest, BroadcastResponse, Cmp, Network};
pub use recover::recover;
pub use replica::{Replica, ReplicaId, ReplicaInfo};
pub use storage::{initialize, DiskStorage, MemStorage, State, Storage};
pub use utils::{RepLogError, Timer};
