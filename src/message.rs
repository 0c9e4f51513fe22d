//! Data model of the replicated log and the wire messages exchanged between
//! replicas. Durable records and wire messages share the same types; both
//! are encoded with MessagePack (`rmp-serde`) so that `Option` fields keep
//! the present-vs-absent distinction across round-trips.

use serde::{Deserialize, Serialize};

/// Paxos proposal (ballot) number type. Use 0 as a null proposal number.
pub type Proposal = u64;

/// Lifecycle status of a replica. A replica participates in the promise and
/// write protocols only when `Voting`.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize,
)]
pub enum Status {
    Empty = 0,
    Starting = 1,
    Recovering = 2,
    Voting = 3,
}

/// Per-replica durable metadata record.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Lifecycle status of this replica.
    pub status: Status,

    /// Replica-wide floor: any request carrying a proposal below this is
    /// rejected.
    pub promised: Proposal,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            status: Status::Empty,
            promised: 0,
        }
    }
}

/// Operation recorded at one log position (the "value" in Paxos terms).
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum Op {
    /// Filler for positions where nothing was chosen.
    Nop,

    /// Client payload appended to the log.
    Append { bytes: Vec<u8> },

    /// Truncation of all positions below `to`.
    Truncate { to: u64 },
}

/// One accepted action at one log position on one replica.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Log position this action occupies.
    pub position: u64,

    /// Value of `Metadata.promised` at the time this action was written.
    pub promised: Proposal,

    /// Proposal number under which this action was accepted.
    pub performed: Proposal,

    /// `Some(true)` once a quorum is known locally to have accepted this
    /// action. Absent (not `Some(false)`) on a freshly accepted action; the
    /// two states are distinct and both must survive serialization.
    pub learned: Option<bool>,

    /// The operation itself.
    pub op: Op,
}

impl Action {
    /// True iff this action is known locally to be chosen.
    pub fn is_learned(&self) -> bool {
        self.learned == Some(true)
    }
}

/// Phase 1 request. Without `position` this is the all-positions promise
/// used by election; with `position` it is the position-scoped promise used
/// by catch-up.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PromiseRequest {
    pub proposal: Proposal,
    pub position: Option<u64>,
}

/// Phase 1 response. On rejection `proposal` echoes the highest proposal
/// the replica has promised. On acceptance of an all-positions promise,
/// `position` carries the replica's `end`; on acceptance of a
/// position-scoped promise, `action` carries the action already stored at
/// that position, if any.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PromiseResponse {
    pub okay: bool,
    pub proposal: Proposal,
    pub position: Option<u64>,
    pub action: Option<Action>,
}

/// Phase 2 request: accept `op` at `position` under `proposal`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub proposal: Proposal,
    pub position: u64,
    pub op: Op,
}

/// Phase 2 response.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub okay: bool,
    pub proposal: Proposal,
    pub position: u64,
}

/// Notification that the action at `position` has been chosen. Best-effort,
/// no response.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct LearnedMessage {
    pub position: u64,
}

/// Probe sent by a recovering replica to the network.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct RecoverRequest {}

/// Reply to a recover probe; answered by replicas in every status.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct RecoverResponse {
    pub status: Status,
    pub begin: u64,
    pub end: u64,
}

#[cfg(test)]
mod message_tests {
    use super::*;
    use crate::utils::RepLogError;

    use rmp_serde::decode::from_slice as decode_from_slice;
    use rmp_serde::encode::to_vec as encode_to_vec;

    #[test]
    fn learned_field_round_trip() -> Result<(), RepLogError> {
        // a freshly accepted action has no learned flag at all
        let fresh = Action {
            position: 7,
            promised: 2,
            performed: 2,
            learned: None,
            op: Op::Append {
                bytes: b"hello world".to_vec(),
            },
        };
        let decoded: Action = decode_from_slice(&encode_to_vec(&fresh)?)?;
        assert_eq!(decoded, fresh);
        assert!(!decoded.is_learned());

        // a learned action keeps its flag distinctly
        let learned = Action {
            learned: Some(true),
            ..fresh
        };
        let decoded: Action = decode_from_slice(&encode_to_vec(&learned)?)?;
        assert_eq!(decoded.learned, Some(true));
        assert!(decoded.is_learned());
        Ok(())
    }

    #[test]
    fn truncate_op_round_trip() -> Result<(), RepLogError> {
        let action = Action {
            position: 11,
            promised: 1,
            performed: 1,
            learned: Some(true),
            op: Op::Truncate { to: 10 },
        };
        let decoded: Action = decode_from_slice(&encode_to_vec(&action)?)?;
        assert_eq!(decoded, action);
        Ok(())
    }

    #[test]
    fn status_ordering() {
        assert!(Status::Empty < Status::Starting);
        assert!(Status::Starting < Status::Recovering);
        assert!(Status::Recovering < Status::Voting);
    }
}
