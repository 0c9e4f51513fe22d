//! The coordinator: proposer side of the protocol, bound to one local
//! voting replica but operating on the whole network. Election runs Phase 1
//! across all positions at once and fills every hole behind the new
//! coordinator; appends and truncations are single Phase 2 exchanges at the
//! next position.

use crate::catchup;
use crate::log::LogConfig;
use crate::message::{
    LearnedMessage, Op, PromiseRequest, Proposal, WriteRequest,
};
use crate::network::{BroadcastRequest, BroadcastResponse, Cmp, Network};
use crate::replica::Replica;
use crate::utils::{RepLogError, Timer};

use rand::Rng;

use tokio::time::Duration;

/// Coordinator operating state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum CoordState {
    /// Not elected (never was, or demoted).
    Initial,

    /// Election in progress.
    Electing,

    /// Elected; `index` is the highest chosen position.
    Elected,

    /// A write is in flight. A cancelled (dropped) write leaves the
    /// coordinator here, so later operations resolve to `None` until the
    /// caller elects again; the abandoned slot stays consumed.
    Writing,
}

/// The proposer. Operations take `&mut self`, so one coordinator runs one
/// operation at a time; concurrency across writers comes from running
/// multiple coordinators. Must be created within a tokio runtime.
pub struct Coordinator {
    /// Quorum size (a majority of the replica group).
    quorum: usize,

    /// Local replica this coordinator is bound to.
    replica: Replica,

    /// Handle to the network of all replicas (including the local one).
    network: Network,

    /// Timing knobs.
    config: LogConfig,

    /// Current proposal number.
    proposal: Proposal,

    /// Position of the last chosen action this coordinator knows of.
    index: u64,

    /// Operating state.
    state: CoordState,

    /// Backoff timer for rounds that found no quorum.
    backoff: Timer,
}

impl Coordinator {
    /// Creates a new coordinator with default timing knobs.
    pub fn new(quorum: usize, replica: Replica, network: Network) -> Self {
        Self::with_config(quorum, replica, network, LogConfig::default())
    }

    /// Creates a new coordinator with the given timing knobs.
    pub fn with_config(
        quorum: usize,
        replica: Replica,
        network: Network,
        config: LogConfig,
    ) -> Self {
        Coordinator {
            quorum,
            replica,
            network,
            config,
            proposal: 0,
            index: 0,
            state: CoordState::Initial,
            backoff: Timer::new(),
        }
    }

    /// Runs an election: Phase 1 across all positions, then catch-up of
    /// every hole up to the highest position any promiser reported.
    ///
    /// Resolves `Some(position)` with the highest chosen position once
    /// elected (appends will continue from there), or `None` if a higher
    /// proposal was seen (bump recorded; the caller retries). Stays pending
    /// while no promise quorum is reachable.
    pub async fn elect(&mut self) -> Result<Option<u64>, RepLogError> {
        if self.state == CoordState::Elected {
            return Ok(Some(self.index));
        }
        self.state = CoordState::Electing;

        loop {
            let info = self.replica.info().await?;
            self.proposal = self.proposal.max(info.promised) + 1;
            pf_debug!(self.replica.id(); "electing with proposal {}",
                                         self.proposal);

            let mut rx = self.network.broadcast(BroadcastRequest::Promise(
                PromiseRequest {
                    proposal: self.proposal,
                    position: None,
                },
            ));

            let mut okays = Vec::new();
            let mut rejected = None;
            while let Some(resp) = rx.recv().await {
                if let BroadcastResponse::Promise(resp) = resp {
                    if !resp.okay {
                        rejected = Some(resp.proposal);
                        break;
                    }
                    okays.push(resp);
                    if okays.len() >= self.quorum {
                        break;
                    }
                }
            }

            if let Some(higher) = rejected {
                self.proposal = self.proposal.max(higher);
                self.state = CoordState::Initial;
                pf_info!(self.replica.id(); "not elected, saw proposal {}",
                                            higher);
                return Ok(None);
            }
            if okays.len() < self.quorum {
                self.wait_for_quorum_chance().await?;
                continue;
            }

            // every chosen position lies at or below the highest position a
            // quorum member reported; learn all of them before serving
            let end = okays
                .iter()
                .filter_map(|resp| resp.position)
                .max()
                .unwrap_or(0)
                .max(info.end);
            let positions = self.replica.missing(info.begin, end).await?;
            if !positions.is_empty() {
                pf_debug!(self.replica.id(); "filling {} positions up to {}",
                                             positions.len(), end);
                catchup::catchup(
                    self.quorum,
                    self.replica.clone(),
                    self.network.clone(),
                    Some(self.proposal),
                    positions,
                    Duration::from_millis(self.config.catchup_timeout_ms),
                )
                .await?;
            }

            self.index = end;
            self.state = CoordState::Elected;
            pf_info!(self.replica.id(); "elected at position {} proposal {}",
                                        self.index, self.proposal);
            return Ok(Some(self.index));
        }
    }

    /// Appends a byte-string entry at the next position.
    pub async fn append(
        &mut self,
        bytes: &[u8],
    ) -> Result<Option<u64>, RepLogError> {
        self.write(Op::Append {
            bytes: bytes.to_vec(),
        })
        .await
    }

    /// Truncates the log up to (exclusive) position `to`. The returned
    /// position is the one the truncate action itself occupies, not `to`.
    pub async fn truncate(
        &mut self,
        to: u64,
    ) -> Result<Option<u64>, RepLogError> {
        self.write(Op::Truncate { to }).await
    }

    /// Phase 2 at the next position. `None` means this coordinator is not
    /// (or no longer) elected.
    async fn write(&mut self, op: Op) -> Result<Option<u64>, RepLogError> {
        if self.state != CoordState::Elected {
            pf_debug!(self.replica.id(); "write refused in state {:?}",
                                         self.state);
            return Ok(None);
        }
        self.state = CoordState::Writing;
        self.index += 1;
        let position = self.index;

        loop {
            let mut rx = self.network.broadcast(BroadcastRequest::Write(
                WriteRequest {
                    proposal: self.proposal,
                    position,
                    op: op.clone(),
                },
            ));

            let mut okays = 0;
            let mut rejected = None;
            while let Some(resp) = rx.recv().await {
                if let BroadcastResponse::Write(resp) = resp {
                    if !resp.okay {
                        rejected = Some(resp.proposal);
                        break;
                    }
                    okays += 1;
                    if okays >= self.quorum {
                        break;
                    }
                }
            }

            if let Some(higher) = rejected {
                self.proposal = self.proposal.max(higher);
                self.state = CoordState::Initial;
                pf_info!(self.replica.id(); "demoted by proposal {}", higher);
                return Ok(None);
            }
            if okays >= self.quorum {
                // chosen; let everyone know, best-effort
                drop(self.network.broadcast(BroadcastRequest::Learned(
                    LearnedMessage { position },
                )));
                self.state = CoordState::Elected;
                pf_debug!(self.replica.id(); "wrote position {}", position);
                return Ok(Some(position));
            }

            self.wait_for_quorum_chance().await?;
        }
    }

    /// Waits until another round is worth trying: on the membership watcher
    /// while the peer set is smaller than a quorum, otherwise on a
    /// randomized backoff.
    async fn wait_for_quorum_chance(&mut self) -> Result<(), RepLogError> {
        let size = self
            .network
            .watch(0, Cmp::GreaterThanOrEqualTo)
            .await?;
        if size < self.quorum {
            pf_debug!(self.replica.id(); "peer set {} below quorum {}",
                                         size, self.quorum);
            self.network
                .watch(self.quorum, Cmp::GreaterThanOrEqualTo)
                .await?;
        } else {
            let backoff = rand::thread_rng().gen_range(
                self.config.backoff_min_ms..=self.config.backoff_max_ms,
            );
            self.backoff.kickoff(Duration::from_millis(backoff))?;
            self.backoff.timeout().await;
        }
        Ok(())
    }
}
