//! Catch-up: drives explicit Paxos rounds to learn the chosen value at each
//! of a given set of positions, persisting the results into a local replica.
//! Used by election to fill holes behind the new coordinator, and by
//! recovery to bring a blank replica up to the voting members' range.

use crate::message::{
    Action, Op, PromiseRequest, Proposal, WriteRequest,
};
use crate::network::{BroadcastRequest, BroadcastResponse, Network};
use crate::replica::Replica;
use crate::utils::RepLogError;

use rand::Rng;

use tokio::time::{self, Duration};

/// Outcome of one fill round at one position.
enum FillStatus {
    /// The chosen value is now learned locally.
    Done,

    /// A replica has promised a higher proposal; retry above it.
    Rejected(Proposal),

    /// Too few replicas responded to form a quorum.
    Incomplete,
}

/// Brings `replica` up to having a learned action at every one of
/// `positions` (in the order given; election and recovery pass ascending
/// positions so that a trailing truncation lands last).
///
/// `proposal` is the coordinator's current proposal number when catch-up
/// runs on its behalf; with `None`, a proposal is obtained by an
/// all-positions promise round against the network first. Rounds that fail
/// to reach a quorum within `timeout` are retried indefinitely with bumped
/// proposal numbers, so this only returns once every position is learned.
pub async fn catchup(
    quorum: usize,
    replica: Replica,
    network: Network,
    proposal: Option<Proposal>,
    positions: Vec<u64>,
    timeout: Duration,
) -> Result<(), RepLogError> {
    let mut proposal = match proposal {
        Some(proposal) => proposal,
        None => bump_proposal(quorum, &network, 0).await?,
    };

    for position in positions {
        // another path may have learned this position in the meantime
        if replica.missing(position, position).await?.is_empty() {
            continue;
        }

        loop {
            let round =
                fill_once(quorum, &replica, &network, proposal, position);
            match time::timeout(timeout, round).await {
                Ok(Ok(FillStatus::Done)) => break,
                Ok(Ok(FillStatus::Rejected(higher))) => {
                    pf_debug!(replica.id(); "fill of {} rejected at {}, saw {}",
                                            position, proposal, higher);
                    proposal =
                        bump_proposal(quorum, &network, higher).await?;
                }
                Ok(Ok(FillStatus::Incomplete)) => {
                    pf_debug!(replica.id(); "fill of {} found no quorum, \
                                             will retry", position);
                    time::sleep(timeout).await;
                    proposal =
                        bump_proposal(quorum, &network, proposal).await?;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    pf_debug!(replica.id(); "fill of {} timed out", position);
                    proposal =
                        bump_proposal(quorum, &network, proposal).await?;
                }
            }
        }
    }
    Ok(())
}

/// Obtains a proposal number above `above` that a quorum has promised, via
/// all-positions promise rounds. Retries past rejections indefinitely, with
/// a randomized jitter before each attempt so that dueling catch-ups break
/// symmetry.
async fn bump_proposal(
    quorum: usize,
    network: &Network,
    above: Proposal,
) -> Result<Proposal, RepLogError> {
    let mut proposal = above;
    loop {
        let jitter = rand::thread_rng().gen_range(10..=1000);
        time::sleep(Duration::from_millis(jitter)).await;

        proposal += 1;
        let mut rx =
            network.broadcast(BroadcastRequest::Promise(PromiseRequest {
                proposal,
                position: None,
            }));

        let mut okays = 0;
        let mut rejected = None;
        while let Some(resp) = rx.recv().await {
            if let BroadcastResponse::Promise(resp) = resp {
                if !resp.okay {
                    rejected = Some(resp.proposal);
                } else {
                    okays += 1;
                    if okays >= quorum {
                        break;
                    }
                }
            }
        }

        if okays >= quorum {
            return Ok(proposal);
        }
        if let Some(higher) = rejected {
            proposal = proposal.max(higher);
        }
        // quorum unreachable right now; jittered retry
    }
}

/// One explicit round at one position: a position-scoped promise quorum to
/// learn any previously accepted action, then (unless the action is already
/// known chosen) a write quorum for the adopted value, then a local fill.
async fn fill_once(
    quorum: usize,
    replica: &Replica,
    network: &Network,
    proposal: Proposal,
    position: u64,
) -> Result<FillStatus, RepLogError> {
    let mut rx =
        network.broadcast(BroadcastRequest::Promise(PromiseRequest {
            proposal,
            position: Some(position),
        }));

    let mut okays = Vec::new();
    while let Some(resp) = rx.recv().await {
        if let BroadcastResponse::Promise(resp) = resp {
            if !resp.okay {
                return Ok(FillStatus::Rejected(resp.proposal));
            }
            okays.push(resp);
            if okays.len() >= quorum {
                break;
            }
        }
    }
    if okays.len() < quorum {
        return Ok(FillStatus::Incomplete);
    }

    // adopt the returned action with the highest performed proposal, ties
    // broken in favor of a learned one; no action at all means NOP
    let mut adopted: Option<Action> = None;
    for action in okays.into_iter().filter_map(|resp| resp.action) {
        adopted = Some(match adopted.take() {
            None => action,
            Some(best) => {
                if action.performed > best.performed
                    || (action.performed == best.performed
                        && action.is_learned()
                        && !best.is_learned())
                {
                    action
                } else {
                    best
                }
            }
        });
    }

    if let Some(action) = adopted.as_ref() {
        if action.is_learned() {
            // already chosen; no round needed
            replica.fill(action.clone()).await?;
            return Ok(FillStatus::Done);
        }
    }

    let op = adopted.map(|action| action.op).unwrap_or(Op::Nop);
    let mut rx = network.broadcast(BroadcastRequest::Write(WriteRequest {
        proposal,
        position,
        op: op.clone(),
    }));

    let mut okays = 0;
    while let Some(resp) = rx.recv().await {
        if let BroadcastResponse::Write(resp) = resp {
            if !resp.okay {
                return Ok(FillStatus::Rejected(resp.proposal));
            }
            okays += 1;
            if okays >= quorum {
                break;
            }
        }
    }
    if okays < quorum {
        return Ok(FillStatus::Incomplete);
    }

    replica
        .fill(Action {
            position,
            promised: proposal,
            performed: proposal,
            learned: Some(true),
            op,
        })
        .await?;
    Ok(FillStatus::Done)
}
