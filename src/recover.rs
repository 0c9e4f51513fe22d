//! Recovery: the lifecycle that turns an EMPTY or interrupted replica into
//! a VOTING member without violating safety. The recovering replica stays
//! silent toward promise/write requests until its log is complete, so it can
//! never be counted in a quorum prematurely.
//!
//! The driver is stateless across rounds: each round probes the network
//! with a `RecoverRequest` broadcast, inspects the collected responses, and
//! either persists a status transition (continuing immediately) or waits
//! out the retry cadence.

use crate::catchup::catchup;
use crate::message::{RecoverRequest, RecoverResponse, Status};
use crate::network::{BroadcastRequest, BroadcastResponse, Cmp, Network};
use crate::replica::Replica;
use crate::utils::{RepLogError, Timer};

use tokio::time::Duration;

/// Cadence of recovery probe broadcasts.
const RECOVER_INTERVAL: Duration = Duration::from_secs(10);

/// Per-round timeout handed to catch-up while recovering.
const CATCHUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives `replica` through the recovery state machine until it is a
/// voting member, then returns it.
///
/// With `autoinit`, a completely fresh group bootstraps itself: members
/// move to STARTING once the whole network reports EMPTY/STARTING, and to
/// VOTING once the whole network reports STARTING/VOTING, so nobody
/// finishes before every member has been asked to recover. Without
/// `autoinit` (or once any member has data), ordinary recovery applies:
/// wait for a quorum of voting members, then catch up over their range.
pub async fn recover(
    quorum: usize,
    replica: Replica,
    network: Network,
    autoinit: bool,
) -> Result<Replica, RepLogError> {
    let interval = Timer::new();
    loop {
        let status = replica.info().await?.status;
        if status == Status::Voting {
            pf_info!(replica.id(); "recovery complete");
            return Ok(replica);
        }

        let progressed =
            step(quorum, &replica, &network, autoinit, status).await?;
        if !progressed {
            interval.kickoff(RECOVER_INTERVAL)?;
            interval.timeout().await;
        }
    }
}

/// One probe round. Returns whether a status transition was made.
async fn step(
    quorum: usize,
    replica: &Replica,
    network: &Network,
    autoinit: bool,
    status: Status,
) -> Result<bool, RepLogError> {
    // snapshot of the network size; replicas answer probes in every
    // status, so a full network yields this many responses
    let size = network.watch(0, Cmp::GreaterThanOrEqualTo).await?;

    let mut rx =
        network.broadcast(BroadcastRequest::Recover(RecoverRequest {}));
    let mut responses: Vec<RecoverResponse> = Vec::new();
    while let Some(resp) = rx.recv().await {
        if let BroadcastResponse::Recover(resp) = resp {
            responses.push(resp);
        }
    }

    let voting: Vec<&RecoverResponse> = responses
        .iter()
        .filter(|resp| resp.status == Status::Voting)
        .collect();

    match status {
        Status::Empty => {
            if responses.iter().any(|resp| {
                matches!(resp.status, Status::Voting | Status::Recovering)
            }) {
                // the group has data; join it through ordinary recovery
                replica.set_status(Status::Starting).await?;
                Ok(true)
            } else if autoinit
                && responses.len() >= size
                && responses.iter().all(|resp| {
                    matches!(resp.status, Status::Empty | Status::Starting)
                })
            {
                replica.set_status(Status::Starting).await?;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        Status::Starting => {
            // fresh-cluster bring-up: everyone has participated and nobody
            // holds data, so there is nothing to catch up on. Checked ahead
            // of ordinary recovery so that members finishing early do not
            // push the stragglers through a pointless catch-up.
            let fresh = autoinit
                && responses.len() >= size
                && responses.iter().all(|resp| {
                    matches!(resp.status, Status::Starting | Status::Voting)
                        && resp.begin == 0
                        && resp.end == 0
                });
            if fresh {
                replica.set_status(Status::Voting).await?;
                Ok(true)
            } else if voting.len() >= quorum {
                replica.set_status(Status::Recovering).await?;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        Status::Recovering => {
            if voting.len() < quorum {
                return Ok(false);
            }
            let begin =
                voting.iter().map(|resp| resp.begin).min().unwrap_or(0);
            let end = voting.iter().map(|resp| resp.end).max().unwrap_or(0);
            pf_info!(replica.id(); "catching up on positions [{}, {}]",
                                   begin, end);
            catchup(
                quorum,
                replica.clone(),
                network.clone(),
                None,
                (begin..=end).collect(),
                CATCHUP_TIMEOUT,
            )
            .await?;
            replica.set_status(Status::Voting).await?;
            Ok(true)
        }

        Status::Voting => Ok(true),
    }
}
