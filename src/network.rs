//! The network actor: owns the current set of peer replica handles, offers
//! predicate watches over the set size, and broadcasts protocol requests to
//! every peer, streaming responses back as they arrive.
//!
//! Only handles (addresses) live here; the network never reaches into a
//! replica's internals. An external membership source drives `add`/`remove`.

use std::collections::HashMap;

use crate::message::{
    LearnedMessage, PromiseRequest, PromiseResponse, RecoverRequest,
    RecoverResponse, WriteRequest, WriteResponse,
};
use crate::replica::{Replica, ReplicaId};
use crate::utils::RepLogError;

use tokio::sync::{mpsc, oneshot};

/// Comparison operator for size watches.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Cmp {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
}

impl Cmp {
    /// Whether `size cmp n` holds.
    fn holds(self, size: usize, n: usize) -> bool {
        match self {
            Cmp::EqualTo => size == n,
            Cmp::NotEqualTo => size != n,
            Cmp::LessThan => size < n,
            Cmp::LessThanOrEqualTo => size <= n,
            Cmp::GreaterThan => size > n,
            Cmp::GreaterThanOrEqualTo => size >= n,
        }
    }
}

/// A request broadcast to every current peer.
#[derive(Debug, Clone)]
pub enum BroadcastRequest {
    Promise(PromiseRequest),
    Write(WriteRequest),
    Learned(LearnedMessage),
    Recover(RecoverRequest),
}

/// One peer's response to a broadcast request.
#[derive(Debug, Clone)]
pub enum BroadcastResponse {
    Promise(PromiseResponse),
    Write(WriteResponse),
    Recover(RecoverResponse),
}

/// Commands handled by the network actor.
enum NetworkCmd {
    Add(Replica),
    Remove(ReplicaId),
    Watch {
        size: usize,
        cmp: Cmp,
        reply: oneshot::Sender<usize>,
    },
    Broadcast {
        req: BroadcastRequest,
        tx: mpsc::UnboundedSender<BroadcastResponse>,
    },
}

/// Cloneable handle to a network actor.
#[derive(Debug, Clone)]
pub struct Network {
    tx: mpsc::UnboundedSender<NetworkCmd>,
}

impl Network {
    /// Spawns a network actor holding the given initial peer set.
    pub fn new(replicas: impl IntoIterator<Item = Replica>) -> Self {
        let peers: HashMap<ReplicaId, Replica> = replicas
            .into_iter()
            .map(|replica| (replica.id(), replica))
            .collect();
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = NetworkActor {
            peers,
            watchers: Vec::new(),
            rx,
        };
        tokio::spawn(actor.run());
        Network { tx }
    }

    /// Adds a peer to the set.
    pub fn add(&self, replica: Replica) -> Result<(), RepLogError> {
        self.tx
            .send(NetworkCmd::Add(replica))
            .map_err(|_| RepLogError::msg("network actor is gone"))
    }

    /// Removes a peer from the set.
    pub fn remove(&self, id: ReplicaId) -> Result<(), RepLogError> {
        self.tx
            .send(NetworkCmd::Remove(id))
            .map_err(|_| RepLogError::msg("network actor is gone"))
    }

    /// Watches for the set size to satisfy `size cmp n`, resolving with the
    /// size at the moment the predicate (first) holds. Registration happens
    /// immediately; the returned future resolves exactly once.
    pub fn watch(
        &self,
        n: usize,
        cmp: Cmp,
    ) -> impl std::future::Future<Output = Result<usize, RepLogError>> {
        let (reply, rx) = oneshot::channel();
        let sent = self
            .tx
            .send(NetworkCmd::Watch {
                size: n,
                cmp,
                reply,
            })
            .is_ok();
        async move {
            if !sent {
                return Err(RepLogError::msg("network actor is gone"));
            }
            rx.await
                .map_err(|_| RepLogError::msg("network actor is gone"))
        }
    }

    /// Broadcasts a request to every current peer. Responses stream out of
    /// the returned channel as they arrive; the caller may stop reading
    /// (drop the receiver) as soon as it has a quorum, discarding the rest.
    pub fn broadcast(
        &self,
        req: BroadcastRequest,
    ) -> mpsc::UnboundedReceiver<BroadcastResponse> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.tx.send(NetworkCmd::Broadcast { req, tx });
        rx
    }
}

/// The actor task owning the peer set.
struct NetworkActor {
    peers: HashMap<ReplicaId, Replica>,
    watchers: Vec<(usize, Cmp, oneshot::Sender<usize>)>,
    rx: mpsc::UnboundedReceiver<NetworkCmd>,
}

impl NetworkActor {
    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                NetworkCmd::Add(replica) => {
                    self.peers.insert(replica.id(), replica);
                    self.fire_watchers();
                }
                NetworkCmd::Remove(id) => {
                    self.peers.remove(&id);
                    self.fire_watchers();
                }
                NetworkCmd::Watch { size, cmp, reply } => {
                    if cmp.holds(self.peers.len(), size) {
                        let _ = reply.send(self.peers.len());
                    } else {
                        self.watchers.push((size, cmp, reply));
                    }
                }
                NetworkCmd::Broadcast { req, tx } => {
                    self.do_broadcast(req, tx);
                }
            }
        }
    }

    /// Resolves every pending watcher whose predicate now holds.
    fn fire_watchers(&mut self) {
        let size = self.peers.len();
        for (n, cmp, reply) in std::mem::take(&mut self.watchers) {
            if cmp.holds(size, n) {
                let _ = reply.send(size);
            } else {
                self.watchers.push((n, cmp, reply));
            }
        }
    }

    /// Fans a request out to all current peers, one task per peer. A peer
    /// that chooses not to (or cannot) respond simply contributes nothing;
    /// the response channel closes once every task has finished.
    fn do_broadcast(
        &self,
        req: BroadcastRequest,
        tx: mpsc::UnboundedSender<BroadcastResponse>,
    ) {
        for replica in self.peers.values() {
            let replica = replica.clone();
            let req = req.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                match req {
                    BroadcastRequest::Promise(r) => {
                        if let Ok(resp) = replica.promise(r).await {
                            let _ = tx.send(BroadcastResponse::Promise(resp));
                        }
                    }
                    BroadcastRequest::Write(r) => {
                        if let Ok(resp) = replica.write(r).await {
                            let _ = tx.send(BroadcastResponse::Write(resp));
                        }
                    }
                    BroadcastRequest::Learned(m) => {
                        replica.learned(m);
                    }
                    BroadcastRequest::Recover(r) => {
                        if let Ok(resp) = replica.recover(r).await {
                            let _ = tx.send(BroadcastResponse::Recover(resp));
                        }
                    }
                }
            });
        }
    }
}
