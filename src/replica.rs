//! The replica actor: one Multi-Paxos acceptor/learner over log positions,
//! owning its durable storage exclusively. All interaction goes through the
//! cloneable `Replica` handle; the actor is single-threaded with respect to
//! its own state, so the check-persist-reply sequences of the promise and
//! write protocols are uninterruptible.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::message::{
    Action, LearnedMessage, Metadata, Op, PromiseRequest, PromiseResponse,
    Proposal, RecoverRequest, RecoverResponse, Status, WriteRequest,
    WriteResponse,
};
use crate::storage::{DiskStorage, Storage};
use crate::utils::RepLogError;

use tokio::sync::{mpsc, oneshot};

/// Replica ID type: a process-unique handle identity, allocated from a
/// global counter like a PID would be.
pub type ReplicaId = u64;

/// Global allocator of replica IDs.
static NEXT_REPLICA_ID: AtomicU64 = AtomicU64::new(1);

/// Snapshot of a replica's volatile view of its durable state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ReplicaInfo {
    pub status: Status,
    pub promised: Proposal,
    pub begin: u64,
    pub end: u64,
}

/// Requests handled by the replica actor. The first four are the wire
/// messages peers may send; the rest are local-only operations available to
/// the owner of the handle (coordinator, catch-up, recovery, reader).
#[derive(Debug)]
pub(crate) enum ReplicaRequest {
    Promise {
        req: PromiseRequest,
        reply: oneshot::Sender<PromiseResponse>,
    },
    Write {
        req: WriteRequest,
        reply: oneshot::Sender<WriteResponse>,
    },
    Learned {
        msg: LearnedMessage,
    },
    Recover {
        req: RecoverRequest,
        reply: oneshot::Sender<RecoverResponse>,
    },
    Read {
        from: u64,
        to: u64,
        reply: oneshot::Sender<Result<Vec<Action>, RepLogError>>,
    },
    Fill {
        action: Action,
        reply: oneshot::Sender<()>,
    },
    Missing {
        from: u64,
        to: u64,
        reply: oneshot::Sender<Vec<u64>>,
    },
    Info {
        reply: oneshot::Sender<ReplicaInfo>,
    },
    SetStatus {
        status: Status,
        reply: oneshot::Sender<()>,
    },
    Terminate {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a replica actor. Holds only the actor's mailbox
/// sender; equality and hashing go by the actor's ID, so a handle can be
/// used as a network peer address.
#[derive(Debug, Clone)]
pub struct Replica {
    id: ReplicaId,
    tx: mpsc::UnboundedSender<ReplicaRequest>,
}

impl PartialEq for Replica {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Replica {}

impl std::hash::Hash for Replica {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Replica {
    /// Spawns a replica actor over disk-backed storage at `path`.
    pub async fn new(path: &Path) -> Result<Self, RepLogError> {
        Self::with_storage(Box::new(DiskStorage::new()), path).await
    }

    /// Spawns a replica actor over the given storage implementation.
    pub async fn with_storage(
        mut storage: Box<dyn Storage>,
        path: &Path,
    ) -> Result<Self, RepLogError> {
        let state = storage.restore(path).await?;
        let id = NEXT_REPLICA_ID.fetch_add(1, Ordering::Relaxed);
        pf_info!(id; "replica restored at '{}': status {:?} promised {} [{}, {}]",
                     path.display(), state.metadata.status,
                     state.metadata.promised, state.begin, state.end);

        let (tx, rx) = mpsc::unbounded_channel();
        let actor = ReplicaActor {
            id,
            storage,
            metadata: state.metadata,
            begin: state.begin,
            end: state.end,
            rx,
        };
        tokio::spawn(actor.run());

        Ok(Replica { id, tx })
    }

    /// This replica's process-unique ID.
    pub fn id(&self) -> ReplicaId {
        self.id
    }

    fn request<'a, T: 'a>(
        &'a self,
        req: ReplicaRequest,
        rx: oneshot::Receiver<T>,
    ) -> impl std::future::Future<Output = Result<T, RepLogError>> + 'a {
        let sent = self.tx.send(req).is_ok();
        async move {
            if !sent {
                return logged_err!(self.id; "replica actor is gone");
            }
            // a dropped reply sender means the replica chose not to (or
            // could not) respond
            rx.await
                .map_err(|_| RepLogError::msg("no response from replica"))
        }
    }

    /// Sends a Phase 1 promise request.
    pub async fn promise(
        &self,
        req: PromiseRequest,
    ) -> Result<PromiseResponse, RepLogError> {
        let (reply, rx) = oneshot::channel();
        self.request(ReplicaRequest::Promise { req, reply }, rx).await
    }

    /// Sends a Phase 2 write request.
    pub async fn write(
        &self,
        req: WriteRequest,
    ) -> Result<WriteResponse, RepLogError> {
        let (reply, rx) = oneshot::channel();
        self.request(ReplicaRequest::Write { req, reply }, rx).await
    }

    /// Sends a learned notification (best-effort, no response).
    pub fn learned(&self, msg: LearnedMessage) {
        let _ = self.tx.send(ReplicaRequest::Learned { msg });
    }

    /// Sends a recovery probe.
    pub async fn recover(
        &self,
        req: RecoverRequest,
    ) -> Result<RecoverResponse, RepLogError> {
        let (reply, rx) = oneshot::channel();
        self.request(ReplicaRequest::Recover { req, reply }, rx).await
    }

    /// Reads the actions stored in positions `[from, to]`.
    pub async fn read(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<Action>, RepLogError> {
        let (reply, rx) = oneshot::channel();
        self.request(ReplicaRequest::Read { from, to, reply }, rx)
            .await?
    }

    /// Persists a chosen action locally, marked learned. Local-only; used
    /// by catch-up once a value is known to be chosen.
    pub(crate) async fn fill(
        &self,
        action: Action,
    ) -> Result<(), RepLogError> {
        let (reply, rx) = oneshot::channel();
        self.request(ReplicaRequest::Fill { action, reply }, rx).await
    }

    /// Returns the positions in `[from, to]` without a learned action.
    pub(crate) async fn missing(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<u64>, RepLogError> {
        let (reply, rx) = oneshot::channel();
        self.request(ReplicaRequest::Missing { from, to, reply }, rx)
            .await
    }

    /// Snapshots the replica's current status, promised floor, and range.
    pub async fn info(&self) -> Result<ReplicaInfo, RepLogError> {
        let (reply, rx) = oneshot::channel();
        self.request(ReplicaRequest::Info { reply }, rx).await
    }

    /// Persists a lifecycle status transition. Local-only; driven by the
    /// recovery procedure.
    pub(crate) async fn set_status(
        &self,
        status: Status,
    ) -> Result<(), RepLogError> {
        let (reply, rx) = oneshot::channel();
        self.request(ReplicaRequest::SetStatus { status, reply }, rx)
            .await
    }

    /// Shuts the replica actor down, releasing its storage. Requests queued
    /// behind this one (from any handle clone) are discarded.
    pub async fn terminate(&self) -> Result<(), RepLogError> {
        let (reply, rx) = oneshot::channel();
        self.request(ReplicaRequest::Terminate { reply }, rx).await
    }
}

/// The actor task owning one replica's storage and volatile state.
struct ReplicaActor {
    id: ReplicaId,
    storage: Box<dyn Storage>,
    metadata: Metadata,
    begin: u64,
    end: u64,
    rx: mpsc::UnboundedReceiver<ReplicaRequest>,
}

impl ReplicaActor {
    /// Actor loop. A storage error is fail-stop: the loop terminates and
    /// every outstanding or future request observes a dead channel instead
    /// of a reply that might lie about durability.
    async fn run(mut self) {
        pf_debug!(self.id; "replica actor spawned");

        let mut terminated = None;
        while let Some(req) = self.rx.recv().await {
            if let ReplicaRequest::Terminate { reply } = req {
                terminated = Some(reply);
                break;
            }
            if let Err(e) = self.handle(req).await {
                pf_error!(self.id; "storage failure, halting replica: {}", e);
                break;
            }
        }

        let ReplicaActor { id, storage, .. } = self;
        drop(storage); // release before acking termination
        if let Some(reply) = terminated {
            let _ = reply.send(());
        }
        pf_debug!(id; "replica actor exitted");
    }

    async fn handle(
        &mut self,
        req: ReplicaRequest,
    ) -> Result<(), RepLogError> {
        match req {
            ReplicaRequest::Promise { req, reply } => {
                if let Some(resp) = self.handle_promise(req).await? {
                    let _ = reply.send(resp);
                }
            }
            ReplicaRequest::Write { req, reply } => {
                if let Some(resp) = self.handle_write(req).await? {
                    let _ = reply.send(resp);
                }
            }
            ReplicaRequest::Learned { msg } => {
                self.handle_learned(msg).await?;
            }
            ReplicaRequest::Recover { req: _, reply } => {
                // recovery probes are answered in every status
                let _ = reply.send(RecoverResponse {
                    status: self.metadata.status,
                    begin: self.begin,
                    end: self.end,
                });
            }
            ReplicaRequest::Read { from, to, reply } => {
                let result = self.handle_read(from, to).await?;
                let _ = reply.send(result);
            }
            ReplicaRequest::Fill { action, reply } => {
                self.handle_fill(action).await?;
                let _ = reply.send(());
            }
            ReplicaRequest::Missing { from, to, reply } => {
                let missing = self.handle_missing(from, to).await?;
                let _ = reply.send(missing);
            }
            ReplicaRequest::Info { reply } => {
                let _ = reply.send(ReplicaInfo {
                    status: self.metadata.status,
                    promised: self.metadata.promised,
                    begin: self.begin,
                    end: self.end,
                });
            }
            ReplicaRequest::SetStatus { status, reply } => {
                pf_info!(self.id; "status {:?} -> {:?}",
                                  self.metadata.status, status);
                self.metadata.status = status;
                self.storage.persist_metadata(&self.metadata).await?;
                let _ = reply.send(());
            }
            ReplicaRequest::Terminate { .. } => unreachable!(),
        }
        Ok(())
    }

    /// Phase 1. Returns `None` when the request must be silently ignored
    /// (this replica is not a voting member).
    async fn handle_promise(
        &mut self,
        req: PromiseRequest,
    ) -> Result<Option<PromiseResponse>, RepLogError> {
        if self.metadata.status != Status::Voting {
            pf_debug!(self.id; "ignored promise request: status {:?}",
                               self.metadata.status);
            return Ok(None);
        }

        match req.position {
            None => {
                // all-positions promise (election)
                if req.proposal <= self.metadata.promised {
                    pf_trace!(self.id; "promise {} rejected, promised {}",
                                       req.proposal, self.metadata.promised);
                    return Ok(Some(PromiseResponse {
                        okay: false,
                        proposal: self.metadata.promised,
                        position: None,
                        action: None,
                    }));
                }

                self.metadata.promised = req.proposal;
                self.storage.persist_metadata(&self.metadata).await?;
                pf_trace!(self.id; "promised {} (end {})",
                                   req.proposal, self.end);
                Ok(Some(PromiseResponse {
                    okay: true,
                    proposal: req.proposal,
                    position: Some(self.end),
                    action: None,
                }))
            }

            Some(position) => {
                // position-scoped promise (catch-up). Equality is allowed:
                // such a request only ever follows a successful
                // all-positions round at the same proposal.
                if req.proposal < self.metadata.promised {
                    return Ok(Some(PromiseResponse {
                        okay: false,
                        proposal: self.metadata.promised,
                        position: None,
                        action: None,
                    }));
                }

                if req.proposal > self.metadata.promised {
                    self.metadata.promised = req.proposal;
                    self.storage.persist_metadata(&self.metadata).await?;
                }
                let action = self.storage.read(position).await?;
                Ok(Some(PromiseResponse {
                    okay: true,
                    proposal: req.proposal,
                    position: None,
                    action,
                }))
            }
        }
    }

    /// Phase 2. Returns `None` when the request must be silently ignored.
    async fn handle_write(
        &mut self,
        req: WriteRequest,
    ) -> Result<Option<WriteResponse>, RepLogError> {
        if self.metadata.status != Status::Voting {
            pf_debug!(self.id; "ignored write request: status {:?}",
                               self.metadata.status);
            return Ok(None);
        }

        if req.proposal < self.metadata.promised {
            pf_trace!(self.id; "write {} at {} rejected, promised {}",
                               req.proposal, req.position,
                               self.metadata.promised);
            return Ok(Some(WriteResponse {
                okay: false,
                proposal: self.metadata.promised,
                position: req.position,
            }));
        }

        if let Some(existing) = self.storage.read(req.position).await? {
            if existing.performed > req.proposal {
                return Ok(Some(WriteResponse {
                    okay: false,
                    proposal: existing.performed.max(self.metadata.promised),
                    position: req.position,
                }));
            }
            if existing.is_learned() {
                // value already chosen here; re-accepting cannot change it
                return Ok(Some(WriteResponse {
                    okay: true,
                    proposal: req.proposal,
                    position: req.position,
                }));
            }
        }

        // accepting implies promising at least as high
        if req.proposal > self.metadata.promised {
            self.metadata.promised = req.proposal;
            self.storage.persist_metadata(&self.metadata).await?;
        }

        let action = Action {
            position: req.position,
            promised: self.metadata.promised,
            performed: req.proposal,
            learned: None,
            op: req.op,
        };
        self.persist(&action).await?;
        pf_trace!(self.id; "accepted write {} at {}",
                           req.proposal, req.position);
        Ok(Some(WriteResponse {
            okay: true,
            proposal: req.proposal,
            position: req.position,
        }))
    }

    /// Marks the locally stored action at the given position learned, if
    /// any. Idempotent, accepted in every status.
    async fn handle_learned(
        &mut self,
        msg: LearnedMessage,
    ) -> Result<(), RepLogError> {
        if let Some(mut action) = self.storage.read(msg.position).await? {
            if !action.is_learned() {
                action.learned = Some(true);
                self.persist(&action).await?;
                pf_trace!(self.id; "learned position {}", msg.position);
            }
        }
        Ok(())
    }

    /// Persists a chosen action with the learned flag set. Accepted in
    /// every status (a recovering replica fills itself through this path).
    async fn handle_fill(
        &mut self,
        mut action: Action,
    ) -> Result<(), RepLogError> {
        action.learned = Some(true);
        self.persist(&action).await?;
        pf_trace!(self.id; "filled position {}", action.position);
        Ok(())
    }

    /// Range read. The outer `Result` is the actor's own storage health;
    /// the inner one is the caller-visible outcome.
    async fn handle_read(
        &mut self,
        from: u64,
        to: u64,
    ) -> Result<Result<Vec<Action>, RepLogError>, RepLogError> {
        if from < self.begin {
            return Ok(Err(RepLogError(
                "Bad read range (truncated position)".into(),
            )));
        }
        if to > self.end {
            return Ok(Err(RepLogError(
                "Bad read range (past end of log)".into(),
            )));
        }

        let mut actions = Vec::new();
        for position in from..=to {
            if let Some(action) = self.storage.read(position).await? {
                actions.push(action);
            }
        }
        Ok(Ok(actions))
    }

    /// Positions in `[from, to]` that hold no learned action yet.
    async fn handle_missing(
        &mut self,
        from: u64,
        to: u64,
    ) -> Result<Vec<u64>, RepLogError> {
        let mut missing = Vec::new();
        for position in from..=to {
            match self.storage.read(position).await? {
                Some(action) if action.is_learned() => {}
                _ => missing.push(position),
            }
        }
        Ok(missing)
    }

    /// Writes an action through storage and mirrors the range bounds.
    async fn persist(&mut self, action: &Action) -> Result<(), RepLogError> {
        self.storage.persist_action(action).await?;
        self.end = self.end.max(action.position);
        if let Op::Truncate { to } = action.op {
            self.begin = self.begin.max(to);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test-only plumbing for simulating an unreliable message layer:
    //! wraps a replica handle so that selected requests get dropped on the
    //! floor instead of delivered.

    use super::*;

    /// Returns a handle aliasing `replica` that silently discards matching
    /// requests: the first `count` of them, or all when `count` is `None`.
    pub(crate) fn dropping(
        replica: &Replica,
        count: Option<usize>,
        filter: fn(&ReplicaRequest) -> bool,
    ) -> Replica {
        let inner = replica.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut remaining = count;
            while let Some(req) = rx.recv().await {
                let dropped = filter(&req)
                    && match remaining {
                        None => true,
                        Some(0) => false,
                        Some(ref mut n) => {
                            *n -= 1;
                            true
                        }
                    };
                if !dropped {
                    let _ = inner.tx.send(req);
                }
            }
        });
        Replica {
            id: replica.id,
            tx,
        }
    }

    pub(crate) fn is_learned(req: &ReplicaRequest) -> bool {
        matches!(req, ReplicaRequest::Learned { .. })
    }

    pub(crate) fn is_promise(req: &ReplicaRequest) -> bool {
        matches!(req, ReplicaRequest::Promise { .. })
    }

    pub(crate) fn is_recover(req: &ReplicaRequest) -> bool {
        matches!(req, ReplicaRequest::Recover { .. })
    }
}

#[cfg(test)]
mod replica_tests {
    use super::*;
    use crate::storage::{initialize, MemStorage, Storage};

    async fn voting_replica() -> Result<Replica, RepLogError> {
        let mut storage = MemStorage::new();
        storage
            .persist_metadata(&Metadata {
                status: Status::Voting,
                promised: 0,
            })
            .await?;
        Replica::with_storage(Box::new(storage), Path::new("/unused")).await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn promise() -> Result<(), RepLogError> {
        let replica = voting_replica().await?;

        let response = replica
            .promise(PromiseRequest {
                proposal: 2,
                position: None,
            })
            .await?;
        assert!(response.okay);
        assert_eq!(response.proposal, 2);
        assert_eq!(response.position, Some(0));
        assert_eq!(response.action, None);

        // lower proposal gets rejected with the highest seen so far
        let response = replica
            .promise(PromiseRequest {
                proposal: 1,
                position: None,
            })
            .await?;
        assert!(!response.okay);
        assert_eq!(response.proposal, 2);
        assert_eq!(response.position, None);
        assert_eq!(response.action, None);

        let response = replica
            .promise(PromiseRequest {
                proposal: 3,
                position: None,
            })
            .await?;
        assert!(response.okay);
        assert_eq!(response.proposal, 3);
        assert_eq!(response.position, Some(0));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn append() -> Result<(), RepLogError> {
        let replica = voting_replica().await?;

        let response = replica
            .promise(PromiseRequest {
                proposal: 1,
                position: None,
            })
            .await?;
        assert!(response.okay);

        let response = replica
            .write(WriteRequest {
                proposal: 1,
                position: 1,
                op: Op::Append {
                    bytes: b"hello world".to_vec(),
                },
            })
            .await?;
        assert!(response.okay);
        assert_eq!(response.proposal, 1);
        assert_eq!(response.position, 1);

        let actions = replica.read(1, 1).await?;
        assert_eq!(actions.len(), 1);
        let action = &actions[0];
        assert_eq!(action.position, 1);
        assert_eq!(action.promised, 1);
        assert_eq!(action.performed, 1);
        assert_eq!(action.learned, None);
        assert_eq!(
            action.op,
            Op::Append {
                bytes: b"hello world".to_vec()
            }
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stale_write_rejected() -> Result<(), RepLogError> {
        let replica = voting_replica().await?;

        let response = replica
            .promise(PromiseRequest {
                proposal: 5,
                position: None,
            })
            .await?;
        assert!(response.okay);

        let response = replica
            .write(WriteRequest {
                proposal: 3,
                position: 1,
                op: Op::Append {
                    bytes: b"stale".to_vec(),
                },
            })
            .await?;
        assert!(!response.okay);
        assert_eq!(response.proposal, 5);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn restore() -> Result<(), RepLogError> {
        let path = Path::new("/tmp/test-replog-replica-restore.redb");
        let _ = tokio::fs::remove_file(path).await;
        initialize(path).await?;

        let replica1 = Replica::new(path).await?;
        let response = replica1
            .promise(PromiseRequest {
                proposal: 1,
                position: None,
            })
            .await?;
        assert!(response.okay);
        let response = replica1
            .write(WriteRequest {
                proposal: 1,
                position: 1,
                op: Op::Append {
                    bytes: b"hello world".to_vec(),
                },
            })
            .await?;
        assert!(response.okay);

        // shut the first replica down, then bring a second one up over the
        // same directory and check the restored view
        replica1.terminate().await?;

        let replica2 = Replica::new(path).await?;
        let actions = replica2.read(1, 1).await?;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].position, 1);
        assert_eq!(actions[0].promised, 1);
        assert_eq!(actions[0].performed, 1);
        assert_eq!(actions[0].learned, None);
        assert_eq!(
            actions[0].op,
            Op::Append {
                bytes: b"hello world".to_vec()
            }
        );

        let info = replica2.info().await?;
        assert_eq!(info.promised, 1);
        assert_eq!(info.end, 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn non_voting_is_silent() -> Result<(), RepLogError> {
        // no initialization: the replica restores as Empty
        let replica = Replica::with_storage(
            Box::new(MemStorage::new()),
            Path::new("/unused"),
        )
        .await?;

        assert!(replica
            .promise(PromiseRequest {
                proposal: 2,
                position: None,
            })
            .await
            .is_err());

        assert!(replica
            .write(WriteRequest {
                proposal: 3,
                position: 1,
                op: Op::Append {
                    bytes: b"hello world".to_vec(),
                },
            })
            .await
            .is_err());

        // recovery probes are still answered
        let response = replica.recover(RecoverRequest {}).await?;
        assert_eq!(response.status, Status::Empty);
        assert_eq!(response.begin, 0);
        assert_eq!(response.end, 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn read_range_errors() -> Result<(), RepLogError> {
        let replica = voting_replica().await?;
        replica
            .promise(PromiseRequest {
                proposal: 1,
                position: None,
            })
            .await?;
        for position in 0..3u64 {
            let response = replica
                .write(WriteRequest {
                    proposal: 1,
                    position,
                    op: Op::Append {
                        bytes: position.to_string().into_bytes(),
                    },
                })
                .await?;
            assert!(response.okay);
        }
        let response = replica
            .write(WriteRequest {
                proposal: 1,
                position: 3,
                op: Op::Truncate { to: 2 },
            })
            .await?;
        assert!(response.okay);

        assert_eq!(
            replica.read(1, 3).await.unwrap_err(),
            RepLogError("Bad read range (truncated position)".into())
        );
        assert_eq!(
            replica.read(2, 4).await.unwrap_err(),
            RepLogError("Bad read range (past end of log)".into())
        );
        assert_eq!(replica.read(2, 3).await?.len(), 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn learned_marks_action() -> Result<(), RepLogError> {
        let replica = voting_replica().await?;
        replica
            .promise(PromiseRequest {
                proposal: 1,
                position: None,
            })
            .await?;
        replica
            .write(WriteRequest {
                proposal: 1,
                position: 1,
                op: Op::Append {
                    bytes: b"x".to_vec(),
                },
            })
            .await?;

        replica.learned(LearnedMessage { position: 1 });
        // marking a hole is a no-op, not an error
        replica.learned(LearnedMessage { position: 9 });

        // the mailbox is ordered, so this read observes both messages
        let actions = replica.read(1, 1).await?;
        assert_eq!(actions[0].learned, Some(true));

        let missing = replica.missing(0, 1).await?;
        assert_eq!(missing, vec![0]);
        Ok(())
    }
}
