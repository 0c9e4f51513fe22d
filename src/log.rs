//! The log façade: a thin writer/reader API layered over the coordinator
//! and the local replica, with stable position identities that callers can
//! persist across restarts.

use std::fmt;
use std::path::Path;

use crate::coordinator::Coordinator;
use crate::message::Op;
use crate::network::Network;
use crate::replica::Replica;
use crate::utils::RepLogError;

use serde::Deserialize;

/// Timing knobs of a log's coordinator and catch-up machinery.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Per-round catch-up timeout in millisecs.
    pub catchup_timeout_ms: u64,

    /// Min randomized backoff before retrying a quorum-less round, in
    /// millisecs.
    pub backoff_min_ms: u64,

    /// Max randomized backoff before retrying a quorum-less round, in
    /// millisecs.
    pub backoff_max_ms: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            catchup_timeout_ms: 10_000,
            backoff_min_ms: 1_000,
            backoff_max_ms: 10_000,
        }
    }
}

/// A stable identity of one slot in the log. Positions order the same way
/// the log does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(pub(crate) u64);

impl Position {
    /// Serialized identity of this position: 8 big-endian bytes, ordered
    /// bytewise the same as the positions themselves. Safe to persist and
    /// feed back through `Log::position()` after a restart.
    pub fn identity(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One readable log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub position: Position,
    pub data: Vec<u8>,
}

/// A replicated log: one local replica plus the network of its peers.
pub struct Log {
    quorum: usize,
    config: LogConfig,
    replica: Replica,
    network: Network,
}

impl Log {
    /// Creates a log whose local replica lives at `path`, replicating
    /// across `peers` with the given quorum size. The local replica is
    /// part of the network it coordinates over.
    pub async fn new(
        quorum: usize,
        path: &Path,
        peers: impl IntoIterator<Item = Replica>,
    ) -> Result<Self, RepLogError> {
        Self::with_config(quorum, path, peers, LogConfig::default()).await
    }

    /// Same as `new()`, with explicit timing knobs.
    pub async fn with_config(
        quorum: usize,
        path: &Path,
        peers: impl IntoIterator<Item = Replica>,
        config: LogConfig,
    ) -> Result<Self, RepLogError> {
        let replica = Replica::new(path).await?;
        let network =
            Network::new(peers.into_iter().chain([replica.clone()]));
        Ok(Log {
            quorum,
            config,
            replica,
            network,
        })
    }

    /// Recovers a position from its serialized identity.
    pub fn position(&self, identity: &[u8]) -> Result<Position, RepLogError> {
        let bytes: [u8; 8] = identity
            .try_into()
            .map_err(|_| RepLogError::msg("invalid position identity"))?;
        Ok(Position(u64::from_be_bytes(bytes)))
    }

    /// The local replica underlying this log.
    pub fn replica(&self) -> &Replica {
        &self.replica
    }
}

/// Exclusive writer over a log. Only one writer in the group makes
/// progress at a time; a writer that lost leadership observes `None` from
/// its operations and must `start()` again.
pub struct Writer {
    coordinator: Coordinator,
}

impl Writer {
    /// Creates a writer over the given log.
    pub fn new(log: &Log) -> Self {
        Writer {
            coordinator: Coordinator::with_config(
                log.quorum,
                log.replica.clone(),
                log.network.clone(),
                log.config.clone(),
            ),
        }
    }

    /// Elects this writer, catching the local replica up to every position
    /// chosen so far. Returns the highest chosen position on success.
    pub async fn start(&mut self) -> Result<Option<Position>, RepLogError> {
        Ok(self.coordinator.elect().await?.map(Position))
    }

    /// Appends an entry; resolves to its position once chosen.
    pub async fn append(
        &mut self,
        data: &[u8],
    ) -> Result<Option<Position>, RepLogError> {
        Ok(self.coordinator.append(data).await?.map(Position))
    }

    /// Truncates the log up to (exclusive) `to`. Resolves to the position
    /// the truncation itself was recorded at, which is past `to`.
    pub async fn truncate(
        &mut self,
        to: Position,
    ) -> Result<Option<Position>, RepLogError> {
        Ok(self.coordinator.truncate(to.0).await?.map(Position))
    }
}

/// Reader over a log's local replica.
pub struct Reader {
    replica: Replica,
}

impl Reader {
    /// Creates a reader over the given log.
    pub fn new(log: &Log) -> Self {
        Reader {
            replica: log.replica.clone(),
        }
    }

    /// Reads the appended entries in positions `[from, to]`. Positions
    /// holding protocol bookkeeping (NOPs, truncations) are not surfaced.
    pub async fn read(
        &self,
        from: Position,
        to: Position,
    ) -> Result<Vec<Entry>, RepLogError> {
        let actions = self.replica.read(from.0, to.0).await?;
        Ok(actions
            .into_iter()
            .filter_map(|action| match action.op {
                Op::Append { bytes } => Some(Entry {
                    position: Position(action.position),
                    data: bytes,
                }),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod log_tests {
    use super::*;
    use crate::storage::initialize;

    async fn initialized_replica(
        path: &str,
    ) -> Result<Replica, RepLogError> {
        let _ = tokio::fs::remove_file(path).await;
        let path = Path::new(path);
        initialize(path).await?;
        Replica::new(path).await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn write_read() -> Result<(), RepLogError> {
        let replica1 =
            initialized_replica("/tmp/test-replog-log-0.redb").await?;

        let path2 = "/tmp/test-replog-log-1.redb";
        let _ = tokio::fs::remove_file(path2).await;
        initialize(Path::new(path2)).await?;

        let log = Log::new(2, Path::new(path2), [replica1]).await?;
        let mut writer = Writer::new(&log);

        let start = writer.start().await?;
        assert!(start.is_some());

        let position = writer.append(b"hello world").await?.unwrap();

        let reader = Reader::new(&log);
        let entries = reader.read(position, position).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].position, position);
        assert_eq!(entries[0].data, b"hello world".to_vec());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn position_identity() -> Result<(), RepLogError> {
        let replica1 =
            initialized_replica("/tmp/test-replog-log-2.redb").await?;

        let path2 = "/tmp/test-replog-log-3.redb";
        let _ = tokio::fs::remove_file(path2).await;
        initialize(Path::new(path2)).await?;

        let log = Log::new(2, Path::new(path2), [replica1]).await?;
        let mut writer = Writer::new(&log);

        assert!(writer.start().await?.is_some());
        let position = writer.append(b"hello world").await?.unwrap();

        assert_eq!(position, log.position(&position.identity())?);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn truncate_round_trip() -> Result<(), RepLogError> {
        let replica1 =
            initialized_replica("/tmp/test-replog-log-4.redb").await?;

        let path2 = "/tmp/test-replog-log-5.redb";
        let _ = tokio::fs::remove_file(path2).await;
        initialize(Path::new(path2)).await?;

        let log = Log::new(2, Path::new(path2), [replica1]).await?;
        let mut writer = Writer::new(&log);
        assert!(writer.start().await?.is_some());

        let mut last = None;
        for i in 1..=5u64 {
            last = writer.append(i.to_string().as_bytes()).await?;
            assert!(last.is_some());
        }
        let last = last.unwrap();

        // truncate everything below the 3rd entry
        let cut = log.position(&3u64.to_be_bytes())?;
        let truncated = writer.truncate(cut).await?.unwrap();
        assert!(truncated > last);

        let reader = Reader::new(&log);
        assert!(reader.read(Position(2), last).await.is_err());
        let entries = reader.read(cut, last).await?;
        assert_eq!(entries.len(), 3);
        Ok(())
    }
}
