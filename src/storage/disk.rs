//! Disk-backed storage implementation on top of `redb`, an embedded
//! ordered transactional key/value store.

use std::path::Path;

use crate::message::{Action, Metadata, Op};
use crate::storage::{State, Storage};
use crate::utils::RepLogError;

use async_trait::async_trait;

use redb::{Database, ReadableTable, TableDefinition};

use rmp_serde::decode::from_slice as decode_from_slice;
use rmp_serde::encode::to_vec as encode_to_vec;

/// Action records: key = log position, value = MessagePack-encoded `Action`.
/// redb orders `u64` keys numerically, which is exactly the big-endian
/// byte-key ordering the on-disk format asks for.
const ACTIONS_TABLE: TableDefinition<u64, &[u8]> =
    TableDefinition::new("actions");

/// Metadata record under a fixed sentinel key.
const META_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("metadata");

/// Sentinel key of the metadata record.
const META_KEY: &str = "META";

/// Disk-backed storage. All commits are made with full durability, so every
/// successful persist has hit stable storage on return.
pub struct DiskStorage {
    /// Opened database; `None` until `restore()`.
    db: Option<Database>,

    /// Lowest non-truncated position held.
    begin: u64,

    /// Highest known position.
    end: u64,
}

impl DiskStorage {
    /// Creates a new, not-yet-opened disk storage.
    pub fn new() -> Self {
        DiskStorage {
            db: None,
            begin: 0,
            end: 0,
        }
    }

    fn db(&self) -> Result<&Database, RepLogError> {
        self.db
            .as_ref()
            .ok_or_else(|| RepLogError::msg("store has not been restored"))
    }
}

impl Default for DiskStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for DiskStorage {
    async fn restore(&mut self, path: &Path) -> Result<State, RepLogError> {
        let db = Database::create(path)?;

        // make sure both tables exist so later read transactions cannot
        // race table creation
        let txn = db.begin_write()?;
        {
            txn.open_table(ACTIONS_TABLE)?;
            txn.open_table(META_TABLE)?;
        }
        txn.commit()?;

        let txn = db.begin_read()?;
        let meta_table = txn.open_table(META_TABLE)?;
        let metadata = match meta_table.get(META_KEY)? {
            Some(guard) => decode_from_slice(guard.value())?,
            None => Metadata::default(),
        };

        // derive begin/end from the stored actions: begin is the highest
        // truncation target seen (truncation targets never decrease), or
        // the lowest stored position when nothing was ever truncated
        let actions_table = txn.open_table(ACTIONS_TABLE)?;
        let mut lowest: Option<u64> = None;
        let mut truncated_to: Option<u64> = None;
        let mut end = 0;
        for entry in actions_table.iter()? {
            let (key, value) = entry?;
            let position = key.value();
            lowest.get_or_insert(position);
            end = position;
            let action: Action = decode_from_slice(value.value())?;
            if let Op::Truncate { to } = action.op {
                truncated_to =
                    Some(truncated_to.map_or(to, |prev: u64| prev.max(to)));
            }
        }
        let begin = truncated_to.or(lowest).unwrap_or(0);
        drop(actions_table);
        drop(meta_table);
        drop(txn);

        self.db = Some(db);
        self.begin = begin;
        self.end = end;
        Ok(State {
            metadata,
            begin,
            end,
        })
    }

    async fn persist_action(
        &mut self,
        action: &Action,
    ) -> Result<(), RepLogError> {
        let txn = self.db()?.begin_write()?;
        {
            let mut table = txn.open_table(ACTIONS_TABLE)?;
            let bytes = encode_to_vec(action)?;
            table.insert(action.position, bytes.as_slice())?;

            if let Op::Truncate { to } = action.op {
                let new_begin = self.begin.max(to);
                // deleting by range scan touches only positions actually
                // present, never the truncation distance
                let doomed = table
                    .range(self.begin..new_begin)?
                    .map(|entry| entry.map(|(key, _)| key.value()))
                    .collect::<Result<Vec<u64>, _>>()?;
                for position in doomed {
                    table.remove(position)?;
                }
            }
        }
        txn.commit()?;

        self.end = self.end.max(action.position);
        if let Op::Truncate { to } = action.op {
            self.begin = self.begin.max(to);
        }
        Ok(())
    }

    async fn persist_metadata(
        &mut self,
        metadata: &Metadata,
    ) -> Result<(), RepLogError> {
        let txn = self.db()?.begin_write()?;
        {
            let mut table = txn.open_table(META_TABLE)?;
            let bytes = encode_to_vec(metadata)?;
            table.insert(META_KEY, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn read(
        &mut self,
        position: u64,
    ) -> Result<Option<Action>, RepLogError> {
        let txn = self.db()?.begin_read()?;
        let table = txn.open_table(ACTIONS_TABLE)?;
        match table.get(position)? {
            Some(guard) => Ok(Some(decode_from_slice(guard.value())?)),
            None => Ok(None),
        }
    }
}
