//! In-memory storage implementation. Nothing survives a restart; intended
//! for unit tests and protocol simulations where durability is irrelevant.

use std::collections::BTreeMap;
use std::path::Path;

use crate::message::{Action, Metadata, Op};
use crate::storage::{State, Storage};
use crate::utils::RepLogError;

use async_trait::async_trait;

/// Memory-backed storage over a `BTreeMap` keyed by position.
#[derive(Debug, Default)]
pub struct MemStorage {
    actions: BTreeMap<u64, Action>,
    metadata: Metadata,
    begin: u64,
    end: u64,
}

impl MemStorage {
    /// Creates a new, empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn restore(&mut self, _path: &Path) -> Result<State, RepLogError> {
        Ok(State {
            metadata: self.metadata.clone(),
            begin: self.begin,
            end: self.end,
        })
    }

    async fn persist_action(
        &mut self,
        action: &Action,
    ) -> Result<(), RepLogError> {
        self.actions.insert(action.position, action.clone());
        self.end = self.end.max(action.position);

        if let Op::Truncate { to } = action.op {
            let new_begin = self.begin.max(to);
            let doomed: Vec<u64> = self
                .actions
                .range(self.begin..new_begin)
                .map(|(&position, _)| position)
                .collect();
            for position in doomed {
                self.actions.remove(&position);
            }
            self.begin = new_begin;
        }
        Ok(())
    }

    async fn persist_metadata(
        &mut self,
        metadata: &Metadata,
    ) -> Result<(), RepLogError> {
        self.metadata = metadata.clone();
        Ok(())
    }

    async fn read(
        &mut self,
        position: u64,
    ) -> Result<Option<Action>, RepLogError> {
        Ok(self.actions.get(&position).cloned())
    }
}

#[cfg(test)]
mod memory_tests {
    use super::*;
    use crate::message::Status;

    #[tokio::test]
    async fn persist_and_read() -> Result<(), RepLogError> {
        let mut storage = MemStorage::new();
        let state = storage.restore(Path::new("/unused")).await?;
        assert_eq!(state.metadata.status, Status::Empty);

        let action = Action {
            position: 4,
            promised: 2,
            performed: 2,
            learned: None,
            op: Op::Append {
                bytes: b"hello world".to_vec(),
            },
        };
        storage.persist_action(&action).await?;
        assert_eq!(storage.read(4).await?, Some(action));
        assert_eq!(storage.read(3).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn truncate_removes_prefix() -> Result<(), RepLogError> {
        let mut storage = MemStorage::new();
        storage.restore(Path::new("/unused")).await?;
        for i in 0..5u64 {
            storage
                .persist_action(&Action {
                    position: i,
                    promised: 1,
                    performed: 1,
                    learned: Some(true),
                    op: Op::Append {
                        bytes: i.to_string().into_bytes(),
                    },
                })
                .await?;
        }
        storage
            .persist_action(&Action {
                position: 5,
                promised: 1,
                performed: 1,
                learned: Some(true),
                op: Op::Truncate { to: 3 },
            })
            .await?;

        assert_eq!(storage.read(2).await?, None);
        assert!(storage.read(3).await?.is_some());
        assert!(storage.read(5).await?.is_some());
        Ok(())
    }
}
