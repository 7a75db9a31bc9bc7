//! # Optimistic Mutation Pipeline
//!
//! Local apply → remote persist → confirm or roll back.
//!
//! The pipeline only does the bookkeeping. Issuing the persistence call is
//! the session's job; it hands the outcome back through [`Pipeline::finish`].

use crate::errors::{EditorError, EditorResult};
use crate::gateway::GatewayResult;
use crate::mutations::{Transaction, TransactionId};
use crate::store::BlockStore;
use blockspace_common::{Block, BlockId, BlockPatch};
use std::collections::HashMap;

/// How a transaction ended
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    /// The gateway accepted the write; local state already matches
    Committed(Transaction),
    /// The gateway refused; touched fields were restored where untouched since
    RolledBack {
        transaction: Transaction,
        restored: BlockPatch,
        error: EditorError,
    },
    /// The transaction was not pending (already settled or dropped by a reload)
    Unknown(TransactionId),
}

#[derive(Debug, Default)]
pub struct Pipeline {
    next_id: TransactionId,
    pending: HashMap<TransactionId, Transaction>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `patch` to the store and remember how to undo it
    pub fn begin(
        &mut self,
        store: &mut BlockStore,
        block_id: BlockId,
        patch: BlockPatch,
    ) -> EditorResult<Transaction> {
        self.next_id += 1;
        let transaction = Transaction::begin(store, self.next_id, block_id, patch)?;
        self.pending.insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    pub fn finish(
        &mut self,
        store: &mut BlockStore,
        id: TransactionId,
        result: GatewayResult<Block>,
    ) -> Settled {
        let Some(transaction) = self.pending.remove(&id) else {
            return Settled::Unknown(id);
        };

        match result {
            Ok(_) => Settled::Committed(transaction),
            Err(error) => {
                let restored = match transaction.rollback(store) {
                    Ok(restored) => restored,
                    // Block vanished in the meantime (remote delete): nothing to restore
                    Err(_) => BlockPatch::default(),
                };

                tracing::warn!(
                    block_id = transaction.block_id,
                    transaction = transaction.id,
                    error = %error,
                    "persistence failed, rolled back"
                );

                Settled::RolledBack {
                    transaction,
                    restored,
                    error: EditorError::Persistence(error),
                }
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Write every unconfirmed change back over a freshly fetched store,
    /// oldest first. Blocks the fetch no longer has are skipped.
    pub fn reapply(&self, store: &mut BlockStore) {
        let mut pending: Vec<&Transaction> = self.pending.values().collect();
        pending.sort_by_key(|t| t.id);

        for transaction in pending {
            if store.update(transaction.block_id, &transaction.after).is_err() {
                tracing::debug!(
                    block_id = transaction.block_id,
                    transaction = transaction.id,
                    "pending change targets a block the gateway no longer has"
                );
            }
        }
    }

    /// Forget every pending transaction (close or full reload)
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use blockspace_common::{BlockType, StyleFlag};

    fn store() -> BlockStore {
        BlockStore::from_blocks(1, vec![Block::new(1, 1, BlockType::Text, "hello", 0)])
    }

    #[test]
    fn test_commit_keeps_local_state() {
        let mut store = store();
        let mut pipeline = Pipeline::new();

        let txn = pipeline.begin(&mut store, 1, BlockPatch::content("hi")).unwrap();
        assert_eq!(pipeline.pending_count(), 1);

        let block = store.get(1).unwrap().clone();
        let settled = pipeline.finish(&mut store, txn.id, Ok(block));

        assert!(matches!(settled, Settled::Committed(_)));
        assert_eq!(store.get(1).unwrap().content, "hi");
        assert_eq!(pipeline.pending_count(), 0);
    }

    #[test]
    fn test_failure_rolls_back_touched_fields_only() {
        let mut store = store();
        let mut pipeline = Pipeline::new();

        let txn = pipeline
            .begin(&mut store, 1, BlockPatch::style(StyleFlag::Italic, true))
            .unwrap();
        store.update(1, &BlockPatch::content("remote")).unwrap();

        let settled = pipeline.finish(
            &mut store,
            txn.id,
            Err(GatewayError::Transport("offline".into())),
        );

        match settled {
            Settled::RolledBack { restored, error, .. } => {
                assert_eq!(restored.italic, Some(false));
                assert!(matches!(error, EditorError::Persistence(_)));
            }
            other => panic!("unexpected {:?}", other),
        }

        let block = store.get(1).unwrap();
        assert!(!block.italic);
        assert_eq!(block.content, "remote");
    }

    #[test]
    fn test_reapply_restores_unconfirmed_changes_after_refetch() {
        let mut store = store();
        let mut pipeline = Pipeline::new();

        pipeline.begin(&mut store, 1, BlockPatch::content("hi")).unwrap();
        pipeline
            .begin(&mut store, 1, BlockPatch::style(StyleFlag::Bold, true))
            .unwrap();
        pipeline.begin(&mut store, 1, BlockPatch::content("hi there")).unwrap();

        store.replace_all(vec![Block::new(1, 1, BlockType::Text, "hello", 3)]);
        pipeline.reapply(&mut store);

        let block = store.get(1).unwrap();
        assert_eq!(block.content, "hi there");
        assert!(block.bold);
        assert_eq!(block.order, 3);
    }

    #[test]
    fn test_reapply_skips_vanished_block() {
        let mut store = store();
        let mut pipeline = Pipeline::new();

        pipeline.begin(&mut store, 1, BlockPatch::content("hi")).unwrap();
        store.replace_all(vec![Block::new(2, 1, BlockType::Text, "other", 0)]);
        pipeline.reapply(&mut store);

        assert_eq!(store.ids(), vec![2]);
        assert_eq!(store.get(2).unwrap().content, "other");
    }

    #[test]
    fn test_finish_unknown_transaction() {
        let mut store = store();
        let mut pipeline = Pipeline::new();
        let block = store.get(1).unwrap().clone();

        assert_eq!(pipeline.finish(&mut store, 42, Ok(block)), Settled::Unknown(42));
    }

    #[test]
    fn test_begin_on_missing_block_is_not_pending() {
        let mut store = store();
        let mut pipeline = Pipeline::new();

        assert!(pipeline.begin(&mut store, 7, BlockPatch::content("x")).is_err());
        assert_eq!(pipeline.pending_count(), 0);
    }
}
