//! Optimistic application of moves with after-the-fact confirmation.
//!
//! A card move goes through `Applied` (local store already shows the new
//! order) and ends as `Confirmed` or, when the backend rejects it or does not
//! answer in time, is reconciled. Reconciliation restores the pre-move
//! snapshot if nothing else touched the store since the move was applied,
//! and otherwise reloads everything from the backend so a stale failure never
//! overwrites newer local state.

use crate::{
    config::CoreConfig,
    domain::{validate_title, Board, Card, EntityId, List},
    error::{EntityKind, MartrelloError, Result},
    storage::{BoardUpdate, CardUpdate, ListUpdate, Persistence},
    store::{BoardStore, CardLocation, StoreSnapshot},
};
use futures::future::join_all;
use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A card move that has been applied locally and awaits confirmation
#[derive(Debug, Clone)]
pub struct PendingCardMove {
    pub id: Uuid,
    pub card_id: EntityId,
    pub from: CardLocation,
    pub to: CardLocation,
    snapshot: StoreSnapshot,
    applied_revision: u64,
}

impl PendingCardMove {
    /// Store revision right after the local apply
    pub fn applied_revision(&self) -> u64 {
        self.applied_revision
    }
}

/// Final state of an optimistic move
#[derive(Debug)]
pub enum MoveOutcome {
    /// Target equals the current location; nothing applied or sent
    Unchanged,
    Confirmed,
    /// Confirmation failed and the pre-move snapshot was restored
    RolledBack { error: MartrelloError },
    /// Confirmation failed after later changes; state was reloaded
    Refreshed { error: MartrelloError },
    /// Confirmation and the reload both failed; local state is ahead of the
    /// backend until the next successful refresh
    Unreconciled {
        error: MartrelloError,
        refresh_error: MartrelloError,
    },
}

impl MoveOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// Surfaces the confirmation failure, if any
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Unchanged | Self::Confirmed => Ok(()),
            Self::RolledBack { error }
            | Self::Refreshed { error }
            | Self::Unreconciled { error, .. } => Err(error),
        }
    }
}

/// Per-list confirmation results of a list reorder
///
/// Lists are confirmed independently; a partial failure leaves the local
/// order ahead of the backend until the caller refreshes.
#[derive(Debug, Default)]
pub struct ListMoveReport {
    pub confirmed: Vec<EntityId>,
    pub failed: Vec<(EntityId, MartrelloError)>,
}

impl ListMoveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the board store and keeps it in step with the backend
///
/// Clones share the same store, so confirmations can be driven from spawned
/// tasks while the UI keeps mutating.
#[derive(Clone)]
pub struct BoardController {
    store: Arc<Mutex<BoardStore>>,
    persistence: Arc<dyn Persistence>,
    config: CoreConfig,
}

impl BoardController {
    pub fn new(persistence: Arc<dyn Persistence>, config: CoreConfig) -> Self {
        Self::with_store(BoardStore::new(), persistence, config)
    }

    pub fn with_store(
        store: BoardStore,
        persistence: Arc<dyn Persistence>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            persistence,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Runs `f` against the current local state
    pub fn read<R>(&self, f: impl FnOnce(&BoardStore) -> R) -> R {
        f(&self.lock_store())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock_store().snapshot()
    }

    pub fn boards(&self) -> Vec<Board> {
        self.lock_store().boards().to_vec()
    }

    pub fn current_board(&self) -> Option<Board> {
        self.lock_store().current_board().cloned()
    }

    pub fn select_board(&self, board_id: Option<EntityId>) -> Result<()> {
        self.lock_store().set_current_board(board_id)
    }

    pub(crate) fn with_store_mut<R>(&self, f: impl FnOnce(&mut BoardStore) -> R) -> R {
        f(&mut self.lock_store())
    }

    fn lock_store(&self) -> MutexGuard<'_, BoardStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Awaits a backend call, turning expiry into a persistence failure
    async fn confirm<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.confirmation_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(MartrelloError::persistence(
                operation,
                format!(
                    "timed out after {} ms",
                    self.config.confirmation_timeout_ms
                ),
            )),
        }
    }

    /// Replaces local state with the backend's
    pub async fn refresh(&self) -> Result<()> {
        let boards = self
            .confirm("refresh boards", self.persistence.get_all_boards())
            .await?;
        let count = boards.len();
        self.lock_store().replace_all(boards)?;
        debug!(boards = count, "board state refreshed");
        Ok(())
    }

    /// Initial load; identical to [`refresh`](Self::refresh)
    pub async fn load(&self) -> Result<()> {
        self.refresh().await
    }

    pub async fn create_board(
        &self,
        title: &str,
        description: &str,
        background: &str,
    ) -> Result<Board> {
        let title = validate_title(title)?;
        let board = self
            .confirm(
                "create board",
                self.persistence.create_board(&title, description, background),
            )
            .await?;
        self.lock_store().insert_board(board.clone())?;
        info!(board = %board.id, "board created");
        Ok(board)
    }

    pub async fn update_board(&self, board_id: &EntityId, update: BoardUpdate) -> Result<()> {
        let update = BoardUpdate {
            title: update.title.as_deref().map(validate_title).transpose()?,
            ..update
        };
        self.read(|store| {
            store
                .board(board_id)
                .map(|_| ())
                .ok_or_else(|| MartrelloError::not_found(EntityKind::Board, board_id))
        })?;

        self.confirm("update board", self.persistence.update_board(board_id, &update))
            .await?;
        self.lock_store().set_board_fields(
            board_id,
            update.title,
            update.description,
            update.background,
        )
    }

    pub async fn delete_board(&self, board_id: &EntityId) -> Result<()> {
        self.read(|store| {
            store
                .board(board_id)
                .map(|_| ())
                .ok_or_else(|| MartrelloError::not_found(EntityKind::Board, board_id))
        })?;

        self.confirm("delete board", self.persistence.delete_board(board_id))
            .await?;
        self.lock_store().remove_board(board_id)?;
        info!(board = %board_id, "board deleted");
        Ok(())
    }

    /// Appends a new list to the board
    pub async fn create_list(&self, board_id: &EntityId, title: &str) -> Result<List> {
        let title = validate_title(title)?;
        let position = self.read(|store| {
            store
                .board(board_id)
                .map(|board| board.lists.len())
                .ok_or_else(|| MartrelloError::not_found(EntityKind::Board, board_id))
        })?;

        let list = self
            .confirm(
                "create list",
                self.persistence.create_list(board_id, &title, position),
            )
            .await?;
        self.lock_store()
            .insert_list(board_id, list.clone(), position)?;
        debug!(list = %list.id, board = %board_id, position, "list created");
        Ok(list)
    }

    pub async fn rename_list(&self, list_id: &EntityId, title: &str) -> Result<()> {
        let title = validate_title(title)?;
        self.require_list(list_id)?;

        self.confirm(
            "update list",
            self.persistence
                .update_list(list_id, &ListUpdate::title(title.clone())),
        )
        .await?;
        self.lock_store().set_list_title(list_id, title)
    }

    pub async fn delete_list(&self, list_id: &EntityId) -> Result<()> {
        self.require_list(list_id)?;

        self.confirm("delete list", self.persistence.delete_list(list_id))
            .await?;
        self.lock_store().remove_list(list_id)?;
        debug!(list = %list_id, "list deleted");
        Ok(())
    }

    /// Appends a new card with an empty description to the list
    pub async fn create_card(&self, list_id: &EntityId, title: &str) -> Result<Card> {
        let title = validate_title(title)?;
        let position = self.require_list(list_id)?;

        let card = self
            .confirm(
                "create card",
                self.persistence.create_card(list_id, &title, "", position),
            )
            .await?;
        self.lock_store()
            .insert_card(list_id, card.clone(), position)?;
        debug!(card = %card.id, list = %list_id, position, "card created");
        Ok(card)
    }

    /// Edits a card's title or description
    ///
    /// Relocation goes through [`request_move_card`](Self::request_move_card).
    pub async fn update_card(&self, card_id: &EntityId, update: CardUpdate) -> Result<()> {
        if update.moves_card() {
            return Err(MartrelloError::Validation(
                "card moves must go through request_move_card".to_string(),
            ));
        }
        let update = CardUpdate {
            title: update.title.as_deref().map(validate_title).transpose()?,
            ..update
        };
        self.require_card(card_id)?;

        self.confirm("update card", self.persistence.update_card(card_id, &update))
            .await?;
        self.lock_store()
            .set_card_fields(card_id, update.title, update.description)
    }

    pub async fn delete_card(&self, card_id: &EntityId) -> Result<()> {
        self.require_card(card_id)?;

        self.confirm("delete card", self.persistence.delete_card(card_id))
            .await?;
        self.lock_store().remove_card(card_id)?;
        debug!(card = %card_id, "card deleted");
        Ok(())
    }

    /// Applies a card move to the local store immediately
    ///
    /// Returns `None` when the card already sits at the target, in which case
    /// nothing changes and nothing needs confirming.
    pub fn begin_move_card(
        &self,
        card_id: &EntityId,
        to_list_id: &EntityId,
        to_index: usize,
    ) -> Result<Option<PendingCardMove>> {
        let mut store = self.lock_store();
        let from = store
            .card_location(card_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Card, card_id))?;
        let snapshot = store.snapshot();
        let to = store.move_card(card_id, to_list_id, to_index)?;

        if store.revision() == snapshot.revision() {
            return Ok(None);
        }

        let pending = PendingCardMove {
            id: Uuid::new_v4(),
            card_id: card_id.clone(),
            from,
            to,
            snapshot,
            applied_revision: store.revision(),
        };
        debug!(
            move_id = %pending.id,
            card = %card_id,
            from_list = %pending.from.list_id,
            from_index = pending.from.index,
            to_list = %pending.to.list_id,
            to_index = pending.to.index,
            "card move applied locally"
        );
        Ok(Some(pending))
    }

    /// Confirms a locally applied move and reconciles on failure
    ///
    /// Dropping the returned future before it completes discards the
    /// confirmation; local state keeps the applied move.
    pub async fn settle_card_move(&self, pending: PendingCardMove) -> MoveOutcome {
        let result = self
            .confirm(
                "move card",
                self.persistence
                    .move_card(&pending.card_id, &pending.to.list_id, pending.to.index),
            )
            .await;

        match result {
            Ok(_) => {
                info!(move_id = %pending.id, card = %pending.card_id, "card move confirmed");
                MoveOutcome::Confirmed
            }
            Err(error) => {
                warn!(
                    move_id = %pending.id,
                    card = %pending.card_id,
                    error = %error,
                    "card move rejected"
                );
                self.reconcile(pending.snapshot, pending.applied_revision, error)
                    .await
            }
        }
    }

    /// Moves a card locally, then confirms it with the backend
    ///
    /// Fails only when the move cannot be applied locally; confirmation
    /// failures are reported through the outcome after reconciliation.
    pub async fn request_move_card(
        &self,
        card_id: &EntityId,
        to_list_id: &EntityId,
        to_index: usize,
    ) -> Result<MoveOutcome> {
        match self.begin_move_card(card_id, to_list_id, to_index)? {
            Some(pending) => Ok(self.settle_card_move(pending).await),
            None => Ok(MoveOutcome::Unchanged),
        }
    }

    /// Reorders a board's lists locally, then confirms each moved list
    pub async fn request_move_list(
        &self,
        board_id: &EntityId,
        from_index: usize,
        to_index: usize,
    ) -> Result<ListMoveReport> {
        let changes = self
            .lock_store()
            .move_list(board_id, from_index, to_index)?;
        if changes.is_empty() {
            return Ok(ListMoveReport::default());
        }
        debug!(
            board = %board_id,
            from_index,
            to_index,
            changed = changes.len(),
            "list move applied locally"
        );

        let confirmations = changes.iter().map(|change| async move {
            let update = ListUpdate::position(change.position);
            let result = self
                .confirm(
                    "update list",
                    self.persistence.update_list(&change.id, &update),
                )
                .await;
            (change.id.clone(), result)
        });

        let mut report = ListMoveReport::default();
        for (list_id, result) in join_all(confirmations).await {
            match result {
                Ok(_) => report.confirmed.push(list_id),
                Err(error) => {
                    warn!(list = %list_id, error = %error, "list position not confirmed");
                    report.failed.push((list_id, error));
                }
            }
        }
        if report.is_complete() {
            info!(board = %board_id, lists = report.confirmed.len(), "list move confirmed");
        }
        Ok(report)
    }

    async fn reconcile(
        &self,
        snapshot: StoreSnapshot,
        applied_revision: u64,
        error: MartrelloError,
    ) -> MoveOutcome {
        let restored = {
            let mut store = self.lock_store();
            if store.revision() == applied_revision {
                store.restore(snapshot);
                true
            } else {
                false
            }
        };
        if restored {
            warn!(error = %error, "rolled back to pre-move snapshot");
            return MoveOutcome::RolledBack { error };
        }

        match self.refresh().await {
            Ok(()) => {
                warn!(error = %error, "later changes present, reloaded board state");
                MoveOutcome::Refreshed { error }
            }
            Err(refresh_error) => {
                warn!(
                    error = %error,
                    refresh_error = %refresh_error,
                    "reload after failed move also failed"
                );
                MoveOutcome::Unreconciled {
                    error,
                    refresh_error,
                }
            }
        }
    }

    /// Card count of an existing list
    fn require_list(&self, list_id: &EntityId) -> Result<usize> {
        self.read(|store| {
            store
                .list(list_id)
                .map(|list| list.cards.len())
                .ok_or_else(|| MartrelloError::not_found(EntityKind::List, list_id))
        })
    }

    fn require_card(&self, card_id: &EntityId) -> Result<()> {
        self.read(|store| {
            store
                .card(card_id)
                .map(|_| ())
                .ok_or_else(|| MartrelloError::not_found(EntityKind::Card, card_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory_storage::{MemoryStorage, Scripted};
    use std::time::Duration;

    fn id(value: &str) -> EntityId {
        EntityId::new(value)
    }

    fn card_ids(controller: &BoardController, list_id: &str) -> Vec<EntityId> {
        controller.read(|store| store.list(&id(list_id)).map(List::card_ids).unwrap_or_default())
    }

    /// Board "1" with lists "2" (To Do: cards "4", "5") and "3" (Done)
    async fn seeded(config: CoreConfig) -> (BoardController, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let controller = BoardController::new(storage.clone(), config);

        let board = controller.create_board("Sprint", "", "#0079bf").await.unwrap();
        let todo = controller.create_list(&board.id, "To Do").await.unwrap();
        controller.create_list(&board.id, "Done").await.unwrap();
        controller.create_card(&todo.id, "C1").await.unwrap();
        controller.create_card(&todo.id, "C2").await.unwrap();
        storage.clear_calls().await;

        (controller, storage)
    }

    #[tokio::test]
    async fn test_seeded_ids_follow_backend() {
        let (controller, _) = seeded(CoreConfig::default()).await;
        assert_eq!(card_ids(&controller, "2"), vec![id("4"), id("5")]);
        assert!(card_ids(&controller, "3").is_empty());
    }

    #[tokio::test]
    async fn test_move_to_other_list_is_confirmed() {
        let (controller, storage) = seeded(CoreConfig::default()).await;

        let outcome = controller
            .request_move_card(&id("4"), &id("3"), 0)
            .await
            .unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(card_ids(&controller, "2"), vec![id("5")]);
        assert_eq!(card_ids(&controller, "3"), vec![id("4")]);
        controller.read(|store| {
            assert_eq!(store.card(&id("5")).unwrap().position, 0);
            assert_eq!(store.card(&id("4")).unwrap().list_id, id("3"));
        });

        let calls = storage.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, "move_card");
        assert_eq!(calls[0].target, Some(id("4")));

        let backend = storage.get_all_boards().await.unwrap();
        assert_eq!(backend, controller.boards());
    }

    #[tokio::test]
    async fn test_move_to_current_slot_sends_nothing() {
        let (controller, storage) = seeded(CoreConfig::default()).await;
        let revision = controller.read(BoardStore::revision);

        let outcome = controller
            .request_move_card(&id("4"), &id("2"), 0)
            .await
            .unwrap();

        assert!(matches!(outcome, MoveOutcome::Unchanged));
        assert_eq!(controller.read(BoardStore::revision), revision);
        assert!(storage.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_move_restores_previous_order() {
        let (controller, storage) = seeded(CoreConfig::default()).await;
        let before = controller.boards();
        storage.fail_next(1).await;

        let outcome = controller
            .request_move_card(&id("4"), &id("3"), 0)
            .await
            .unwrap();

        assert!(matches!(outcome, MoveOutcome::RolledBack { .. }));
        assert_eq!(controller.boards(), before);
        assert!(matches!(
            outcome.into_result(),
            Err(MartrelloError::PersistenceFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_stale_failure_reloads_instead_of_restoring() {
        let (controller, storage) = seeded(CoreConfig::default()).await;

        let first = controller
            .begin_move_card(&id("4"), &id("3"), 0)
            .unwrap()
            .unwrap();
        let second = controller
            .begin_move_card(&id("5"), &id("3"), 1)
            .unwrap()
            .unwrap();
        assert!(second.applied_revision() > first.applied_revision());

        assert!(controller.settle_card_move(second).await.is_confirmed());
        storage.fail_next(1).await;
        let outcome = controller.settle_card_move(first).await;

        assert!(matches!(outcome, MoveOutcome::Refreshed { .. }));
        assert_eq!(card_ids(&controller, "2"), vec![id("4")]);
        assert_eq!(card_ids(&controller, "3"), vec![id("5")]);
        assert_eq!(storage.get_all_boards().await.unwrap(), controller.boards());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_local_state() {
        let (controller, storage) = seeded(CoreConfig::default()).await;

        let first = controller
            .begin_move_card(&id("4"), &id("3"), 0)
            .unwrap()
            .unwrap();
        controller
            .begin_move_card(&id("5"), &id("3"), 1)
            .unwrap()
            .unwrap();
        storage.fail_next(2).await;

        let outcome = controller.settle_card_move(first).await;

        assert!(matches!(outcome, MoveOutcome::Unreconciled { .. }));
        assert!(card_ids(&controller, "2").is_empty());
        assert_eq!(card_ids(&controller, "3"), vec![id("4"), id("5")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_confirmation_times_out_and_rolls_back() {
        let config = CoreConfig::default().with_confirmation_timeout(Duration::from_millis(50));
        let (controller, storage) = seeded(config).await;
        let before = controller.boards();
        storage
            .push_script(Scripted::delayed(Duration::from_secs(5)))
            .await;

        let outcome = controller
            .request_move_card(&id("5"), &id("3"), 0)
            .await
            .unwrap();

        match outcome {
            MoveOutcome::RolledBack { error } => {
                assert!(error.to_string().contains("timed out after 50 ms"));
            }
            other => panic!("expected rollback, got {:?}", other),
        }
        assert_eq!(controller.boards(), before);
    }

    #[tokio::test]
    async fn test_move_list_confirms_every_changed_list() {
        let (controller, storage) = seeded(CoreConfig::default()).await;

        let report = controller.request_move_list(&id("1"), 0, 1).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.confirmed.len(), 2);
        let order = controller.read(|store| store.board(&id("1")).unwrap().list_ids());
        assert_eq!(order, vec![id("3"), id("2")]);
        assert_eq!(storage.get_all_boards().await.unwrap(), controller.boards());
    }

    #[tokio::test]
    async fn test_move_list_reports_partial_failure() {
        let (controller, storage) = seeded(CoreConfig::default()).await;
        storage.fail_next(1).await;

        let report = controller.request_move_list(&id("1"), 1, 0).await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.confirmed.len(), 1);
        assert_eq!(report.failed.len(), 1);
        let order = controller.read(|store| store.board(&id("1")).unwrap().list_ids());
        assert_eq!(order, vec![id("3"), id("2")]);
    }

    #[tokio::test]
    async fn test_move_list_in_place_sends_nothing() {
        let (controller, storage) = seeded(CoreConfig::default()).await;

        let report = controller.request_move_list(&id("1"), 1, 1).await.unwrap();

        assert!(report.confirmed.is_empty() && report.is_complete());
        assert!(storage.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_title_fails_before_backend_call() {
        let (controller, storage) = seeded(CoreConfig::default()).await;

        let err = controller.create_card(&id("2"), "   ").await.unwrap_err();

        assert!(matches!(err, MartrelloError::Validation(_)));
        assert!(storage.calls().await.is_empty());
        assert_eq!(card_ids(&controller, "2").len(), 2);
    }

    #[tokio::test]
    async fn test_update_card_refuses_relocation() {
        let (controller, storage) = seeded(CoreConfig::default()).await;
        let update = CardUpdate {
            list_id: Some(id("3")),
            ..Default::default()
        };

        let err = controller.update_card(&id("4"), update).await.unwrap_err();

        assert!(matches!(err, MartrelloError::Validation(_)));
        assert!(storage.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_card_edits_fields_in_place() {
        let (controller, _) = seeded(CoreConfig::default()).await;
        let update = CardUpdate {
            title: Some("  Write docs ".to_string()),
            description: Some("before release".to_string()),
            ..Default::default()
        };

        controller.update_card(&id("5"), update).await.unwrap();

        controller.read(|store| {
            let card = store.card(&id("5")).unwrap();
            assert_eq!(card.title, "Write docs");
            assert_eq!(card.description, "before release");
            assert_eq!(card.position, 1);
        });
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_card_in_place() {
        let (controller, storage) = seeded(CoreConfig::default()).await;
        storage.set_offline(true);

        let err = controller.delete_card(&id("4")).await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(card_ids(&controller, "2"), vec![id("4"), id("5")]);
    }

    #[tokio::test]
    async fn test_delete_list_removes_its_cards() {
        let (controller, _) = seeded(CoreConfig::default()).await;

        controller.delete_list(&id("2")).await.unwrap();

        controller.read(|store| {
            assert!(store.list(&id("2")).is_none());
            assert!(store.card(&id("4")).is_none());
            assert_eq!(store.list(&id("3")).unwrap().position, 0);
        });
    }

    #[tokio::test]
    async fn test_load_replaces_local_state() {
        let (seeder, storage) = seeded(CoreConfig::default()).await;
        let controller = BoardController::new(storage.clone(), CoreConfig::default());

        controller.load().await.unwrap();

        assert_eq!(controller.boards(), seeder.boards());
    }

    #[tokio::test]
    async fn test_unknown_card_cannot_be_moved() {
        let (controller, storage) = seeded(CoreConfig::default()).await;

        let err = controller
            .request_move_card(&id("99"), &id("3"), 0)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MartrelloError::NotFound {
                kind: EntityKind::Card,
                ..
            }
        ));
        assert!(storage.calls().await.is_empty());
    }
}
