use crate::{
    domain::{Board, Card, EntityId, List},
    error::{MartrelloError, Result},
    storage::{tables::Tables, BoardUpdate, CardUpdate, ListUpdate, Persistence},
};
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::sync::Mutex;

/// How the next call should behave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scripted {
    pub delay: Duration,
    pub fail: bool,
}

impl Scripted {
    pub fn fail() -> Self {
        Self {
            delay: Duration::ZERO,
            fail: true,
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self { delay, fail: false }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

/// One request received by the backend, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageCall {
    pub operation: &'static str,
    pub target: Option<EntityId>,
}

/// In-process backend with the same semantics as the SQL-backed API
///
/// Each call can be scripted to fail or to answer late, and every call is
/// recorded, which makes it the reference collaborator for exercising
/// confirmation, rollback and refresh paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<StorageCall>>,
    offline: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the behaviour of upcoming calls, oldest first
    pub async fn push_script(&self, scripted: Scripted) {
        self.script.lock().await.push_back(scripted);
    }

    /// Makes the next `count` calls fail
    pub async fn fail_next(&self, count: usize) {
        let mut script = self.script.lock().await;
        for _ in 0..count {
            script.push_back(Scripted::fail());
        }
    }

    /// While offline every call fails immediately
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    async fn gate(&self, operation: &'static str, target: Option<&EntityId>) -> Result<()> {
        self.calls.lock().await.push(StorageCall {
            operation,
            target: target.cloned(),
        });

        let scripted = self.script.lock().await.pop_front().unwrap_or_default();
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(MartrelloError::persistence(operation, "backend unreachable"));
        }
        if scripted.fail {
            return Err(MartrelloError::persistence(operation, "request failed"));
        }
        Ok(())
    }
}

#[async_trait]
impl Persistence for MemoryStorage {
    async fn get_all_boards(&self) -> Result<Vec<Board>> {
        self.gate("get_all_boards", None).await?;
        Ok(self.tables.lock().await.all_boards())
    }

    async fn create_board(
        &self,
        title: &str,
        description: &str,
        background: &str,
    ) -> Result<Board> {
        self.gate("create_board", None).await?;
        Ok(self
            .tables
            .lock()
            .await
            .create_board(title, description, background))
    }

    async fn update_board(&self, id: &EntityId, update: &BoardUpdate) -> Result<Board> {
        self.gate("update_board", Some(id)).await?;
        self.tables.lock().await.update_board(id, update)
    }

    async fn delete_board(&self, id: &EntityId) -> Result<()> {
        self.gate("delete_board", Some(id)).await?;
        self.tables.lock().await.delete_board(id)
    }

    async fn create_list(
        &self,
        board_id: &EntityId,
        title: &str,
        position: usize,
    ) -> Result<List> {
        self.gate("create_list", Some(board_id)).await?;
        self.tables.lock().await.create_list(board_id, title, position)
    }

    async fn update_list(&self, id: &EntityId, update: &ListUpdate) -> Result<List> {
        self.gate("update_list", Some(id)).await?;
        self.tables.lock().await.update_list(id, update)
    }

    async fn delete_list(&self, id: &EntityId) -> Result<()> {
        self.gate("delete_list", Some(id)).await?;
        self.tables.lock().await.delete_list(id)
    }

    async fn create_card(
        &self,
        list_id: &EntityId,
        title: &str,
        description: &str,
        position: usize,
    ) -> Result<Card> {
        self.gate("create_card", Some(list_id)).await?;
        self.tables
            .lock()
            .await
            .create_card(list_id, title, description, position)
    }

    async fn update_card(&self, id: &EntityId, update: &CardUpdate) -> Result<Card> {
        self.gate("update_card", Some(id)).await?;
        self.tables.lock().await.update_card(id, update)
    }

    async fn move_card(&self, id: &EntityId, list_id: &EntityId, position: usize) -> Result<Card> {
        self.gate("move_card", Some(id)).await?;
        self.tables.lock().await.move_card(id, list_id, position)
    }

    async fn delete_card(&self, id: &EntityId) -> Result<()> {
        self.gate("delete_card", Some(id)).await?;
        self.tables.lock().await.delete_card(id)
    }
}
