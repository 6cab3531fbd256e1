use crate::{
    domain::{Board, Card, EntityId, List},
    error::Result,
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;

#[cfg(feature = "http-storage")]
pub mod http_storage;

pub mod mapping;
pub mod memory_storage;
mod tables;
pub mod wire;

/// Partial update of a board's descriptive fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub background: Option<String>,
}

/// Partial update of a list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListUpdate {
    pub title: Option<String>,
    pub position: Option<usize>,
}

impl ListUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn position(position: usize) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }
}

/// Partial update of a card
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<usize>,
    pub list_id: Option<EntityId>,
}

impl CardUpdate {
    /// True when the update relocates the card rather than editing it
    pub fn moves_card(&self) -> bool {
        self.position.is_some() || self.list_id.is_some()
    }
}

/// Authoritative store the board engine confirms its changes with
///
/// Any `Err` is treated by the caller as a failed confirmation, whether the
/// backend rejected the request or never answered.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Loads every board with its lists and cards ordered by position
    async fn get_all_boards(&self) -> Result<Vec<Board>>;

    async fn create_board(&self, title: &str, description: &str, background: &str)
        -> Result<Board>;

    async fn update_board(&self, id: &EntityId, update: &BoardUpdate) -> Result<Board>;

    /// Deletes a board together with its lists and cards
    async fn delete_board(&self, id: &EntityId) -> Result<()>;

    async fn create_list(&self, board_id: &EntityId, title: &str, position: usize)
        -> Result<List>;

    async fn update_list(&self, id: &EntityId, update: &ListUpdate) -> Result<List>;

    /// Deletes a list together with its cards
    async fn delete_list(&self, id: &EntityId) -> Result<()>;

    async fn create_card(
        &self,
        list_id: &EntityId,
        title: &str,
        description: &str,
        position: usize,
    ) -> Result<Card>;

    async fn update_card(&self, id: &EntityId, update: &CardUpdate) -> Result<Card>;

    /// Places a card at `position` of `list_id`
    async fn move_card(&self, id: &EntityId, list_id: &EntityId, position: usize) -> Result<Card>;

    async fn delete_card(&self, id: &EntityId) -> Result<()>;
}
