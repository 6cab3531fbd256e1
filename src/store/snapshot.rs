use crate::domain::{Board, EntityId};

/// Deep copy of the store contents, used to roll back optimistic moves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub(crate) boards: Vec<Board>,
    pub(crate) current_board_id: Option<EntityId>,
    pub(crate) revision: u64,
}

impl StoreSnapshot {
    /// Store revision at capture time
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }
}
