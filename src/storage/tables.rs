//! Board, list and card rows keyed by numeric ids, shared by the memory and
//! file backends. Behaves like the relational schema: children reference
//! parents by id, reads return children ordered by position, deletes cascade.

use crate::domain::{Board, Card, EntityId, List};
use crate::error::{EntityKind, MartrelloError, Result};
use crate::storage::mapping::{
    board_from_record, boards_from_records, card_from_record, id_to_numeric, list_from_record,
};
use crate::storage::wire::{BoardRecord, CardRecord, ListRecord};
use crate::storage::{BoardUpdate, CardUpdate, ListUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoardRow {
    id: i64,
    title: String,
    description: String,
    background: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListRow {
    id: i64,
    board_id: i64,
    title: String,
    position: usize,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CardRow {
    id: i64,
    list_id: i64,
    title: String,
    description: String,
    position: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Ids come from one counter so boards, lists and cards never share an id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Tables {
    next_id: i64,
    boards: Vec<BoardRow>,
    lists: Vec<ListRow>,
    cards: Vec<CardRow>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            next_id: 1,
            boards: Vec::new(),
            lists: Vec::new(),
            cards: Vec::new(),
        }
    }
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Boards newest first, each with lists and cards ordered by position
    pub(crate) fn all_boards(&self) -> Vec<Board> {
        let mut boards: Vec<&BoardRow> = self.boards.iter().collect();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        boards_from_records(boards.into_iter().map(|row| self.board_record(row)).collect())
    }

    pub(crate) fn create_board(
        &mut self,
        title: &str,
        description: &str,
        background: &str,
    ) -> Board {
        let now = Utc::now();
        let row = BoardRow {
            id: self.allocate_id(),
            title: title.to_string(),
            description: description.to_string(),
            background: background.to_string(),
            created_at: now,
            updated_at: now,
        };
        let board = board_from_record(self.board_record(&row));
        self.boards.push(row);
        board
    }

    pub(crate) fn update_board(&mut self, id: &EntityId, update: &BoardUpdate) -> Result<Board> {
        let index = self.board_index(id)?;
        let row = &mut self.boards[index];
        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if let Some(description) = &update.description {
            row.description = description.clone();
        }
        if let Some(background) = &update.background {
            row.background = background.clone();
        }
        row.updated_at = Utc::now();
        let row = self.boards[index].clone();
        Ok(board_from_record(self.board_record(&row)))
    }

    pub(crate) fn delete_board(&mut self, id: &EntityId) -> Result<()> {
        let index = self.board_index(id)?;
        let board = self.boards.remove(index);
        let list_ids: Vec<i64> = self
            .lists
            .iter()
            .filter(|list| list.board_id == board.id)
            .map(|list| list.id)
            .collect();
        self.lists.retain(|list| list.board_id != board.id);
        self.cards.retain(|card| !list_ids.contains(&card.list_id));
        Ok(())
    }

    pub(crate) fn create_list(
        &mut self,
        board_id: &EntityId,
        title: &str,
        position: usize,
    ) -> Result<List> {
        let board_index = self.board_index(board_id)?;
        let row = ListRow {
            id: self.allocate_id(),
            board_id: self.boards[board_index].id,
            title: title.to_string(),
            position,
            created_at: Utc::now(),
        };
        let list = list_from_record(self.list_record(&row));
        self.lists.push(row);
        Ok(list)
    }

    /// Field update only; sibling positions are left to the caller
    pub(crate) fn update_list(&mut self, id: &EntityId, update: &ListUpdate) -> Result<List> {
        let index = self.list_index(id)?;
        let row = &mut self.lists[index];
        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if let Some(position) = update.position {
            row.position = position;
        }
        let row = self.lists[index].clone();
        Ok(list_from_record(self.list_record(&row)))
    }

    pub(crate) fn delete_list(&mut self, id: &EntityId) -> Result<()> {
        let index = self.list_index(id)?;
        let list = self.lists.remove(index);
        self.cards.retain(|card| card.list_id != list.id);
        Ok(())
    }

    pub(crate) fn create_card(
        &mut self,
        list_id: &EntityId,
        title: &str,
        description: &str,
        position: usize,
    ) -> Result<Card> {
        let list_index = self.list_index(list_id)?;
        let now = Utc::now();
        let row = CardRow {
            id: self.allocate_id(),
            list_id: self.lists[list_index].id,
            title: title.to_string(),
            description: description.to_string(),
            position,
            created_at: now,
            updated_at: now,
        };
        let card = card_from_record(card_record(&row));
        self.cards.push(row);
        Ok(card)
    }

    /// Edits text fields and, when asked, relocates the card with both
    /// affected lists renumbered
    pub(crate) fn update_card(&mut self, id: &EntityId, update: &CardUpdate) -> Result<Card> {
        let index = self.card_index(id)?;
        let target_list = match &update.list_id {
            Some(list_id) => Some(self.lists[self.list_index(list_id)?].id),
            None => None,
        };

        let row = &mut self.cards[index];
        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if let Some(description) = &update.description {
            row.description = description.clone();
        }
        row.updated_at = Utc::now();

        if update.moves_card() {
            let list_id = target_list.unwrap_or(row.list_id);
            let position = update.position.unwrap_or(usize::MAX);
            self.relocate_card(index, list_id, position);
        }
        Ok(card_from_record(card_record(&self.cards[index])))
    }

    pub(crate) fn move_card(
        &mut self,
        id: &EntityId,
        list_id: &EntityId,
        position: usize,
    ) -> Result<Card> {
        self.update_card(
            id,
            &CardUpdate {
                position: Some(position),
                list_id: Some(list_id.clone()),
                ..Default::default()
            },
        )
    }

    pub(crate) fn delete_card(&mut self, id: &EntityId) -> Result<()> {
        let index = self.card_index(id)?;
        let card = self.cards.remove(index);
        self.compact_list(card.list_id, None);
        Ok(())
    }

    fn relocate_card(&mut self, index: usize, list_id: i64, position: usize) {
        let card_id = self.cards[index].id;
        let old_list = self.cards[index].list_id;
        self.cards[index].list_id = list_id;

        if old_list != list_id {
            self.compact_list(old_list, None);
        }
        self.compact_list(list_id, Some((card_id, position)));
    }

    /// Renumbers a list's cards by current order, optionally placing one
    /// card at a given slot first
    fn compact_list(&mut self, list_id: i64, placed: Option<(i64, usize)>) {
        let mut ordered: Vec<(usize, i64)> = self
            .cards
            .iter()
            .filter(|card| card.list_id == list_id)
            .filter(|card| placed.map_or(true, |(id, _)| card.id != id))
            .map(|card| (card.position, card.id))
            .collect();
        ordered.sort();

        let mut ids: Vec<i64> = ordered.into_iter().map(|(_, id)| id).collect();
        if let Some((id, position)) = placed {
            let slot = position.min(ids.len());
            ids.insert(slot, id);
        }

        for (position, id) in ids.into_iter().enumerate() {
            if let Some(card) = self.cards.iter_mut().find(|card| card.id == id) {
                card.position = position;
            }
        }
    }

    fn board_index(&self, id: &EntityId) -> Result<usize> {
        let numeric = id_to_numeric(id)?;
        self.boards
            .iter()
            .position(|row| row.id == numeric)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Board, id))
    }

    fn list_index(&self, id: &EntityId) -> Result<usize> {
        let numeric = id_to_numeric(id)?;
        self.lists
            .iter()
            .position(|row| row.id == numeric)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::List, id))
    }

    fn card_index(&self, id: &EntityId) -> Result<usize> {
        let numeric = id_to_numeric(id)?;
        self.cards
            .iter()
            .position(|row| row.id == numeric)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Card, id))
    }

    fn board_record(&self, row: &BoardRow) -> BoardRecord {
        BoardRecord {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            background: row.background.clone(),
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
            lists: self
                .lists
                .iter()
                .filter(|list| list.board_id == row.id)
                .map(|list| self.list_record(list))
                .collect(),
        }
    }

    fn list_record(&self, row: &ListRow) -> ListRecord {
        ListRecord {
            id: row.id,
            board_id: row.board_id,
            title: row.title.clone(),
            position: row.position,
            created_at: Some(row.created_at),
            cards: self
                .cards
                .iter()
                .filter(|card| card.list_id == row.id)
                .map(card_record)
                .collect(),
        }
    }
}

fn card_record(row: &CardRow) -> CardRecord {
    CardRecord {
        id: row.id,
        list_id: row.list_id,
        title: row.title.clone(),
        description: row.description.clone(),
        position: row.position,
        created_at: Some(row.created_at),
        updated_at: Some(row.updated_at),
    }
}
