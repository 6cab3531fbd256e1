//! In-memory Board → List → Card tree with order-preserving mutations.
//!
//! Every mutation is synchronous and either completes fully or leaves the
//! tree untouched. Positions are renumbered after each structural change and
//! the store revision is bumped, so callers can tell whether anything changed
//! between two points in time.

use crate::domain::{position::renumber, verify_dense, Board, Card, EntityId, List};
use crate::error::{EntityKind, MartrelloError, Result};
use std::collections::HashSet;

mod snapshot;

pub use snapshot::StoreSnapshot;

/// Where a card currently lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLocation {
    pub list_id: EntityId,
    pub index: usize,
}

/// A card taken out of the tree by [`BoardStore::remove_card`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedCard {
    pub card: Card,
    pub from_list_id: EntityId,
    pub from_index: usize,
}

/// A list taken out of the tree by [`BoardStore::remove_list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedList {
    pub list: List,
    pub from_board_id: EntityId,
    pub from_index: usize,
}

/// A list whose position changed during a reorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionChange {
    pub id: EntityId,
    pub position: usize,
}

/// What an arbitrary id refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Card(CardLocation),
    List { board_id: EntityId, index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct BoardStore {
    boards: Vec<Board>,
    current_board_id: Option<EntityId>,
    revision: u64,
}

impl BoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from already-ordered boards
    pub fn with_boards(boards: Vec<Board>) -> Result<Self> {
        let mut store = Self::new();
        store.replace_all(boards)?;
        Ok(store)
    }

    /// Monotonic counter bumped by every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn board(&self, board_id: &EntityId) -> Option<&Board> {
        self.boards.iter().find(|board| &board.id == board_id)
    }

    pub fn list(&self, list_id: &EntityId) -> Option<&List> {
        self.list_path(list_id)
            .map(|(b, l)| &self.boards[b].lists[l])
    }

    pub fn card(&self, card_id: &EntityId) -> Option<&Card> {
        self.card_path(card_id)
            .map(|(b, l, c)| &self.boards[b].lists[l].cards[c])
    }

    pub fn card_location(&self, card_id: &EntityId) -> Option<CardLocation> {
        self.card_path(card_id).map(|(b, l, c)| CardLocation {
            list_id: self.boards[b].lists[l].id.clone(),
            index: c,
        })
    }

    /// Board id and index of a list
    pub fn list_location(&self, list_id: &EntityId) -> Option<(EntityId, usize)> {
        self.list_path(list_id)
            .map(|(b, l)| (self.boards[b].id.clone(), l))
    }

    /// Resolves an id to a card or a list; cards win on collision
    pub fn resolve(&self, id: &EntityId) -> Option<Resolved> {
        if let Some(location) = self.card_location(id) {
            return Some(Resolved::Card(location));
        }
        self.list_location(id)
            .map(|(board_id, index)| Resolved::List { board_id, index })
    }

    pub fn current_board_id(&self) -> Option<&EntityId> {
        self.current_board_id.as_ref()
    }

    pub fn current_board(&self) -> Option<&Board> {
        self.current_board_id
            .as_ref()
            .and_then(|board_id| self.board(board_id))
    }

    pub fn set_current_board(&mut self, board_id: Option<EntityId>) -> Result<()> {
        if let Some(id) = &board_id {
            if self.board_index(id).is_none() {
                return Err(MartrelloError::not_found(EntityKind::Board, id));
            }
        }
        self.current_board_id = board_id;
        Ok(())
    }

    /// Replaces the whole tree with authoritative state
    ///
    /// The incoming boards must already be ordered and densely positioned;
    /// nothing is replaced if they are not.
    pub fn replace_all(&mut self, boards: Vec<Board>) -> Result<()> {
        check_boards(&boards)?;
        self.boards = boards;
        if let Some(current) = self.current_board_id.clone() {
            if self.board_index(&current).is_none() {
                self.current_board_id = None;
            }
        }
        self.touch();
        Ok(())
    }

    pub fn insert_board(&mut self, board: Board) -> Result<()> {
        if self.board_index(&board.id).is_some() {
            return Err(MartrelloError::Validation(format!(
                "board {} already exists",
                board.id
            )));
        }
        let mut candidate = self.boards.clone();
        candidate.push(board);
        check_boards(&candidate)?;
        self.boards = candidate;
        self.touch();
        Ok(())
    }

    pub fn remove_board(&mut self, board_id: &EntityId) -> Result<Board> {
        let index = self
            .board_index(board_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Board, board_id))?;
        let board = self.boards.remove(index);
        if self.current_board_id.as_ref() == Some(board_id) {
            self.current_board_id = None;
        }
        self.touch();
        Ok(board)
    }

    /// Updates the board's descriptive fields; `None` leaves a field as is
    pub fn set_board_fields(
        &mut self,
        board_id: &EntityId,
        title: Option<String>,
        description: Option<String>,
        background: Option<String>,
    ) -> Result<()> {
        let index = self
            .board_index(board_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Board, board_id))?;
        let board = &mut self.boards[index];
        if let Some(title) = title {
            board.title = title;
        }
        if let Some(description) = description {
            board.description = description;
        }
        if let Some(background) = background {
            board.background = background;
        }
        self.touch();
        Ok(())
    }

    /// Inserts a list at `at_index` (clamped to the list count) and renumbers
    pub fn insert_list(
        &mut self,
        board_id: &EntityId,
        mut list: List,
        at_index: usize,
    ) -> Result<usize> {
        let b = self
            .board_index(board_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Board, board_id))?;
        if self.list_path(&list.id).is_some() {
            return Err(MartrelloError::Validation(format!(
                "list {} already exists",
                list.id
            )));
        }
        let mut incoming = HashSet::new();
        if let Some(card) = list
            .cards
            .iter()
            .find(|card| !incoming.insert(&card.id) || self.card_path(&card.id).is_some())
        {
            return Err(MartrelloError::Validation(format!(
                "card {} already exists",
                card.id
            )));
        }

        list.board_id = board_id.clone();
        for card in &mut list.cards {
            card.list_id = list.id.clone();
        }
        renumber(&mut list.cards);

        let lists = &mut self.boards[b].lists;
        let index = at_index.min(lists.len());
        lists.insert(index, list);
        renumber(lists);
        self.touch();
        Ok(index)
    }

    pub fn remove_list(&mut self, list_id: &EntityId) -> Result<RemovedList> {
        let (b, l) = self
            .list_path(list_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::List, list_id))?;
        let board = &mut self.boards[b];
        let list = board.lists.remove(l);
        renumber(&mut board.lists);
        let removed = RemovedList {
            list,
            from_board_id: board.id.clone(),
            from_index: l,
        };
        self.touch();
        Ok(removed)
    }

    pub fn set_list_title(&mut self, list_id: &EntityId, title: String) -> Result<()> {
        let (b, l) = self
            .list_path(list_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::List, list_id))?;
        self.boards[b].lists[l].title = title;
        self.touch();
        Ok(())
    }

    /// Moves the list at `from_index` so that it ends up at `to_index`
    ///
    /// `to_index` is clamped to the last slot. Returns the lists whose
    /// position changed, in their new order; empty when nothing moved.
    pub fn move_list(
        &mut self,
        board_id: &EntityId,
        from_index: usize,
        to_index: usize,
    ) -> Result<Vec<PositionChange>> {
        let b = self
            .board_index(board_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Board, board_id))?;
        let len = self.boards[b].lists.len();
        if from_index >= len {
            return Err(MartrelloError::Validation(format!(
                "list index {} out of range for board {} with {} lists",
                from_index, board_id, len
            )));
        }

        let target = to_index.min(len - 1);
        if target == from_index {
            return Ok(Vec::new());
        }

        let lists = &mut self.boards[b].lists;
        let list = lists.remove(from_index);
        lists.insert(target, list);

        let changed: Vec<PositionChange> = lists
            .iter()
            .enumerate()
            .filter(|(index, list)| list.position != *index)
            .map(|(index, list)| PositionChange {
                id: list.id.clone(),
                position: index,
            })
            .collect();
        renumber(lists);
        self.touch();
        Ok(changed)
    }

    /// Inserts a card into a list at `at_index` (clamped to the card count)
    pub fn insert_card(
        &mut self,
        list_id: &EntityId,
        mut card: Card,
        at_index: usize,
    ) -> Result<usize> {
        let (b, l) = self
            .list_path(list_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::List, list_id))?;
        if self.card_path(&card.id).is_some() {
            return Err(MartrelloError::Validation(format!(
                "card {} already exists",
                card.id
            )));
        }

        card.list_id = list_id.clone();
        let cards = &mut self.boards[b].lists[l].cards;
        let index = at_index.min(cards.len());
        cards.insert(index, card);
        renumber(cards);
        self.touch();
        Ok(index)
    }

    pub fn remove_card(&mut self, card_id: &EntityId) -> Result<RemovedCard> {
        let (b, l, c) = self
            .card_path(card_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Card, card_id))?;
        let list = &mut self.boards[b].lists[l];
        let card = list.cards.remove(c);
        renumber(&mut list.cards);
        let removed = RemovedCard {
            card,
            from_list_id: list.id.clone(),
            from_index: c,
        };
        self.touch();
        Ok(removed)
    }

    /// Updates a card's text fields; `None` leaves a field as is
    pub fn set_card_fields(
        &mut self,
        card_id: &EntityId,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        let (b, l, c) = self
            .card_path(card_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Card, card_id))?;
        let card = &mut self.boards[b].lists[l].cards[c];
        if let Some(title) = title {
            card.title = title;
        }
        if let Some(description) = description {
            card.description = description;
        }
        self.touch();
        Ok(())
    }

    /// Moves a card so that it ends up at `to_index` of `to_list_id`
    ///
    /// Within a single list the card is taken out first, which shifts every
    /// later card down by one. Inserting at `to_index` in the shortened
    /// sequence therefore lands the card at `to_index` of the final order,
    /// clamped to the last slot. Moving a card onto its own slot changes
    /// nothing and does not bump the revision.
    pub fn move_card(
        &mut self,
        card_id: &EntityId,
        to_list_id: &EntityId,
        to_index: usize,
    ) -> Result<CardLocation> {
        let (fb, fl, fc) = self
            .card_path(card_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::Card, card_id))?;
        let (tb, tl) = self
            .list_path(to_list_id)
            .ok_or_else(|| MartrelloError::not_found(EntityKind::List, to_list_id))?;

        if (fb, fl) == (tb, tl) {
            let cards = &mut self.boards[fb].lists[fl].cards;
            let target = to_index.min(cards.len() - 1);
            if target != fc {
                let card = cards.remove(fc);
                cards.insert(target, card);
                renumber(cards);
                self.touch();
            }
            return Ok(CardLocation {
                list_id: to_list_id.clone(),
                index: target,
            });
        }

        let source = &mut self.boards[fb].lists[fl].cards;
        let mut card = source.remove(fc);
        renumber(source);

        card.list_id = to_list_id.clone();
        let dest = &mut self.boards[tb].lists[tl].cards;
        let index = to_index.min(dest.len());
        dest.insert(index, card);
        renumber(dest);
        self.touch();

        Ok(CardLocation {
            list_id: to_list_id.clone(),
            index,
        })
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            boards: self.boards.clone(),
            current_board_id: self.current_board_id.clone(),
            revision: self.revision,
        }
    }

    /// Atomically replaces the tree with a snapshot's contents
    ///
    /// Restoring is itself a mutation: the revision keeps increasing.
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.boards = snapshot.boards;
        self.current_board_id = snapshot.current_board_id;
        self.touch();
    }

    /// Verifies dense positions, back-references and id uniqueness
    pub fn check_invariants(&self) -> Result<()> {
        check_boards(&self.boards)
    }

    fn touch(&mut self) {
        self.revision += 1;
        if cfg!(debug_assertions) {
            if let Err(err) = self.check_invariants() {
                panic!("board store corrupted: {}", err);
            }
        }
    }

    fn board_index(&self, board_id: &EntityId) -> Option<usize> {
        self.boards.iter().position(|board| &board.id == board_id)
    }

    fn list_path(&self, list_id: &EntityId) -> Option<(usize, usize)> {
        self.boards.iter().enumerate().find_map(|(b, board)| {
            board.list_index(list_id).map(|l| (b, l))
        })
    }

    fn card_path(&self, card_id: &EntityId) -> Option<(usize, usize, usize)> {
        self.boards.iter().enumerate().find_map(|(b, board)| {
            board
                .lists
                .iter()
                .enumerate()
                .find_map(|(l, list)| list.card_index(card_id).map(|c| (b, l, c)))
        })
    }
}

fn check_boards(boards: &[Board]) -> Result<()> {
    let mut board_ids = HashSet::new();
    let mut list_ids = HashSet::new();
    let mut card_ids = HashSet::new();

    for board in boards {
        if !board_ids.insert(&board.id) {
            return Err(MartrelloError::InvariantViolation(format!(
                "duplicate board {}",
                board.id
            )));
        }
        verify_dense(&board.lists, &format!("board {}", board.id))?;

        for list in &board.lists {
            if !list_ids.insert(&list.id) {
                return Err(MartrelloError::InvariantViolation(format!(
                    "duplicate list {}",
                    list.id
                )));
            }
            if list.board_id != board.id {
                return Err(MartrelloError::InvariantViolation(format!(
                    "list {} points at board {} but is owned by board {}",
                    list.id, list.board_id, board.id
                )));
            }
            verify_dense(&list.cards, &format!("list {}", list.id))?;

            for card in &list.cards {
                if !card_ids.insert(&card.id) {
                    return Err(MartrelloError::InvariantViolation(format!(
                        "card {} appears in more than one place",
                        card.id
                    )));
                }
                if card.list_id != list.id {
                    return Err(MartrelloError::InvariantViolation(format!(
                        "card {} points at list {} but is owned by list {}",
                        card.id, card.list_id, list.id
                    )));
                }
            }
        }
    }
    Ok(())
}
