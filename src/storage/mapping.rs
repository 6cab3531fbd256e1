//! Boundary between the backend's numeric ids and the core's opaque ids.
//!
//! Records arriving from a backend are ordered by position here and
//! renumbered, and their back-references are derived from nesting, so the
//! store only ever sees dense, consistent trees.

use crate::domain::{renumbered, Board, Card, EntityId, List};
use crate::error::{MartrelloError, Result};
use crate::storage::wire::{BoardRecord, CardRecord, ListRecord};

pub fn id_from_numeric(id: i64) -> EntityId {
    EntityId::new(id.to_string())
}

/// Parses an opaque id back into the backend's positive numeric id
pub fn id_to_numeric(id: &EntityId) -> Result<i64> {
    match id.as_str().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(MartrelloError::InvalidEntityId(id.to_string())),
    }
}

pub fn card_from_record(record: CardRecord) -> Card {
    Card {
        id: id_from_numeric(record.id),
        list_id: id_from_numeric(record.list_id),
        title: record.title,
        description: record.description,
        position: record.position,
    }
}

pub fn list_from_record(mut record: ListRecord) -> List {
    let id = id_from_numeric(record.id);
    record.cards.sort_by_key(|card| (card.position, card.id));
    let cards = record
        .cards
        .into_iter()
        .map(|card| Card {
            list_id: id.clone(),
            ..card_from_record(card)
        })
        .collect();

    List {
        id,
        board_id: id_from_numeric(record.board_id),
        title: record.title,
        position: record.position,
        cards: renumbered(cards),
    }
}

pub fn board_from_record(mut record: BoardRecord) -> Board {
    let id = id_from_numeric(record.id);
    record.lists.sort_by_key(|list| (list.position, list.id));
    let lists = record
        .lists
        .into_iter()
        .map(|list| List {
            board_id: id.clone(),
            ..list_from_record(list)
        })
        .collect();

    Board {
        id,
        title: record.title,
        description: record.description,
        background: record.background,
        lists: renumbered(lists),
    }
}

pub fn boards_from_records(records: Vec<BoardRecord>) -> Vec<Board> {
    records.into_iter().map(board_from_record).collect()
}
