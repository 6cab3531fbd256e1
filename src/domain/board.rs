use crate::domain::{id::EntityId, position::Positioned};
use crate::error::{MartrelloError, Result};
use serde::{Deserialize, Serialize};

/// Longest title accepted for boards, lists and cards
pub const MAX_TITLE_LEN: usize = 255;

/// Trims a title and rejects empty or over-long values
pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(MartrelloError::Validation(
            "title must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(MartrelloError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// Smallest unit of work; belongs to exactly one list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: EntityId,
    /// Denormalized back-reference to the owning list
    pub list_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub position: usize,
}

impl Card {
    pub fn new(id: EntityId, list_id: EntityId, title: String) -> Self {
        Self {
            id,
            list_id,
            title,
            description: String::new(),
            position: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Positioned for Card {
    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

/// Ordered container of cards within a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: EntityId,
    /// Denormalized back-reference to the owning board
    pub board_id: EntityId,
    pub title: String,
    pub position: usize,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl List {
    pub fn new(id: EntityId, board_id: EntityId, title: String) -> Self {
        Self {
            id,
            board_id,
            title,
            position: 0,
            cards: Vec::new(),
        }
    }

    /// Index of a card within this list
    pub fn card_index(&self, card_id: &EntityId) -> Option<usize> {
        self.cards.iter().position(|card| &card.id == card_id)
    }

    pub fn contains_card(&self, card_id: &EntityId) -> bool {
        self.card_index(card_id).is_some()
    }

    pub fn card_ids(&self) -> Vec<EntityId> {
        self.cards.iter().map(|card| card.id.clone()).collect()
    }
}

impl Positioned for List {
    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

/// Top-level container of ordered lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub lists: Vec<List>,
}

impl Board {
    pub fn new(id: EntityId, title: String) -> Self {
        Self {
            id,
            title,
            description: String::new(),
            background: String::new(),
            lists: Vec::new(),
        }
    }

    /// Index of a list within this board
    pub fn list_index(&self, list_id: &EntityId) -> Option<usize> {
        self.lists.iter().position(|list| &list.id == list_id)
    }

    pub fn list_ids(&self) -> Vec<EntityId> {
        self.lists.iter().map(|list| list.id.clone()).collect()
    }

    /// Total number of cards across all lists
    pub fn card_count(&self) -> usize {
        self.lists.iter().map(|list| list.cards.len()).sum()
    }
}
