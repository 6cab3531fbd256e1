//! Turns drag gestures into store moves.
//!
//! While a card is dragged across lists it is moved in the local store right
//! away (a preview) so the board shows it in the hovered list. Nothing is sent
//! to the backend until the drop; a cancel moves the dragged card back to
//! where the gesture picked it up and leaves everything else alone.

use crate::{
    domain::EntityId,
    error::{EntityKind, MartrelloError, Result},
    store::{BoardStore, CardLocation, Resolved},
    sync::controller::{BoardController, ListMoveReport, MoveOutcome},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragPhase {
    Start,
    Over,
    End,
    Cancel,
}

/// Normalized pointer event delivered by the drag sensor layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragEvent {
    pub phase: DragPhase,
    pub dragged_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub over_container_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub over_item_id: Option<EntityId>,
}

impl DragEvent {
    fn new(phase: DragPhase, dragged_id: impl Into<EntityId>) -> Self {
        Self {
            phase,
            dragged_id: dragged_id.into(),
            over_container_id: None,
            over_item_id: None,
        }
    }

    pub fn start(dragged_id: impl Into<EntityId>) -> Self {
        Self::new(DragPhase::Start, dragged_id)
    }

    /// Hovering a specific card inside a list
    pub fn over_item(
        dragged_id: impl Into<EntityId>,
        container_id: impl Into<EntityId>,
        item_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            over_container_id: Some(container_id.into()),
            over_item_id: Some(item_id.into()),
            ..Self::new(DragPhase::Over, dragged_id)
        }
    }

    /// Hovering the empty area of a list
    pub fn over_container(
        dragged_id: impl Into<EntityId>,
        container_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            over_container_id: Some(container_id.into()),
            ..Self::new(DragPhase::Over, dragged_id)
        }
    }

    /// Drop; the hover target is whatever the pointer was over at release
    pub fn end(
        dragged_id: impl Into<EntityId>,
        over_container_id: Option<EntityId>,
        over_item_id: Option<EntityId>,
    ) -> Self {
        Self {
            over_container_id,
            over_item_id,
            ..Self::new(DragPhase::End, dragged_id)
        }
    }

    pub fn cancel(dragged_id: impl Into<EntityId>) -> Self {
        Self::new(DragPhase::Cancel, dragged_id)
    }

    fn has_target(&self) -> bool {
        self.over_container_id.is_some() || self.over_item_id.is_some()
    }
}

/// What handling one event did
#[derive(Debug)]
pub enum DragOutcome {
    Started,
    /// The dragged card was moved locally to the hovered position
    Previewed(CardLocation),
    /// The event required no change
    Ignored,
    /// A card drop was sent for confirmation
    CardCommitted(MoveOutcome),
    /// A list drop was sent for confirmation
    ListCommitted(ListMoveReport),
    /// Dropped where it started; nothing sent
    NoChange,
    /// Previews discarded and the dragged card returned to its origin
    Cancelled,
}

#[derive(Debug, Clone)]
enum DraggedEntity {
    Card {
        card_id: EntityId,
    },
    List {
        list_id: EntityId,
        board_id: EntityId,
        origin_index: usize,
    },
}

/// What the gesture itself has done to the dragged card
#[derive(Debug, Clone)]
struct GestureMove {
    /// Where the card was before the gesture moved it
    home: CardLocation,
    /// List the gesture last put the card in
    placed_in: EntityId,
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    entity: DraggedEntity,
    moved: Option<GestureMove>,
}

impl ActiveDrag {
    /// Records a move made by the gesture
    ///
    /// If something else relocated the card since the gesture last placed
    /// it (a reload, say), its location before this move becomes the new home.
    fn record_move(&mut self, from: CardLocation, to_list_id: &EntityId) {
        let home = match self.moved.take() {
            Some(moved) if moved.placed_in == from.list_id => moved.home,
            _ => from,
        };
        self.moved = Some(GestureMove {
            home,
            placed_in: to_list_id.clone(),
        });
    }
}

/// Drives one drag gesture at a time against a [`BoardController`]
pub struct DragAdapter {
    controller: BoardController,
    active: Option<ActiveDrag>,
}

impl DragAdapter {
    pub fn new(controller: BoardController) -> Self {
        Self {
            controller,
            active: None,
        }
    }

    pub fn controller(&self) -> &BoardController {
        &self.controller
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    /// Id of the card or list being dragged
    pub fn active_id(&self) -> Option<&EntityId> {
        self.active.as_ref().map(|drag| match &drag.entity {
            DraggedEntity::Card { card_id, .. } => card_id,
            DraggedEntity::List { list_id, .. } => list_id,
        })
    }

    pub async fn handle(&mut self, event: DragEvent) -> Result<DragOutcome> {
        match event.phase {
            DragPhase::Start => self.start(&event.dragged_id).await,
            DragPhase::Over => {
                self.over(event.over_container_id.as_ref(), event.over_item_id.as_ref())
            }
            DragPhase::End => {
                if event.has_target() {
                    self.end(event.over_container_id.as_ref(), event.over_item_id.as_ref())
                        .await
                } else {
                    self.cancel().await
                }
            }
            DragPhase::Cancel => self.cancel().await,
        }
    }

    /// Remembers the dragged card or list; no mutation yet
    ///
    /// A gesture still in progress is cancelled first.
    pub async fn start(&mut self, dragged_id: &EntityId) -> Result<DragOutcome> {
        if self.active.is_some() {
            self.cancel().await?;
        }

        let entity = match self.controller.read(|store| store.resolve(dragged_id)) {
            Some(Resolved::Card(_)) => DraggedEntity::Card {
                card_id: dragged_id.clone(),
            },
            Some(Resolved::List { board_id, index }) => DraggedEntity::List {
                list_id: dragged_id.clone(),
                board_id,
                origin_index: index,
            },
            None => {
                return Err(MartrelloError::Validation(format!(
                    "{} is neither a card nor a list",
                    dragged_id
                )))
            }
        };

        debug!(dragged = %dragged_id, "drag started");
        self.active = Some(ActiveDrag {
            entity,
            moved: None,
        });
        Ok(DragOutcome::Started)
    }

    /// Previews a dragged card in a different list
    ///
    /// Hovering a card targets that card's index; hovering a list's empty
    /// area targets the end of the list. Hovers inside the card's current
    /// list are left to the drop.
    pub fn over(
        &mut self,
        over_container_id: Option<&EntityId>,
        over_item_id: Option<&EntityId>,
    ) -> Result<DragOutcome> {
        let Some(drag) = self.active.as_mut() else {
            return Ok(DragOutcome::Ignored);
        };
        let DraggedEntity::Card { card_id } = &drag.entity else {
            return Ok(DragOutcome::Ignored);
        };
        let card_id = card_id.clone();

        let preview = self.controller.with_store_mut(|store| {
            let Some(current) = store.card_location(&card_id) else {
                return Ok(None);
            };
            let Some(target) = drop_target(store, &card_id, over_container_id, over_item_id)
            else {
                return Ok(None);
            };
            if target.list_id == current.list_id {
                return Ok(None);
            }
            store
                .move_card(&card_id, &target.list_id, target.index)
                .map(|location| Some((current, location)))
        })?;

        match preview {
            Some((from, location)) => {
                drag.record_move(from, &location.list_id);
                debug!(
                    card = %card_id,
                    list = %location.list_id,
                    index = location.index,
                    "drag preview"
                );
                Ok(DragOutcome::Previewed(location))
            }
            None => Ok(DragOutcome::Ignored),
        }
    }

    /// Resolves the drop and confirms it if anything changed
    pub async fn end(
        &mut self,
        over_container_id: Option<&EntityId>,
        over_item_id: Option<&EntityId>,
    ) -> Result<DragOutcome> {
        let Some(mut drag) = self.active.take() else {
            return Ok(DragOutcome::Ignored);
        };

        match drag.entity.clone() {
            DraggedEntity::Card { card_id } => {
                let dropped = self.controller.with_store_mut(|store| -> Result<_> {
                    let from = store
                        .card_location(&card_id)
                        .ok_or_else(|| MartrelloError::not_found(EntityKind::Card, &card_id))?;
                    match drop_target(store, &card_id, over_container_id, over_item_id) {
                        Some(target) => store
                            .move_card(&card_id, &target.list_id, target.index)
                            .map(|to| (from, to)),
                        None => Ok((from.clone(), from)),
                    }
                });
                let final_location = dropped.map(|(from, to)| {
                    if from != to {
                        drag.record_move(from, &to.list_id);
                    }
                    to
                });

                // Back to where the card was before the gesture, so a
                // rejected drop rolls back there
                self.undo_moves(&card_id, drag.moved.as_ref()).await?;
                let final_location = final_location?;
                let resting = self.controller.read(|store| store.card_location(&card_id));
                if resting.as_ref() == Some(&final_location) {
                    debug!(card = %card_id, "dropped at origin");
                    return Ok(DragOutcome::NoChange);
                }

                let outcome = self
                    .controller
                    .request_move_card(&card_id, &final_location.list_id, final_location.index)
                    .await?;
                Ok(DragOutcome::CardCommitted(outcome))
            }
            DraggedEntity::List {
                list_id,
                board_id,
                origin_index,
            } => {
                let target_index = self.controller.read(|store| {
                    list_drop_index(store, &board_id, over_container_id, over_item_id)
                });
                match target_index {
                    Some(index) if index != origin_index => {
                        debug!(list = %list_id, from = origin_index, to = index, "list dropped");
                        let report = self
                            .controller
                            .request_move_list(&board_id, origin_index, index)
                            .await?;
                        Ok(DragOutcome::ListCommitted(report))
                    }
                    _ => Ok(DragOutcome::NoChange),
                }
            }
        }
    }

    /// Discards every preview of the current gesture
    pub async fn cancel(&mut self) -> Result<DragOutcome> {
        let Some(drag) = self.active.take() else {
            return Ok(DragOutcome::Ignored);
        };
        if let DraggedEntity::Card { card_id } = &drag.entity {
            self.undo_moves(card_id, drag.moved.as_ref()).await?;
        }
        debug!("drag cancelled");
        Ok(DragOutcome::Cancelled)
    }

    /// Moves the dragged card back to where the gesture picked it up
    ///
    /// Only the dragged card is touched, so changes made elsewhere during
    /// the gesture are kept. A card that is no longer where the gesture put
    /// it was relocated by a reload or rollback and stays put. If its home
    /// list is gone the card cannot be put back locally and the board state
    /// is reloaded instead.
    async fn undo_moves(&self, card_id: &EntityId, moved: Option<&GestureMove>) -> Result<()> {
        let Some(moved) = moved else {
            return Ok(());
        };
        let undone = self.controller.with_store_mut(|store| {
            match store.card_location(card_id) {
                Some(current) if current.list_id == moved.placed_in => store
                    .move_card(card_id, &moved.home.list_id, moved.home.index)
                    .is_ok(),
                _ => true,
            }
        });
        if !undone {
            warn!(card = %card_id, list = %moved.home.list_id, "home list gone, reloading");
            self.controller.refresh().await?;
        }
        Ok(())
    }
}

/// Where a dragged card would land for the given hover target
fn drop_target(
    store: &BoardStore,
    card_id: &EntityId,
    over_container_id: Option<&EntityId>,
    over_item_id: Option<&EntityId>,
) -> Option<CardLocation> {
    if let Some(item_id) = over_item_id {
        if item_id == card_id {
            return store.card_location(card_id);
        }
        match store.resolve(item_id) {
            Some(Resolved::Card(location)) => return Some(location),
            Some(Resolved::List { .. }) => return append_target(store, item_id),
            None => {}
        }
    }
    over_container_id.and_then(|list_id| append_target(store, list_id))
}

fn append_target(store: &BoardStore, list_id: &EntityId) -> Option<CardLocation> {
    store.list(list_id).map(|list| CardLocation {
        list_id: list.id.clone(),
        index: list.cards.len(),
    })
}

/// Index of the hovered list within the dragged list's board
fn list_drop_index(
    store: &BoardStore,
    board_id: &EntityId,
    over_container_id: Option<&EntityId>,
    over_item_id: Option<&EntityId>,
) -> Option<usize> {
    [over_item_id, over_container_id]
        .into_iter()
        .flatten()
        .find_map(|id| match store.resolve(id)? {
            Resolved::List {
                board_id: owner,
                index,
            } if &owner == board_id => Some(index),
            Resolved::Card(location) => store
                .list_location(&location.list_id)
                .filter(|(owner, _)| owner == board_id)
                .map(|(_, index)| index),
            _ => None,
        })
}
