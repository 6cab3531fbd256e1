//! # Martrello Core
//!
//! Ordering engine behind Martrello kanban boards.
//!
//! Boards own ordered lists and lists own ordered cards. Drag gestures are
//! turned into moves that are applied to the local [`BoardStore`] at once and
//! confirmed with a [`Persistence`] backend afterwards; a rejected move is
//! rolled back or reconciled by reloading authoritative state.

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod storage;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use config::CoreConfig;
pub use domain::{Board, Card, EntityId, List};
pub use error::{EntityKind, MartrelloError, Result};
pub use storage::{memory_storage::MemoryStorage, Persistence};
pub use store::{BoardStore, StoreSnapshot};
pub use sync::{BoardController, DragAdapter, DragEvent, DragOutcome, MoveOutcome};

#[cfg(feature = "file-storage")]
pub use storage::file_storage::FileStorage;
