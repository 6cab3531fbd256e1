pub mod controller;
pub mod drag;

pub use controller::{BoardController, ListMoveReport, MoveOutcome, PendingCardMove};
pub use drag::{DragAdapter, DragEvent, DragOutcome, DragPhase};
