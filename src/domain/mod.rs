pub mod board;
pub mod id;
pub mod position;

pub use board::{validate_title, Board, Card, List};
pub use id::EntityId;
pub use position::{is_dense, renumber, renumbered, verify_dense, Positioned};
