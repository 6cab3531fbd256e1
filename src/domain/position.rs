//! Dense 0-based ordering for lists within a board and cards within a list.

use crate::error::{MartrelloError, Result};

/// An element whose order is recorded as a rank within its parent
pub trait Positioned {
    fn position(&self) -> usize;
    fn set_position(&mut self, position: usize);
}

/// Assigns `position = index` to every element in its current order
///
/// Idempotent and O(n). Called after every insert, remove or reorder.
pub fn renumber<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index);
    }
}

/// Owned variant of [`renumber`]
pub fn renumbered<T: Positioned>(mut items: Vec<T>) -> Vec<T> {
    renumber(&mut items);
    items
}

/// True when positions are exactly `0..len` in storage order
pub fn is_dense<T: Positioned>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position() == index)
}

/// Fails with `InvariantViolation` when positions are not dense
///
/// This never repairs the sequence: a gap here is a defect in the caller.
pub fn verify_dense<T: Positioned>(items: &[T], scope: &str) -> Result<()> {
    match items
        .iter()
        .enumerate()
        .find(|(index, item)| item.position() != *index)
    {
        Some((index, item)) => Err(MartrelloError::InvariantViolation(format!(
            "{}: element at index {} has position {}",
            scope,
            index,
            item.position()
        ))),
        None => Ok(()),
    }
}
