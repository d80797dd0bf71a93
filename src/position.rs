//! Position reconciliation.
//!
//! Task positions form a dense ranking `0..N`. Every structural change is
//! expressed as one [`Shift`] of a contiguous block of positions followed by
//! assigning the moved or inserted task its target. The same shift plan is
//! applied to the in-memory mirror here and to the server store as an SQL
//! `UPDATE` (see `db::task_repo`).

use crate::models::Task;

/// Add `delta` to every position in the inclusive range `start..=end`.
/// `end == None` means the range is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub start: i64,
    pub end: Option<i64>,
    pub delta: i64,
}

impl Shift {
    pub fn contains(&self, position: i64) -> bool {
        position >= self.start && self.end.map_or(true, |end| position <= end)
    }

    pub fn apply(&self, position: i64) -> i64 {
        if self.contains(position) {
            position + self.delta
        } else {
            position
        }
    }
}

/// Make room at `at`.
pub fn insert_shift(at: i64) -> Shift {
    Shift { start: at, end: None, delta: 1 }
}

/// Close the gap left at `at`, applied after the task has been removed.
pub fn delete_shift(at: i64) -> Shift {
    Shift { start: at, end: None, delta: -1 }
}

/// Shift the block between `from` and `to` one step towards `from`.
/// `None` when the task does not move.
pub fn move_shift(from: i64, to: i64) -> Option<Shift> {
    if to > from {
        Some(Shift { start: from + 1, end: Some(to), delta: -1 })
    } else if to < from {
        Some(Shift { start: to, end: Some(from - 1), delta: 1 })
    } else {
        None
    }
}

/// Target for an insert into a set of `len` tasks; missing means append.
pub fn clamp_insert(requested: Option<i64>, len: usize) -> i64 {
    let len = len as i64;
    requested.map_or(len, |p| p.clamp(0, len))
}

/// Target for moving within a set of `len` tasks.
pub fn clamp_move(requested: i64, len: usize) -> i64 {
    requested.clamp(0, (len as i64 - 1).max(0))
}

pub trait Positioned {
    fn position(&self) -> i64;
    fn set_position(&mut self, position: i64);
}

impl Positioned for Task {
    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

pub fn shift_positions<T: Positioned>(items: &mut [T], shift: Shift) {
    for item in items.iter_mut() {
        let p = item.position();
        item.set_position(shift.apply(p));
    }
}

/// Inserts `item` at the requested position (clamped) and returns the
/// position it was given.
pub fn insert<T: Positioned>(items: &mut Vec<T>, mut item: T, requested: Option<i64>) -> i64 {
    let at = clamp_insert(requested, items.len());
    shift_positions(items, insert_shift(at));
    item.set_position(at);
    items.push(item);
    sort(items);
    at
}

/// Removes the item at `index` and closes the gap.
pub fn remove<T: Positioned>(items: &mut Vec<T>, index: usize) -> T {
    let removed = items.remove(index);
    shift_positions(items, delete_shift(removed.position()));
    sort(items);
    removed
}

/// Moves the item at `index` to the requested position (clamped) and returns
/// the position it ended up at.
pub fn move_to<T: Positioned>(items: &mut [T], index: usize, requested: i64) -> i64 {
    let from = items[index].position();
    let to = clamp_move(requested, items.len());
    if let Some(shift) = move_shift(from, to) {
        for (i, item) in items.iter_mut().enumerate() {
            if i != index {
                let p = item.position();
                item.set_position(shift.apply(p));
            }
        }
        items[index].set_position(to);
    }
    sort(items);
    to
}

/// Stable sort by position. Equal positions should never happen; they are
/// logged and keep their existing relative order.
pub fn sort<T: Positioned>(items: &mut [T]) {
    items.sort_by_key(|item| item.position());
    if items.windows(2).any(|w| w[0].position() == w[1].position()) {
        tracing::warn!(count = items.len(), "duplicate task positions after reconciliation");
    }
}

/// True when positions are exactly `0..len` in order.
pub fn is_dense<T: Positioned>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(i, item)| item.position() == i as i64)
}
