//! In-memory pickup slot ledger
//!
//! The ledger is a projection of the day's slot occupancy, reloaded
//! wholesale from the persistence store. Slot labels are kept in the
//! ascending chronological order the store returns them in; adjacency in
//! that sequence is what "contiguous" means everywhere below.
//!
//! An order of quantity N occupies the N consecutive slots ending at its
//! requested pickup slot (preparation throughput counts backward from the
//! pickup time).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::TimeSlot;

/// Errors from ledger operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Queried or mutated before any slot sequence was loaded
    #[error("slot ledger has not been loaded yet")]
    NotLoaded,

    /// The requested reservation cannot be satisfied: unknown label,
    /// not enough slots before it in the day, or part of the run is
    /// already committed to another order
    #[error("cannot reserve {quantity} slot(s) ending at '{label}'")]
    SlotOutOfRange { label: String, quantity: u32 },
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Occupancy map over one workday's pickup slots
#[derive(Debug, Default)]
pub struct SlotLedger {
    /// Slots in ascending chronological order
    slots: Vec<TimeSlot>,
    /// Label -> position in `slots`
    index: HashMap<String, usize>,
    /// False until the first `load`
    loaded: bool,
}

impl SlotLedger {
    /// Create an empty, unloaded ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire ledger state with a fresh slot sequence.
    ///
    /// The order of `slots` becomes the canonical ordering for every
    /// subsequent query until the next load.
    pub fn load(&mut self, slots: Vec<TimeSlot>) {
        self.index = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.label.clone(), i))
            .collect();
        self.slots = slots;
        self.loaded = true;
    }

    /// Whether a slot sequence has been loaded
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of slots currently free
    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.occupied).count()
    }

    /// Commit `quantity` contiguous slots ending at `target_label`.
    ///
    /// The run is counted backward from the target inclusive. Returns the
    /// changed labels in the order they were marked (target first). Fails
    /// with [`LedgerError::SlotOutOfRange`] without touching any slot when
    /// the label is unknown, the backward walk would run past day start,
    /// or any slot in the run is already occupied.
    pub fn reserve(&mut self, target_label: &str, quantity: u32) -> LedgerResult<Vec<String>> {
        if !self.loaded {
            return Err(LedgerError::NotLoaded);
        }

        let out_of_range = || LedgerError::SlotOutOfRange {
            label: target_label.to_string(),
            quantity,
        };

        let end = *self.index.get(target_label).ok_or_else(out_of_range)?;
        let quantity_len = quantity as usize;
        if quantity_len > end + 1 {
            return Err(out_of_range());
        }
        let start = end + 1 - quantity_len;

        // Check the whole run before mutating anything
        if self.slots[start..=end].iter().any(|s| s.occupied) {
            return Err(out_of_range());
        }

        let mut changed = Vec::with_capacity(quantity_len);
        for i in (start..=end).rev() {
            self.slots[i].occupied = true;
            changed.push(self.slots[i].label.clone());
        }
        Ok(changed)
    }

    /// Clear the occupied flag on the given labels.
    ///
    /// Unwinds a reservation whose durable write failed, so the
    /// projection never outruns the store. Unknown labels are ignored.
    pub fn release(&mut self, labels: &[String]) {
        for label in labels {
            if let Some(&i) = self.index.get(label) {
                self.slots[i].occupied = false;
            }
        }
    }

    /// Every label after `cutoff` that ends an unbroken run of `quantity`
    /// free slots, all of them after the cutoff themselves.
    ///
    /// `cutoff` is a `HH:MM` label: "now plus the configured lead time".
    /// Labels are zero-padded so string comparison is chronological
    /// comparison. Returns an empty list immediately when fewer than
    /// `quantity` slots are free overall.
    pub fn available_slots(&self, quantity: u32, cutoff: &str) -> Vec<String> {
        let quantity_len = quantity as usize;
        if quantity_len == 0 || self.free_count() < quantity_len {
            return Vec::new();
        }

        let mut available = Vec::new();
        let mut free_run = 0usize;
        for slot in &self.slots {
            if slot.occupied || slot.label.as_str() <= cutoff {
                free_run = 0;
                continue;
            }
            free_run += 1;
            if free_run >= quantity_len {
                available.push(slot.label.clone());
            }
        }
        available
    }

    /// All unoccupied labels, in ledger order
    pub fn empty_slots(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| !s.occupied)
            .map(|s| s.label.clone())
            .collect()
    }
}

/// Format "now plus lead time" as a `HH:MM` cutoff label.
///
/// Slots at or before the cutoff are too close to be offered; the exact
/// offset is configuration (`lead_time_minutes`), not behavior.
pub fn lead_cutoff(now: DateTime<Utc>, lead_minutes: i64) -> String {
    (now + Duration::minutes(lead_minutes))
        .format("%H:%M")
        .to_string()
}
