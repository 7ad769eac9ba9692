//! Local feedback list reconciled from pushed events.
//!
//! The board is seeded from a REST fetch with [`FeedbackBoard::replace_all`]
//! and then kept current by applying every pushed event in arrival order.
//! Records are kept newest first.

use super::feedback::{FeedbackId, FeedbackRecord};
use super::feedback_event::{FeedbackEvent, InboundEvent};

/// What applying an event did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardChange {
    /// A record was added at the front.
    Inserted(FeedbackId),
    /// An existing record was replaced.
    Replaced(FeedbackId),
    /// A record was removed.
    Removed(FeedbackId),
    /// The event did not touch the board.
    Unchanged,
}

/// Ordered list of feedback records for one dashboard.
#[derive(Debug, Clone, Default)]
pub struct FeedbackBoard {
    records: Vec<FeedbackRecord>,
}

impl FeedbackBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole board, e.g. with the result of a REST fetch.
    pub fn replace_all(&mut self, records: Vec<FeedbackRecord>) {
        self.records = records;
    }

    /// Applies a raw inbound event. Kinds without a typed view are ignored.
    pub fn apply(&mut self, event: &InboundEvent) -> BoardChange {
        match FeedbackEvent::from_inbound(event) {
            Some(typed) => self.apply_typed(typed),
            None => {
                tracing::debug!(kind = %event.kind, "event does not affect feedback board");
                BoardChange::Unchanged
            }
        }
    }

    /// Applies a typed feedback event.
    pub fn apply_typed(&mut self, event: FeedbackEvent) -> BoardChange {
        match event {
            FeedbackEvent::NewFeedback(record) | FeedbackEvent::Created(record) => {
                // A record pushed twice must not appear twice.
                if self.replace(record.clone()) {
                    BoardChange::Replaced(record.id)
                } else {
                    let id = record.id;
                    self.records.insert(0, record);
                    BoardChange::Inserted(id)
                }
            }
            FeedbackEvent::Updated(record) | FeedbackEvent::Acknowledged(record) => {
                let id = record.id;
                if self.replace(record) {
                    BoardChange::Replaced(id)
                } else {
                    BoardChange::Unchanged
                }
            }
            FeedbackEvent::Deleted(id) => {
                let before = self.records.len();
                self.records.retain(|r| r.id != id);
                if self.records.len() < before {
                    BoardChange::Removed(id)
                } else {
                    BoardChange::Unchanged
                }
            }
        }
    }

    fn replace(&mut self, record: FeedbackRecord) -> bool {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: FeedbackId) -> Option<&FeedbackRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Returns the records, newest first.
    #[must_use]
    pub fn records(&self) -> &[FeedbackRecord] {
        &self.records
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the board holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records not yet acknowledged.
    #[must_use]
    pub fn pending_acknowledgements(&self) -> usize {
        self.records.iter().filter(|r| !r.acknowledged).count()
    }
}
