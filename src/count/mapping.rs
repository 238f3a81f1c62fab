use arrayvec::ArrayVec;

use crate::backend::MAX_SLOTS;
use crate::event::Event;

/// Pairing of requested events with counter register slots.
///
/// Events keep their request order and take slots `0, 1, ...`; events past
/// the number of available slots are not mapped. A mapping never changes
/// once built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventSlotMapping {
    entries: ArrayVec<(Event, usize), MAX_SLOTS>,
}

impl EventSlotMapping {
    /// Maps `events` onto `available` slots, returning the mapping and the
    /// surplus events that did not get a slot.
    pub fn new(events: &[Event], available: usize) -> (Self, &[Event]) {
        let len = events.len().min(available).min(MAX_SLOTS);
        let (mapped, surplus) = events.split_at(len);
        let entries = mapped.iter().copied().zip(0..).collect();
        (Self { entries }, surplus)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(event, slot)` pairs in request order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (Event, usize)> + '_ {
        self.entries.iter().copied()
    }

    pub fn events(&self) -> impl ExactSizeIterator<Item = Event> + '_ {
        self.entries.iter().map(|(event, _)| *event)
    }

    /// Slot of the first mapping entry for `event`.
    pub fn slot_of(&self, event: Event) -> Option<usize> {
        self.entries
            .iter()
            .find(|(it, _)| *it == event)
            .map(|(_, slot)| *slot)
    }

    /// Register config words, one per mapped slot.
    pub fn configs(&self) -> ArrayVec<u64, MAX_SLOTS> {
        self.events().map(Event::config).collect()
    }
}
