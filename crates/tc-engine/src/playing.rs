//! Bounded bookkeeping for held and displaced notes.

use heapless::Vec as StackVec;
use tc_ir::Event;

/// Slots in the held-note table.
pub const MAX_PLAYING_EVENTS: usize = 32;

/// Depth of the unison pending stack.
pub const MAX_PENDING_EVENTS: usize = 32;

/// Note-on events whose keys are still held, indexed by slot.
#[derive(Clone, Debug)]
pub struct PlayingEvents {
    slots: [Option<Event>; MAX_PLAYING_EVENTS],
}

impl PlayingEvents {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_PLAYING_EVENTS],
        }
    }

    /// Store an event in the first free slot. Returns the slot, or `None`
    /// when the table is full.
    pub fn insert(&mut self, event: Event) -> Option<usize> {
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some(event);
        Some(slot)
    }

    /// Free every slot held by `source`.
    pub fn remove_source(&mut self, source: u32) {
        for slot in &mut self.slots {
            if slot.is_some_and(|e| e.source == source) {
                *slot = None;
            }
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.slots = [None; MAX_PLAYING_EVENTS];
    }
}

impl Default for PlayingEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// LIFO of notes displaced in unison mode, revived as newer notes release.
#[derive(Clone, Debug, Default)]
pub struct PendingStack {
    events: StackVec<Event, MAX_PENDING_EVENTS>,
}

impl PendingStack {
    pub fn new() -> Self {
        Self {
            events: StackVec::new(),
        }
    }

    /// Push a displaced note. A full stack rejects the event.
    pub fn push(&mut self, event: Event) -> Result<(), Event> {
        self.events.push(event)
    }

    /// Most recently displaced note.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop()
    }

    /// Drop every entry from `source`, keeping the order of the rest.
    pub fn remove_source(&mut self, source: u32) {
        self.events.retain(|e| e.source != source);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}
