//! Bounded single-producer/single-consumer event channel.
//!
//! The input thread owns the [`EventSender`]; the engine owns the
//! [`EventQueue`] and drains it from the audio callback without locking
//! or allocating.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tc_ir::Event;

use crate::error::SendError;

/// Default queue capacity, in events.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Create a connected sender/queue pair holding up to `capacity` events.
pub fn event_channel(capacity: usize) -> (EventSender, EventQueue) {
    let rb = HeapRb::<Event>::new(capacity.max(1));
    let (producer, consumer) = rb.split();
    (
        EventSender {
            producer,
            last_time: 0,
        },
        EventQueue { consumer },
    )
}

/// Producer half. Events must be pushed in time order.
pub struct EventSender {
    producer: HeapProd<Event>,
    last_time: u64,
}

impl EventSender {
    /// Enqueue an event.
    ///
    /// Rejects events stamped earlier than the previous one and events
    /// that do not fit; the rejected event is handed back.
    pub fn push(&mut self, event: Event) -> Result<(), SendError> {
        if event.time < self.last_time {
            return Err(SendError::OutOfOrder(event));
        }
        self.producer
            .try_push(event)
            .map_err(SendError::Full)?;
        self.last_time = event.time;
        Ok(())
    }

    /// Free space, in events.
    pub fn vacant(&self) -> usize {
        self.producer.vacant_len()
    }

    /// Time of the last accepted event.
    pub fn last_time(&self) -> u64 {
        self.last_time
    }
}

/// Consumer half, owned by the engine.
pub struct EventQueue {
    consumer: HeapCons<Event>,
}

impl EventQueue {
    /// Look at the next event without removing it.
    pub fn peek(&self) -> Option<&Event> {
        self.consumer.try_peek()
    }

    /// Remove the next event.
    pub fn pop(&mut self) -> Option<Event> {
        self.consumer.try_pop()
    }

    /// Events waiting to be consumed.
    pub fn elements_available(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Drop everything queued. Returns how many events were discarded.
    pub fn flush(&mut self) -> usize {
        let mut dropped = 0;
        while self.consumer.try_pop().is_some() {
            dropped += 1;
        }
        dropped
    }
}
