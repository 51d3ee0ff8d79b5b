// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::{collections::HashMap, time::Duration};

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone, PartialOrd, Ord)]
pub struct EventId(pub u64);

/// Schedules and cancels timeouts on behalf of the engine. An expired event is posted back into
/// the engine's queue as `Message::Timeout` carrying the `EventId` returned here.
pub trait Scheduler {
    /// Requests an event `after` from now. Returns a unique ID used to cancel the event.
    fn schedule(&mut self, after: Duration) -> EventId;
    /// Cancels a previously scheduled event. Canceling an expired event is a no-op.
    fn cancel(&mut self, id: EventId);
}

/// A timer to schedule and cancel timeouts and retrieve triggered events.
pub struct Timer<E> {
    events: HashMap<EventId, E>,
    scheduler: Box<dyn Scheduler>,
}

impl<E> Timer<E> {
    pub fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self { events: HashMap::default(), scheduler }
    }

    /// Returns the event for an expired `event_id`, at most once. Canceled events yield `None`.
    pub fn triggered(&mut self, event_id: &EventId) -> Option<E> {
        self.events.remove(event_id)
    }

    pub fn schedule_after(&mut self, after: Duration, event: E) -> EventId {
        let event_id = self.scheduler.schedule(after);
        self.events.insert(event_id, event);
        event_id
    }

    pub fn cancel_event(&mut self, event_id: EventId) {
        if self.events.remove(&event_id).is_some() {
            self.scheduler.cancel(event_id);
        }
    }

    /// Cancels every pending event for which `pred` holds.
    pub fn cancel_where<F: FnMut(&E) -> bool>(&mut self, mut pred: F) {
        let ids: Vec<EventId> =
            self.events.iter().filter(|(_, event)| pred(event)).map(|(id, _)| *id).collect();
        for id in ids {
            self.cancel_event(id);
        }
    }

    pub fn cancel_all(&mut self) {
        for event_id in self.events.keys() {
            self.scheduler.cancel(*event_id);
        }
        self.events.clear();
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
pub use test_utils::*;

#[cfg(test)]
mod test_utils {
    use {super::*, parking_lot::Mutex, std::sync::Arc};

    #[derive(Default, Debug)]
    pub struct FakeSchedulerState {
        next_id: u64,
        pub scheduled: Vec<(EventId, Duration)>,
        pub canceled: Vec<EventId>,
    }

    /// Hands out sequential event IDs and records every request.
    #[derive(Clone, Default)]
    pub struct FakeScheduler {
        pub state: Arc<Mutex<FakeSchedulerState>>,
    }

    impl FakeScheduler {
        pub fn new() -> Self {
            Self::default()
        }

        /// Events scheduled and not canceled since.
        pub fn live_events(&self) -> Vec<(EventId, Duration)> {
            let state = self.state.lock();
            state
                .scheduled
                .iter()
                .filter(|(id, _)| !state.canceled.contains(id))
                .cloned()
                .collect()
        }
    }

    impl Scheduler for FakeScheduler {
        fn schedule(&mut self, after: Duration) -> EventId {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = EventId(state.next_id);
            state.scheduled.push((id, after));
            id
        }

        fn cancel(&mut self, id: EventId) {
            self.state.lock().canceled.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(PartialEq, Eq, Debug, Hash)]
    struct FooEvent(u8);

    #[test]
    fn schedule_cancel_event() {
        let fake_scheduler = FakeScheduler::new();
        let mut timer = Timer::<FooEvent>::new(Box::new(fake_scheduler.clone()));
        let after = Duration::from_millis(5);

        // Verify event triggers no more than once.
        let event_id = timer.schedule_after(after, FooEvent(8));
        assert_eq!(timer.triggered(&event_id), Some(FooEvent(8)));
        assert_eq!(timer.triggered(&event_id), None);

        // Verify event does not trigger if it was canceled.
        let event_id = timer.schedule_after(after, FooEvent(9));
        timer.cancel_event(event_id);
        assert_eq!(timer.triggered(&event_id), None);
        assert_eq!(fake_scheduler.state.lock().canceled, vec![event_id]);

        // Verify multiple events can be scheduled and canceled.
        let event_id_1 = timer.schedule_after(after, FooEvent(8));
        let event_id_2 = timer.schedule_after(after, FooEvent(9));
        let event_id_3 = timer.schedule_after(after, FooEvent(10));
        timer.cancel_event(event_id_2);
        assert_eq!(timer.triggered(&event_id_2), None);
        assert_eq!(timer.triggered(&event_id_3), Some(FooEvent(10)));
        assert_eq!(timer.triggered(&event_id_1), Some(FooEvent(8)));
    }

    #[test]
    fn cancel_where() {
        let fake_scheduler = FakeScheduler::new();
        let mut timer = Timer::new(Box::new(fake_scheduler.clone()));
        let after = Duration::from_millis(5);

        let event_id_1 = timer.schedule_after(after, FooEvent(1));
        let event_id_2 = timer.schedule_after(after, FooEvent(2));
        let event_id_3 = timer.schedule_after(after, FooEvent(1));
        timer.cancel_where(|event| event.0 == 1);
        assert_eq!(timer.pending(), 1);
        assert_eq!(timer.triggered(&event_id_1), None);
        assert_eq!(timer.triggered(&event_id_3), None);
        assert_eq!(timer.triggered(&event_id_2), Some(FooEvent(2)));
        assert_eq!(fake_scheduler.live_events(), vec![(event_id_2, after)]);
    }

    #[test]
    fn cancel_all() {
        let mut timer = Timer::<_>::new(Box::new(FakeScheduler::new()));
        let after = Duration::from_millis(5);

        let event_id_1 = timer.schedule_after(after, 8);
        let event_id_2 = timer.schedule_after(after, 9);
        let event_id_3 = timer.schedule_after(after, 10);
        timer.cancel_all();
        assert_eq!(timer.triggered(&event_id_1), None);
        assert_eq!(timer.triggered(&event_id_2), None);
        assert_eq!(timer.triggered(&event_id_3), None);
    }
}
