// Copyright (c) 2022 RBB S.r.l
// opensource@mintlayer.org
// SPDX-License-Identifier: MIT
// Licensed under the MIT License;
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://github.com/mintlayer/mintlayer-core/blob/master/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

pub type EventHandler<E> = Arc<dyn Fn(E) + Send + Sync>;

/// A list of subscribers that events are broadcast to.
///
/// Handlers are invoked synchronously, in subscription order, on the thread
/// that calls [EventsController::broadcast]. Handlers must not call back into
/// the object that emitted the event.
pub struct EventsController<E> {
    event_subscribers: Vec<EventHandler<E>>,
}

impl<E: Clone + Send + Sync + 'static> EventsController<E> {
    pub fn new() -> Self {
        Self {
            event_subscribers: Vec::new(),
        }
    }

    pub fn subscribers(&self) -> &Vec<EventHandler<E>> {
        &self.event_subscribers
    }

    pub fn subscribe_to_events(&mut self, handler: EventHandler<E>) {
        self.event_subscribers.push(handler)
    }

    pub fn broadcast(&self, event: E) {
        for handler in &self.event_subscribers {
            handler(event.clone())
        }
    }
}

impl<E: Clone + Send + Sync + 'static> Default for EventsController<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn broadcast_order_follows_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut events = EventsController::<u32>::new();

        for tag in 0..3 {
            let seen = Arc::clone(&seen);
            events.subscribe_to_events(Arc::new(move |e| {
                seen.lock().expect("lock poisoned").push((tag, e))
            }));
        }

        events.broadcast(7);
        events.broadcast(8);

        let seen = seen.lock().expect("lock poisoned");
        assert_eq!(*seen, vec![(0, 7), (1, 7), (2, 7), (0, 8), (1, 8), (2, 8)]);
    }
}
