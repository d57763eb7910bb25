/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Process-wide publish/subscribe.
//!
//! Subscribers register an async handler and, optionally, a predicate. `publish`
//! snapshots the matching handlers before running them so a handler may subscribe or
//! unsubscribe without deadlocking the stream.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::trace;

use crate::common::FutureBox;
use crate::message::Pid;
use crate::traits::CourierMessage;

type EventHandler = Arc<dyn Fn(Arc<dyn CourierMessage>) -> FutureBox + Send + Sync + 'static>;
type EventPredicate = Arc<dyn Fn(&dyn CourierMessage) -> bool + Send + Sync + 'static>;

struct SubscriptionEntry {
    handler: EventHandler,
    predicate: Option<EventPredicate>,
}

/// Token returned by `subscribe`; pass it to [`EventStream::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
}

impl Subscription {
    /// The subscription's numeric id.
    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// A process-wide event bus.
#[derive(Clone, Default)]
pub struct EventStream {
    subscriptions: Arc<DashMap<u64, SubscriptionEntry>>,
    next_id: Arc<AtomicU64>,
    pid_subscriptions: Arc<DashMap<Pid, Vec<Subscription>>>,
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("subscriptions", &self.subscriptions.len())
            .field("tracked_pids", &self.pid_subscriptions.len())
            .finish()
    }
}

impl EventStream {
    /// Subscribes to every event.
    pub fn subscribe(
        &self,
        handler: impl Fn(Arc<dyn CourierMessage>) -> FutureBox + Send + Sync + 'static,
    ) -> Subscription {
        self.insert(Arc::new(handler), None)
    }

    /// Subscribes to events for which `predicate` returns `true`.
    pub fn subscribe_with_predicate(
        &self,
        handler: impl Fn(Arc<dyn CourierMessage>) -> FutureBox + Send + Sync + 'static,
        predicate: impl Fn(&dyn CourierMessage) -> bool + Send + Sync + 'static,
    ) -> Subscription {
        self.insert(Arc::new(handler), Some(Arc::new(predicate)))
    }

    /// Subscribes to events of type `E` only.
    pub fn subscribe_to<E: CourierMessage + Clone>(
        &self,
        handler: impl Fn(E) -> FutureBox + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_with_predicate(
            move |event| match (*event).as_any().downcast_ref::<E>() {
                Some(event) => handler(event.clone()),
                None => Box::pin(async {}),
            },
            |event| event.as_any().is::<E>(),
        )
    }

    fn insert(&self, handler: EventHandler, predicate: Option<EventPredicate>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.subscriptions
            .insert(id, SubscriptionEntry { handler, predicate });
        trace!(subscription = id, "event stream subscription added");
        Subscription { id }
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.subscriptions.remove(&subscription.id).is_some()
    }

    /// Publishes an event to every matching subscriber and waits for their handlers.
    pub async fn publish(&self, event: impl CourierMessage) {
        self.publish_arc(Arc::new(event)).await;
    }

    /// Publishes an already type-erased event.
    pub async fn publish_arc(&self, event: Arc<dyn CourierMessage>) {
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .predicate
                    .as_ref()
                    .map_or(true, |predicate| predicate(&*event))
            })
            .map(|entry| entry.value().handler.clone())
            .collect();
        trace!(subscribers = handlers.len(), event = ?event, "publishing event");
        join_all(handlers.iter().map(|handler| handler(event.clone()))).await;
    }

    /// Associates `subscription` with `pid` so it can be dropped through
    /// [`EventStream::remove_pid`].
    pub fn track_pid(&self, pid: Pid, subscription: Subscription) {
        self.pid_subscriptions
            .entry(pid)
            .or_default()
            .push(subscription);
    }

    /// Drops every subscription tracked for `pid`. Returns how many were removed.
    pub fn remove_pid(&self, pid: &Pid) -> usize {
        let Some((_, subscriptions)) = self.pid_subscriptions.remove(pid) else {
            return 0;
        };
        subscriptions
            .iter()
            .filter(|subscription| self.unsubscribe(subscription))
            .count()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// `true` when nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
