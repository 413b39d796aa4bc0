//! Held subscriptions and the manager that tracks them.
//!
//! The manager is generic over the listener type `L` so this crate stays
//! free of any callback trait; the client facade plugs in its own
//! `Arc<dyn TopicListener>`.

use std::collections::BTreeMap;

use ntlink_protocol::{ClientMessage, SubUid, SubscribeOptions};

/// One subscription the client holds.
#[derive(Debug, Clone)]
pub struct Subscription<L> {
    /// Client-assigned id, unique for the lifetime of the client.
    pub uid: SubUid,
    /// Topic names or prefixes, depending on `options.prefix`.
    pub patterns: Vec<String>,
    /// Cadence and matching options.
    pub options: SubscribeOptions,
    /// Optional per-subscription listener.
    pub listener: Option<L>,
}

impl<L> Subscription<L> {
    /// Returns `true` if `name` is covered by one of the patterns.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| {
            if self.options.prefix {
                name.starts_with(pattern.as_str())
            } else {
                name == pattern
            }
        })
    }

    /// Topics-only subscriptions never receive values.
    pub fn wants_values(&self) -> bool {
        !self.options.topics_only
    }

    /// The `subscribe` message for this subscription.
    pub fn subscribe_message(&self) -> ClientMessage {
        ClientMessage::Subscribe {
            topics: self.patterns.clone(),
            subuid: self.uid,
            options: self.options,
        }
    }
}

/// Every subscription the client holds, ordered by uid.
///
/// Ordering by uid means replay after a reconnect reissues subscriptions in
/// the order the consumer created them.
#[derive(Debug)]
pub struct SubscriptionManager<L> {
    subscriptions: BTreeMap<SubUid, Subscription<L>>,
    next_uid: i64,
}

impl<L> Default for SubscriptionManager<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> SubscriptionManager<L> {
    pub fn new() -> Self {
        Self {
            subscriptions: BTreeMap::new(),
            next_uid: 1,
        }
    }

    /// Registers a subscription under a fresh uid and returns it.
    pub fn subscribe(
        &mut self,
        patterns: Vec<String>,
        options: SubscribeOptions,
        listener: Option<L>,
    ) -> &Subscription<L> {
        let uid = SubUid(self.next_uid);
        self.next_uid += 1;
        tracing::debug!(%uid, ?patterns, topics_only = options.topics_only, "subscription added");
        self.subscriptions.entry(uid).or_insert(Subscription {
            uid,
            patterns,
            options,
            listener,
        })
    }

    /// Drops a subscription. Returns `true` if it was held.
    pub fn unsubscribe(&mut self, uid: SubUid) -> bool {
        let held = self.subscriptions.remove(&uid).is_some();
        if held {
            tracing::debug!(%uid, "subscription removed");
        }
        held
    }

    /// Drops every subscription and returns their uids in order.
    pub fn clear(&mut self) -> Vec<SubUid> {
        let uids: Vec<SubUid> = self.subscriptions.keys().copied().collect();
        self.subscriptions.clear();
        uids
    }

    /// Looks up a subscription.
    pub fn get(&self, uid: SubUid) -> Option<&Subscription<L>> {
        self.subscriptions.get(&uid)
    }

    /// Subscriptions whose patterns cover `name`.
    pub fn matching<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Subscription<L>> {
        self.subscriptions.values().filter(move |s| s.matches(name))
    }

    /// All subscriptions in uid order.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription<L>> {
        self.subscriptions.values()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
