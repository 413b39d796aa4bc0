//! The topic registry: every topic this client knows about.
//!
//! Two separate namespaces live here:
//!
//! - **Announced** topics, keyed by server id, plus a name → id index so a
//!   lookup by name never scans the whole table.
//! - **Published** topics, keyed by name, each carrying the pubuid this
//!   client assigned.
//!
//! # Concurrency note
//!
//! `TopicRegistry` is plain data with no locking. The client keeps it
//! behind the single mutex that guards all protocol state.

use std::collections::HashMap;

use ntlink_protocol::{Properties, PubUid, TopicId, ValueType};

use crate::{PublishedTopic, Topic, TopicError};

/// What an [`TopicRegistry::announce`] call did.
#[derive(Debug, Clone, PartialEq)]
pub struct Announced {
    /// The topic as now stored.
    pub topic: Topic,
    /// `false` when an existing entry was updated in place.
    pub is_new: bool,
    /// The entry that held this name under another id, now removed.
    pub displaced: Option<Topic>,
}

/// Authoritative mapping of topic identity.
#[derive(Debug)]
pub struct TopicRegistry {
    announced: HashMap<TopicId, Topic>,
    by_name: HashMap<String, TopicId>,
    published: HashMap<String, PublishedTopic>,
    time_topic: Topic,
    next_pubuid: i64,
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicRegistry {
    /// Creates an empty registry. Only the reserved time topic is known.
    pub fn new() -> Self {
        Self {
            announced: HashMap::new(),
            by_name: HashMap::new(),
            published: HashMap::new(),
            time_topic: Topic::time(),
            next_pubuid: 1,
        }
    }

    // =====================================================================
    // Announced topics
    // =====================================================================

    /// Records a server announce.
    ///
    /// Re-announcing a known id updates that entry in place and never
    /// creates a second one. If the name previously belonged to a different
    /// id, that stale entry is removed and returned in
    /// [`Announced::displaced`] so a name maps to one topic only.
    ///
    /// When `pubuid` is `Some` and this client publishes `name`, the
    /// published topic adopts it. When it is `None` the locally-assigned
    /// pubuid stays authoritative.
    pub fn announce(
        &mut self,
        name: &str,
        id: TopicId,
        value_type: ValueType,
        properties: Properties,
        pubuid: Option<PubUid>,
    ) -> Announced {
        let mut displaced = None;
        if let Some(&old_id) = self.by_name.get(name) {
            if old_id != id {
                tracing::debug!(name, %old_id, %id, "name moved to a new id");
                displaced = self.announced.remove(&old_id);
            }
        }

        if let Some(published) = self.published.get_mut(name) {
            published.server_id = Some(id);
            if let Some(pubuid) = pubuid {
                if pubuid != published.pubuid {
                    tracing::debug!(name, old = %published.pubuid, new = %pubuid, "adopting announced pubuid");
                    published.pubuid = pubuid;
                    self.next_pubuid = self.next_pubuid.max(pubuid.0.saturating_add(1));
                }
            }
        }

        let is_new = match self.announced.get_mut(&id) {
            Some(existing) => {
                if existing.name != name {
                    self.by_name.remove(&existing.name);
                    existing.name = name.to_string();
                }
                existing.value_type = value_type;
                existing.properties = properties;
                if pubuid.is_some() {
                    existing.pubuid = pubuid;
                }
                false
            }
            None => {
                self.announced.insert(
                    id,
                    Topic {
                        id,
                        name: name.to_string(),
                        value_type,
                        properties,
                        pubuid,
                    },
                );
                true
            }
        };
        self.by_name.insert(name.to_string(), id);

        let topic = self.announced[&id].clone();
        tracing::debug!(%id, name, %value_type, is_new, "topic announced");
        Announced {
            topic,
            is_new,
            displaced,
        }
    }

    /// Records a server unannounce. Returns the removed topic.
    ///
    /// An id that is not present is logged and ignored: announce and
    /// unannounce can race across a reconnect.
    pub fn unannounce(&mut self, id: TopicId) -> Option<Topic> {
        let Some(topic) = self.announced.remove(&id) else {
            tracing::debug!(%id, "unannounce for unknown topic");
            return None;
        };
        if self.by_name.get(&topic.name) == Some(&id) {
            self.by_name.remove(&topic.name);
        }
        if let Some(published) = self.published.get_mut(&topic.name) {
            published.server_id = None;
        }
        tracing::debug!(%id, name = %topic.name, "topic unannounced");
        Some(topic)
    }

    /// Merges a server `properties` update into an announced topic.
    pub fn update_properties(&mut self, name: &str, update: &Properties) -> Option<&Topic> {
        let Some(id) = self.by_name.get(name).copied() else {
            tracing::debug!(name, "properties update for unknown topic");
            return None;
        };
        let topic = self.announced.get_mut(&id)?;
        topic.merge_properties(update);
        Some(topic)
    }

    /// Looks up an announced topic by id. The reserved time id resolves to
    /// the time topic.
    pub fn by_id(&self, id: TopicId) -> Option<&Topic> {
        if id.is_time() {
            return Some(&self.time_topic);
        }
        self.announced.get(&id)
    }

    /// Looks up an announced topic by name.
    pub fn by_name(&self, name: &str) -> Option<&Topic> {
        self.by_name.get(name).and_then(|id| self.announced.get(id))
    }

    /// Like [`by_name`](Self::by_name), but a missing name is an error.
    ///
    /// # Errors
    /// [`TopicError::UnknownTopic`] if the server has not announced `name`.
    pub fn require(&self, name: &str) -> Result<&Topic, TopicError> {
        self.by_name(name)
            .ok_or_else(|| TopicError::UnknownTopic(name.to_string()))
    }

    /// Iterates over announced topics (excluding the time topic).
    pub fn announced(&self) -> impl Iterator<Item = &Topic> {
        self.announced.values()
    }

    /// Number of announced topics.
    pub fn len(&self) -> usize {
        self.announced.len()
    }

    /// Returns `true` if nothing is announced.
    pub fn is_empty(&self) -> bool {
        self.announced.is_empty()
    }

    /// Forgets every announced topic. Published topics are kept (they are
    /// replayed on reconnect) but lose their server id.
    pub fn reset(&mut self) {
        let dropped = self.announced.len();
        self.announced.clear();
        self.by_name.clear();
        for published in self.published.values_mut() {
            published.server_id = None;
        }
        tracing::debug!(dropped, "topic registry reset");
    }

    // =====================================================================
    // Published topics
    // =====================================================================

    /// Registers a topic this client publishes, assigning a fresh pubuid.
    ///
    /// Publishing a name that is already held returns the existing entry
    /// with `is_new = false`.
    pub fn publish(&mut self, name: &str, value_type: ValueType) -> (PublishedTopic, bool) {
        if let Some(existing) = self.published.get(name) {
            return (existing.clone(), false);
        }
        let pubuid = PubUid(self.next_pubuid);
        self.next_pubuid = self.next_pubuid.saturating_add(1);
        let topic = PublishedTopic {
            name: name.to_string(),
            value_type,
            pubuid,
            persistent: false,
            retained: false,
            server_id: self.by_name.get(name).copied(),
        };
        self.published.insert(name.to_string(), topic.clone());
        tracing::debug!(name, %pubuid, %value_type, "topic published");
        (topic, true)
    }

    /// Drops a published topic. Returns it if it was held.
    pub fn unpublish(&mut self, name: &str) -> Option<PublishedTopic> {
        let removed = self.published.remove(name);
        if removed.is_some() {
            tracing::debug!(name, "topic unpublished");
        }
        removed
    }

    /// Updates the flags of a published topic.
    ///
    /// # Errors
    /// [`TopicError::NotPublished`] if the name is not held.
    pub fn set_properties(
        &mut self,
        name: &str,
        persistent: bool,
        retained: bool,
    ) -> Result<&PublishedTopic, TopicError> {
        let topic = self
            .published
            .get_mut(name)
            .ok_or_else(|| TopicError::NotPublished(name.to_string()))?;
        topic.persistent = persistent;
        topic.retained = retained;
        Ok(topic)
    }

    /// Looks up a published topic by name.
    pub fn published_topic(&self, name: &str) -> Option<&PublishedTopic> {
        self.published.get(name)
    }

    /// All published topics, ordered by pubuid (publication order).
    pub fn published(&self) -> Vec<&PublishedTopic> {
        let mut topics: Vec<_> = self.published.values().collect();
        topics.sort_by_key(|t| t.pubuid);
        topics
    }
}

// =========================================================================
// Tests
// =========================================================================
