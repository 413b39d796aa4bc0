//! The sans-IO client state machine.
//!
//! [`ClientCore`] owns every piece of protocol state: the link state, the
//! topic registry, the subscriptions, the clock estimate and an outbox of
//! frames waiting to be sent. It never touches the network. The driver
//! behind [`Client`](crate::Client) feeds it transport events and drains
//! its outbox; tests drive it directly.
//!
//! Methods that produce listener callbacks return them as [`Dispatch`]
//! values instead of calling listeners. The caller delivers them once it
//! has released whatever lock guards the core.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use ntlink_clock::{ClockSync, LocalClock, SystemClock};
use ntlink_protocol::{
    ClientMessage, ProtocolError, ServerMessage, SubUid, SubscribeOptions, TopicId, Value,
    ValueRecord, ValueType, decode_control, decode_records, encode_control, encode_records,
};
use ntlink_topics::{PublishedTopic, SubscriptionManager, Topic, TopicError, TopicRegistry};
use ntlink_transport::{Frame, LinkState};
use tracing::{debug, info, trace, warn};

use crate::{NtError, SharedListener, TopicListener};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something a listener should hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Announce(Topic),
    Unannounce(Topic),
    Value {
        topic: Topic,
        timestamp_us: i64,
        value: Value,
    },
    Connect,
    Disconnect,
}

impl Event {
    /// The topic this event is about, if any.
    pub fn topic(&self) -> Option<&Topic> {
        match self {
            Event::Announce(topic) | Event::Unannounce(topic) => Some(topic),
            Event::Value { topic, .. } => Some(topic),
            Event::Connect | Event::Disconnect => None,
        }
    }
}

/// An event addressed to one listener.
pub struct Dispatch {
    pub listener: SharedListener,
    pub event: Event,
}

impl Dispatch {
    /// Calls the listener method matching the event.
    pub fn deliver(&self) {
        match &self.event {
            Event::Announce(topic) => self.listener.on_announce(topic),
            Event::Unannounce(topic) => self.listener.on_unannounce(topic),
            Event::Value {
                topic,
                timestamp_us,
                value,
            } => self.listener.on_value(topic, *timestamp_us, value),
            Event::Connect => self.listener.on_connect(),
            Event::Disconnect => self.listener.on_disconnect(),
        }
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Sample targets
// ---------------------------------------------------------------------------

/// Where [`ClientCore::add_sample`] sends a value.
#[derive(Debug, Clone, Copy)]
pub enum SampleTarget<'a> {
    /// A topic this client publishes.
    Published(&'a PublishedTopic),
    /// A topic the server announced, looked up by name.
    Name(&'a str),
}

impl<'a> From<&'a PublishedTopic> for SampleTarget<'a> {
    fn from(topic: &'a PublishedTopic) -> Self {
        SampleTarget::Published(topic)
    }
}

impl<'a> From<&'a str> for SampleTarget<'a> {
    fn from(name: &'a str) -> Self {
        SampleTarget::Name(name)
    }
}

impl<'a> From<&'a String> for SampleTarget<'a> {
    fn from(name: &'a String) -> Self {
        SampleTarget::Name(name)
    }
}

// ---------------------------------------------------------------------------
// ClientCore
// ---------------------------------------------------------------------------

/// All client state, with no I/O.
pub struct ClientCore {
    link: LinkState,
    registry: TopicRegistry,
    subscriptions: SubscriptionManager<SharedListener>,
    clock: ClockSync,
    local_clock: Arc<dyn LocalClock>,
    listener: Option<SharedListener>,
    outbox: VecDeque<Frame>,
}

impl Default for ClientCore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCore")
            .field("link", &self.link)
            .field("announced", &self.registry.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("offset_us", &self.clock.offset_us())
            .field("outbox", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl ClientCore {
    /// Creates a disconnected core reading local time from `local_clock`.
    pub fn new(local_clock: Arc<dyn LocalClock>) -> Self {
        Self {
            link: LinkState::default(),
            registry: TopicRegistry::new(),
            subscriptions: SubscriptionManager::new(),
            clock: ClockSync::new(),
            local_clock,
            listener: None,
            outbox: VecDeque::new(),
        }
    }

    /// Sets the client-wide listener, which hears every event.
    pub fn set_listener(&mut self, listener: Option<SharedListener>) {
        self.listener = listener;
    }

    // =====================================================================
    // Link lifecycle
    // =====================================================================

    /// A connection attempt is starting.
    ///
    /// # Errors
    /// [`TransportError::InvalidTransition`] unless disconnected.
    ///
    /// [`TransportError::InvalidTransition`]: ntlink_transport::TransportError::InvalidTransition
    pub fn begin_connect(&mut self) -> Result<(), NtError> {
        self.link.begin_connect()?;
        Ok(())
    }

    /// The connection is open.
    ///
    /// Queues one control frame replaying held state (every publish, then
    /// every `setproperties`, then every subscribe) followed by a time
    /// probe, and returns the `on_connect` dispatch.
    ///
    /// # Errors
    /// An invalid transition or an encoding failure. The driver treats
    /// either as a lost connection.
    pub fn on_open(&mut self) -> Result<Vec<Dispatch>, NtError> {
        self.link.activate()?;
        self.outbox.clear();

        let published = self.registry.published();
        let mut replay: Vec<ClientMessage> = Vec::new();
        replay.extend(published.iter().map(|t| t.publish_message()));
        replay.extend(published.iter().map(|t| t.set_properties_message()));
        replay.extend(self.subscriptions.iter().map(|s| s.subscribe_message()));
        info!(
            publishes = published.len(),
            subscriptions = self.subscriptions.len(),
            "link active, replaying held state"
        );

        if !replay.is_empty() {
            self.queue_control(&replay)?;
        }
        self.queue_time_probe()?;
        Ok(self.global_dispatch(Event::Connect))
    }

    /// The connection closed, failed, or never opened.
    ///
    /// Forgets announced topics and anything still queued. Returns the
    /// `on_disconnect` dispatch only when an active link was lost, so
    /// repeated calls notify once.
    pub fn on_close(&mut self) -> Vec<Dispatch> {
        let previous = self.link.drop_link();
        self.outbox.clear();
        self.registry.reset();
        if previous.is_active() {
            info!("link lost");
            self.global_dispatch(Event::Disconnect)
        } else {
            Vec::new()
        }
    }

    /// Handles one incoming frame.
    pub fn on_frame(&mut self, frame: Frame) -> Vec<Dispatch> {
        if !self.link.is_active() {
            debug!(binary = frame.is_binary(), "frame while not active, dropping");
            return Vec::new();
        }
        match frame {
            Frame::Text(text) => self.on_control(&text),
            Frame::Binary(data) => self.on_values(&data),
        }
    }

    /// Queues a time probe if the link is active. Returns whether it did.
    ///
    /// # Errors
    /// Encoding failure.
    pub fn poll_time_sync(&mut self) -> Result<bool, NtError> {
        if !self.link.is_active() {
            return Ok(false);
        }
        self.queue_time_probe()?;
        Ok(true)
    }

    /// Drains every frame waiting to be sent, oldest first.
    pub fn take_outbound(&mut self) -> Vec<Frame> {
        self.outbox.drain(..).collect()
    }

    // =====================================================================
    // Publishing
    // =====================================================================

    /// Starts publishing `name`.
    ///
    /// Nothing is sent while disconnected; the topic is announced to the
    /// server on the next activation.
    ///
    /// # Errors
    /// [`TopicError::TypeMismatch`] if `name` is already published with a
    /// different type.
    pub fn publish_new_topic(
        &mut self,
        name: &str,
        value_type: ValueType,
    ) -> Result<PublishedTopic, NtError> {
        let (topic, is_new) = self.registry.publish(name, value_type);
        if !is_new {
            if topic.value_type != value_type {
                return Err(TopicError::TypeMismatch {
                    name: name.to_string(),
                    expected: topic.value_type,
                    found: value_type,
                }
                .into());
            }
            return Ok(topic);
        }
        if self.link.is_active() {
            self.queue_control(&[topic.publish_message(), topic.set_properties_message()])?;
        }
        Ok(topic)
    }

    /// Stops publishing. The local entry is always removed; the server is
    /// told only while connected. Returns whether the topic was held.
    ///
    /// # Errors
    /// Encoding failure.
    pub fn unpublish_topic(&mut self, handle: &PublishedTopic) -> Result<bool, NtError> {
        let Some(removed) = self.registry.unpublish(&handle.name) else {
            return Ok(false);
        };
        if self.link.is_active() {
            self.queue_control(&[removed.unpublish_message()])?;
        }
        Ok(true)
    }

    /// Sets the persistent and retained flags of a published topic.
    ///
    /// # Errors
    /// [`TopicError::NotPublished`] if the topic is not held.
    pub fn set_properties(
        &mut self,
        handle: &PublishedTopic,
        persistent: bool,
        retained: bool,
    ) -> Result<PublishedTopic, NtError> {
        let topic = self
            .registry
            .set_properties(&handle.name, persistent, retained)?
            .clone();
        if self.link.is_active() {
            self.queue_control(&[topic.set_properties_message()])?;
        }
        Ok(topic)
    }

    /// Sends one value.
    ///
    /// A published-topic target is tagged with its pubuid. A name target
    /// must be a topic the server announced; it is tagged with this
    /// client's pubuid if the client publishes that name, else with the
    /// announce's pubuid, else with the server id. The timestamp defaults
    /// to the current server time. While disconnected the sample is
    /// validated and then dropped.
    ///
    /// # Errors
    /// - [`TopicError::UnknownTopic`] for a name the server has not announced.
    /// - [`TopicError::NotPublished`] for a handle that was unpublished.
    /// - [`TopicError::TypeMismatch`] if `value` does not fit the topic type.
    pub fn add_sample<'a>(
        &mut self,
        target: impl Into<SampleTarget<'a>>,
        timestamp_us: Option<i64>,
        value: Value,
    ) -> Result<(), NtError> {
        let (name, id) = match target.into() {
            SampleTarget::Published(handle) => {
                let held = self
                    .registry
                    .published_topic(&handle.name)
                    .ok_or_else(|| TopicError::NotPublished(handle.name.clone()))?;
                held.check_value(&value)?;
                (handle.name.as_str(), TopicId(held.pubuid.0))
            }
            SampleTarget::Name(name) => {
                let topic = self.registry.require(name)?;
                topic.check_value(&value)?;
                let pubuid = self
                    .registry
                    .published_topic(name)
                    .map(|p| p.pubuid)
                    .or(topic.pubuid);
                (name, pubuid.map_or(topic.id, |p| TopicId(p.0)))
            }
        };

        if !self.link.is_active() {
            trace!(name, "not connected, dropping sample");
            return Ok(());
        }
        let timestamp_us = timestamp_us.unwrap_or_else(|| self.server_time_us());
        trace!(name, %id, timestamp_us, "sample");
        let frame = encode_records(&[ValueRecord::new(id, timestamp_us, value)])?;
        self.outbox.push_back(Frame::Binary(frame));
        Ok(())
    }

    // =====================================================================
    // Subscriptions
    // =====================================================================

    /// Adds a subscription, optionally with its own listener.
    ///
    /// # Errors
    /// Encoding failure.
    pub fn subscribe(
        &mut self,
        patterns: Vec<String>,
        options: SubscribeOptions,
        listener: Option<SharedListener>,
    ) -> Result<SubUid, NtError> {
        let sub = self.subscriptions.subscribe(patterns, options, listener);
        let (uid, message) = (sub.uid, sub.subscribe_message());
        if self.link.is_active() {
            self.queue_control(&[message])?;
        }
        Ok(uid)
    }

    /// Drops a subscription. Returns whether it was held.
    ///
    /// # Errors
    /// Encoding failure.
    pub fn unsubscribe(&mut self, uid: SubUid) -> Result<bool, NtError> {
        if !self.subscriptions.unsubscribe(uid) {
            return Ok(false);
        }
        if self.link.is_active() {
            self.queue_control(&[ClientMessage::Unsubscribe { subuid: uid }])?;
        }
        Ok(true)
    }

    /// Drops every subscription. Returns how many there were.
    ///
    /// # Errors
    /// Encoding failure.
    pub fn clear_all_subscriptions(&mut self) -> Result<usize, NtError> {
        let uids = self.subscriptions.clear();
        if self.link.is_active() && !uids.is_empty() {
            let batch: Vec<_> = uids
                .iter()
                .map(|&subuid| ClientMessage::Unsubscribe { subuid })
                .collect();
            self.queue_control(&batch)?;
        }
        Ok(uids.len())
    }

    // =====================================================================
    // Queries
    // =====================================================================

    /// Estimated current server time in microseconds.
    pub fn server_time_us(&self) -> i64 {
        self.clock.server_time_us(self.local_clock.now_micros())
    }

    /// Current `server - local` clock offset estimate.
    pub fn clock_offset_us(&self) -> i64 {
        self.clock.offset_us()
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_active()
    }

    /// Announced topics, ordered by name.
    pub fn announced_topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.registry.announced().cloned().collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        topics
    }

    /// Topics this client publishes, in publication order.
    pub fn published_topics(&self) -> Vec<PublishedTopic> {
        self.registry.published().into_iter().cloned().collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    // =====================================================================
    // Incoming traffic
    // =====================================================================

    fn on_control(&mut self, text: &str) -> Vec<Dispatch> {
        let messages = match decode_control(text) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "dropping control frame");
                return Vec::new();
            }
        };

        let mut dispatches = Vec::new();
        for message in messages {
            match message {
                ServerMessage::Announce {
                    name,
                    id,
                    value_type,
                    pubuid,
                    properties,
                } => {
                    if id.is_time() {
                        warn!(%name, "announce uses the reserved time id, ignoring");
                        continue;
                    }
                    let announced =
                        self.registry
                            .announce(&name, id, value_type, properties, pubuid);
                    if let Some(stale) = announced.displaced {
                        self.fan_out(&mut dispatches, Event::Unannounce(stale));
                    }
                    self.fan_out(&mut dispatches, Event::Announce(announced.topic));
                }
                ServerMessage::Unannounce { id, .. } => {
                    if let Some(topic) = self.registry.unannounce(id) {
                        self.fan_out(&mut dispatches, Event::Unannounce(topic));
                    }
                }
                ServerMessage::Properties { name, update, ack } => {
                    if self.registry.update_properties(&name, &update).is_some() {
                        debug!(%name, ?ack, keys = update.len(), "topic properties updated");
                    }
                }
            }
        }
        dispatches
    }

    fn on_values(&mut self, data: &[u8]) -> Vec<Dispatch> {
        let records = match decode_records(data) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, len = data.len(), "dropping value frame");
                return Vec::new();
            }
        };

        let mut dispatches = Vec::new();
        for record in records {
            if record.id.is_time() {
                self.on_time_reply(&record);
                continue;
            }
            let Some(topic) = self.registry.by_id(record.id) else {
                debug!(id = %record.id, "value for unknown topic, skipping");
                continue;
            };
            trace!(name = %topic.name, timestamp_us = record.timestamp_us, "value");
            let event = Event::Value {
                topic: topic.clone(),
                timestamp_us: record.timestamp_us,
                value: record.value,
            };
            self.fan_out(&mut dispatches, event);
        }
        dispatches
    }

    fn on_time_reply(&mut self, record: &ValueRecord) {
        let Value::Int(echoed_send) = record.value else {
            warn!(value = ?record.value, "time reply is not an int, ignoring");
            return;
        };
        let recv = self.local_clock.now_micros();
        self.clock.on_reply(record.timestamp_us, echoed_send, recv);
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    /// Addresses a topic event to the client-wide listener and to every
    /// matching subscription listener. Values skip topics-only
    /// subscriptions.
    fn fan_out(&self, out: &mut Vec<Dispatch>, event: Event) {
        let Some(topic) = event.topic() else {
            return;
        };
        let is_value = matches!(event, Event::Value { .. });
        let targets = self.listener.iter().cloned().chain(
            self.subscriptions
                .matching(&topic.name)
                .filter(|s| !is_value || s.wants_values())
                .filter_map(|s| s.listener.clone()),
        );
        out.extend(targets.map(|listener| Dispatch {
            listener,
            event: event.clone(),
        }));
    }

    fn global_dispatch(&self, event: Event) -> Vec<Dispatch> {
        self.listener
            .iter()
            .map(|listener| Dispatch {
                listener: Arc::clone(listener),
                event: event.clone(),
            })
            .collect()
    }

    fn queue_control(&mut self, messages: &[ClientMessage]) -> Result<(), ProtocolError> {
        let text = encode_control(messages)?;
        debug!(
            count = messages.len(),
            first = ?messages.first().map(ClientMessage::method),
            "control frame queued"
        );
        self.outbox.push_back(Frame::Text(text));
        Ok(())
    }

    fn queue_time_probe(&mut self) -> Result<(), ProtocolError> {
        let send = self.clock.probe(self.local_clock.now_micros());
        let frame = encode_records(&[ValueRecord::new(TopicId::TIME, 0, Value::Int(send))])?;
        self.outbox.push_back(Frame::Binary(frame));
        Ok(())
    }
}
