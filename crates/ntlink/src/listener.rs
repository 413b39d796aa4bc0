//! Consumer callbacks.

use std::sync::Arc;

use ntlink_protocol::Value;
use ntlink_topics::Topic;

/// Receives topic and connection events from a client.
///
/// Every method has an empty default, so an implementor overrides only
/// what it cares about. Callbacks run on the client's driver task after
/// the client's internal lock is released; a listener may call back into
/// the client. Callbacks should return quickly and should not panic. A
/// panic is caught and logged, and that event is lost for that listener.
///
/// Which events reach which listener:
///
/// | Listener | announce / unannounce | values | connect / disconnect |
/// |---|---|---|---|
/// | client-wide | all topics | all topics | yes |
/// | per-subscription | matching topics | matching topics, unless topics-only | no |
pub trait TopicListener: Send + Sync + 'static {
    /// A topic was announced.
    fn on_announce(&self, _topic: &Topic) {}

    /// A topic was unannounced.
    fn on_unannounce(&self, _topic: &Topic) {}

    /// A value arrived for `topic`.
    fn on_value(&self, _topic: &Topic, _timestamp_us: i64, _value: &Value) {}

    /// The link became active and held state was replayed.
    fn on_connect(&self) {}

    /// An active link was lost. Called once per lost link.
    fn on_disconnect(&self) {}
}

/// A listener shared between the client and its owner.
pub type SharedListener = Arc<dyn TopicListener>;

impl<L: TopicListener + ?Sized> TopicListener for Arc<L> {
    fn on_announce(&self, topic: &Topic) {
        (**self).on_announce(topic);
    }

    fn on_unannounce(&self, topic: &Topic) {
        (**self).on_unannounce(topic);
    }

    fn on_value(&self, topic: &Topic, timestamp_us: i64, value: &Value) {
        (**self).on_value(topic, timestamp_us, value);
    }

    fn on_connect(&self) {
        (**self).on_connect();
    }

    fn on_disconnect(&self) {
        (**self).on_disconnect();
    }
}
