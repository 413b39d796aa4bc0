//! Topic types: what the registry knows about each named channel.

use ntlink_protocol::{
    ClientMessage, Properties, PubUid, TopicId, Value, ValueType,
};
use serde_json::Value as Json;

use crate::TopicError;

/// A topic the server announced.
#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    /// Server-assigned id, stable for the lifetime of the announcement.
    pub id: TopicId,
    /// Full topic name, e.g. `/Signals/Rpm`.
    pub name: String,
    /// Declared value type.
    pub value_type: ValueType,
    /// Free-form metadata (`units`, `min`, `max`, `persistent`, ...).
    pub properties: Properties,
    /// Publisher id, when the announce answered one of our publishes.
    pub pubuid: Option<PubUid>,
}

impl Topic {
    /// The reserved time-sync topic.
    pub fn time() -> Self {
        Self {
            id: TopicId::TIME,
            name: String::new(),
            value_type: ValueType::Int,
            properties: Properties::new(),
            pubuid: None,
        }
    }

    /// Returns a string property, if present and a string.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Json::as_str)
    }

    /// Checks that `value` may be sent on this topic.
    ///
    /// # Errors
    /// [`TopicError::TypeMismatch`] if the type indices differ.
    pub fn check_value(&self, value: &Value) -> Result<(), TopicError> {
        check_fits(&self.name, self.value_type, value)
    }

    /// Merges a `properties` update. A JSON `null` deletes the key.
    pub(crate) fn merge_properties(&mut self, update: &Properties) {
        for (key, value) in update {
            if value.is_null() {
                self.properties.remove(key);
            } else {
                self.properties.insert(key.clone(), value.clone());
            }
        }
    }
}

/// A topic this client publishes.
///
/// Cloned out of the registry as the consumer's handle; the registry's own
/// copy stays authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedTopic {
    /// Full topic name. Published topics are keyed by name.
    pub name: String,
    /// Declared value type.
    pub value_type: ValueType,
    /// Publisher id. Locally assigned; replaced only when an announce
    /// explicitly carries a different one.
    pub pubuid: PubUid,
    /// Whether the server should persist the value across restarts.
    pub persistent: bool,
    /// Whether the server should keep the topic when no publisher remains.
    pub retained: bool,
    /// The server id, once the server announced this topic back.
    pub server_id: Option<TopicId>,
}

impl PublishedTopic {
    /// The `publish` message for this topic.
    pub fn publish_message(&self) -> ClientMessage {
        ClientMessage::Publish {
            name: self.name.clone(),
            value_type: self.value_type,
            pubuid: self.pubuid,
            properties: Properties::new(),
        }
    }

    /// The `setproperties` message carrying this topic's flags.
    pub fn set_properties_message(&self) -> ClientMessage {
        let mut update = Properties::new();
        update.insert("persistent".into(), Json::Bool(self.persistent));
        update.insert("retained".into(), Json::Bool(self.retained));
        ClientMessage::SetProperties {
            name: self.name.clone(),
            update,
        }
    }

    /// The `unpublish` message for this topic.
    pub fn unpublish_message(&self) -> ClientMessage {
        ClientMessage::Unpublish {
            name: self.name.clone(),
            pubuid: self.pubuid,
        }
    }

    /// Checks that `value` may be sent on this topic.
    ///
    /// # Errors
    /// [`TopicError::TypeMismatch`] if the type indices differ.
    pub fn check_value(&self, value: &Value) -> Result<(), TopicError> {
        check_fits(&self.name, self.value_type, value)
    }
}

fn check_fits(name: &str, expected: ValueType, value: &Value) -> Result<(), TopicError> {
    if value.fits(expected) {
        return Ok(());
    }
    Err(TopicError::TypeMismatch {
        name: name.to_string(),
        expected,
        found: value.canonical_type(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn published() -> PublishedTopic {
        PublishedTopic {
            name: "/Calibrations/Shooter/desValue".into(),
            value_type: ValueType::Double,
            pubuid: PubUid(3),
            persistent: true,
            retained: false,
            server_id: None,
        }
    }

    #[test]
    fn test_set_properties_message_carries_flags() {
        let msg = serde_json::to_value(published().set_properties_message()).unwrap();
        assert_eq!(msg["params"]["update"], json!({"persistent": true, "retained": false}));
    }

    #[test]
    fn test_publish_message_uses_pubuid() {
        let ClientMessage::Publish { pubuid, value_type, .. } = published().publish_message()
        else {
            panic!("expected publish");
        };
        assert_eq!(pubuid, PubUid(3));
        assert_eq!(value_type, ValueType::Double);
    }

    #[test]
    fn test_check_value_type_mismatch() {
        let err = published().check_value(&Value::from("x")).unwrap_err();
        assert!(matches!(
            err,
            TopicError::TypeMismatch {
                expected: ValueType::Double,
                found: ValueType::String,
                ..
            }
        ));
    }

    #[test]
    fn test_merge_properties_null_deletes() {
        let mut topic = Topic::time();
        topic.properties.insert("units".into(), json!("RPM"));
        topic.properties.insert("min".into(), json!(0));

        let mut update = Properties::new();
        update.insert("units".into(), Json::Null);
        update.insert("max".into(), json!(6000));
        topic.merge_properties(&update);

        assert_eq!(topic.property_str("units"), None);
        assert_eq!(topic.properties["min"], 0);
        assert_eq!(topic.properties["max"], 6000);
    }
}
