//! Control-plane messages.
//!
//! Control frames are JSON arrays of `{ "method": ..., "params": { ... } }`
//! objects. `#[serde(tag = "method", content = "params")]` produces exactly
//! that "adjacently tagged" shape, and `rename_all = "lowercase"` gives the
//! wire method names (`setproperties`, `topicsonly`, ...).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::{Codec, JsonCodec, ProtocolError, PubUid, SubUid, TopicId, ValueType};

/// Free-form topic properties (`persistent`, `retained`, `units`, ...).
pub type Properties = Map<String, Json>;

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Delivery options for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubscribeOptions {
    /// Minimum seconds between value updates for one topic.
    pub periodic: f64,
    /// Deliver every value update, not just the latest per period.
    pub all: bool,
    /// Deliver announce/unannounce only, never values.
    #[serde(rename = "topicsonly")]
    pub topics_only: bool,
    /// Treat patterns as name prefixes instead of exact names.
    pub prefix: bool,
}

impl SubscribeOptions {
    /// The server's default periodic rate, in seconds.
    pub const DEFAULT_PERIODIC: f64 = 0.1;

    /// Announcements only. The rate is irrelevant; a 1 s period keeps the
    /// server's bookkeeping cheap.
    pub fn topics_only() -> Self {
        Self {
            periodic: 1.0,
            all: false,
            topics_only: true,
            prefix: true,
        }
    }

    /// The latest value, no more often than every `rate_secs` seconds.
    pub fn periodic(rate_secs: f64) -> Self {
        Self {
            periodic: rate_secs,
            all: false,
            topics_only: false,
            prefix: true,
        }
    }

    /// Every value update.
    pub fn all_samples() -> Self {
        Self {
            periodic: Self::DEFAULT_PERIODIC,
            all: true,
            topics_only: false,
            prefix: true,
        }
    }

    /// Returns a copy with exact-name matching instead of prefix matching.
    pub fn exact(mut self) -> Self {
        self.prefix = false;
        self
    }
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self::periodic(Self::DEFAULT_PERIODIC)
    }
}

/// Messages the client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "lowercase")]
pub enum ClientMessage {
    /// "I will publish values on this topic under this pubuid."
    Publish {
        name: String,
        #[serde(rename = "type")]
        value_type: ValueType,
        pubuid: PubUid,
        #[serde(default)]
        properties: Properties,
    },

    /// "I no longer publish this topic."
    Unpublish { name: String, pubuid: PubUid },

    /// "Change these properties of this topic."
    SetProperties { name: String, update: Properties },

    /// "Send me announcements (and maybe values) for these patterns."
    Subscribe {
        topics: Vec<String>,
        subuid: SubUid,
        options: SubscribeOptions,
    },

    /// "Cancel that subscription."
    Unsubscribe { subuid: SubUid },
}

impl ClientMessage {
    /// The wire method name, for logging.
    pub fn method(&self) -> &'static str {
        match self {
            ClientMessage::Publish { .. } => "publish",
            ClientMessage::Unpublish { .. } => "unpublish",
            ClientMessage::SetProperties { .. } => "setproperties",
            ClientMessage::Subscribe { .. } => "subscribe",
            ClientMessage::Unsubscribe { .. } => "unsubscribe",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "lowercase")]
pub enum ServerMessage {
    /// "This topic exists." `pubuid` is present when the announce answers
    /// this client's own `publish`.
    Announce {
        name: String,
        id: TopicId,
        #[serde(rename = "type")]
        value_type: ValueType,
        #[serde(default)]
        pubuid: Option<PubUid>,
        #[serde(default)]
        properties: Properties,
    },

    /// "This topic no longer exists."
    Unannounce {
        #[serde(default)]
        name: String,
        id: TopicId,
    },

    /// "These properties of this topic changed."
    Properties {
        name: String,
        #[serde(default)]
        update: Properties,
        #[serde(default)]
        ack: Option<bool>,
    },
}

// ---------------------------------------------------------------------------
// Batch encoding
// ---------------------------------------------------------------------------

/// Encodes a batch of client messages as one text frame.
///
/// # Errors
/// Returns [`ProtocolError::JsonEncode`] if serialization fails.
pub fn encode_control(messages: &[ClientMessage]) -> Result<String, ProtocolError> {
    let bytes = JsonCodec.encode(&messages)?;
    String::from_utf8(bytes).map_err(|e| ProtocolError::InvalidMessage(e.to_string()))
}

/// Decodes a text frame into server messages.
///
/// Each array entry is checked on its own: it must be an object with a
/// string `method` and an object `params`, and must parse as a known
/// [`ServerMessage`]. Entries that fail are logged and skipped; the rest of
/// the batch is still returned.
///
/// # Errors
/// Returns an error only if the frame is not a JSON array at all.
pub fn decode_control(text: &str) -> Result<Vec<ServerMessage>, ProtocolError> {
    let batch: Json = JsonCodec.decode(text.as_bytes())?;
    let Json::Array(entries) = batch else {
        return Err(ProtocolError::InvalidMessage(
            "control frame is not a JSON array".into(),
        ));
    };

    let mut messages = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        if let Err(reason) = check_shape(&entry) {
            tracing::warn!(index, reason, "skipping malformed control message");
            continue;
        }
        match serde_json::from_value::<ServerMessage>(entry) {
            Ok(msg) => messages.push(msg),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping unrecognized control message");
            }
        }
    }
    Ok(messages)
}

fn check_shape(entry: &Json) -> Result<(), &'static str> {
    let Some(obj) = entry.as_object() else {
        return Err("not an object");
    };
    if !obj.get("method").is_some_and(Json::is_string) {
        return Err("missing or non-string method");
    }
    if !obj.get("params").is_some_and(Json::is_object) {
        return Err("missing or non-object params");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // =====================================================================
    // Client messages: one test per method to pin the JSON shape
    // =====================================================================

    #[test]
    fn test_publish_json_format() {
        let msg = ClientMessage::Publish {
            name: "/Calibrations/Shooter/desValue".into(),
            value_type: ValueType::Double,
            pubuid: PubUid(1),
            properties: Properties::new(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({
                "method": "publish",
                "params": {
                    "name": "/Calibrations/Shooter/desValue",
                    "type": "double",
                    "pubuid": 1,
                    "properties": {}
                }
            })
        );
    }

    #[test]
    fn test_unpublish_json_format() {
        let msg = ClientMessage::Unpublish {
            name: "/a".into(),
            pubuid: PubUid(4),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["method"], "unpublish");
        assert_eq!(json["params"]["pubuid"], 4);
    }

    #[test]
    fn test_setproperties_method_is_lowercase() {
        let mut update = Properties::new();
        update.insert("persistent".into(), json!(true));
        update.insert("retained".into(), json!(false));
        let msg = ClientMessage::SetProperties {
            name: "/a".into(),
            update,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["method"], "setproperties");
        assert_eq!(json["params"]["update"]["persistent"], true);
        assert_eq!(json["params"]["update"]["retained"], false);
    }

    #[test]
    fn test_subscribe_json_format() {
        let msg = ClientMessage::Subscribe {
            topics: vec!["/Calibrations/".into()],
            subuid: SubUid(2),
            options: SubscribeOptions::topics_only(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({
                "method": "subscribe",
                "params": {
                    "topics": ["/Calibrations/"],
                    "subuid": 2,
                    "options": {
                        "periodic": 1.0,
                        "all": false,
                        "topicsonly": true,
                        "prefix": true
                    }
                }
            })
        );
    }

    #[test]
    fn test_unsubscribe_json_format() {
        let json =
            serde_json::to_value(ClientMessage::Unsubscribe { subuid: SubUid(9) }).unwrap();
        assert_eq!(json, json!({"method": "unsubscribe", "params": {"subuid": 9}}));
    }

    #[test]
    fn test_subscribe_options_constructors() {
        assert!(SubscribeOptions::all_samples().all);
        assert!(!SubscribeOptions::all_samples().topics_only);
        assert_eq!(SubscribeOptions::periodic(0.5).periodic, 0.5);
        assert!(!SubscribeOptions::periodic(0.5).exact().prefix);
    }

    #[test]
    fn test_encode_control_produces_array() {
        let text = encode_control(&[
            ClientMessage::Unsubscribe { subuid: SubUid(1) },
            ClientMessage::Unsubscribe { subuid: SubUid(2) },
        ])
        .unwrap();
        let json: Json = serde_json::from_str(&text).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(2));
    }

    // =====================================================================
    // Server messages
    // =====================================================================

    #[test]
    fn test_decode_announce_with_properties() {
        let text = r#"[{"method":"announce","params":{
            "name":"/Signals/Rpm","id":7,"type":"double",
            "properties":{"units":"RPM"}}}]"#;
        let msgs = decode_control(text).unwrap();
        assert_eq!(msgs.len(), 1);
        let ServerMessage::Announce {
            name,
            id,
            value_type,
            pubuid,
            properties,
        } = &msgs[0]
        else {
            panic!("expected announce, got {:?}", msgs[0]);
        };
        assert_eq!(name, "/Signals/Rpm");
        assert_eq!(*id, TopicId(7));
        assert_eq!(*value_type, ValueType::Double);
        assert_eq!(*pubuid, None);
        assert_eq!(properties["units"], "RPM");
    }

    #[test]
    fn test_decode_unannounce_and_properties() {
        let text = r#"[
            {"method":"unannounce","params":{"name":"/a","id":3}},
            {"method":"properties","params":{"name":"/b","update":{"persistent":true},"ack":true}}
        ]"#;
        let msgs = decode_control(text).unwrap();
        assert_eq!(
            msgs[0],
            ServerMessage::Unannounce {
                name: "/a".into(),
                id: TopicId(3)
            }
        );
        assert!(matches!(
            &msgs[1],
            ServerMessage::Properties { name, ack: Some(true), .. } if name == "/b"
        ));
    }

    #[test]
    fn test_decode_skips_malformed_entries_without_aborting_batch() {
        let text = r#"[
            42,
            {"params":{"id":1}},
            {"method":7,"params":{}},
            {"method":"announce","params":"nope"},
            {"method":"announce","params":{"name":"/x","id":"wrong","type":"int"}},
            {"method":"teleport","params":{}},
            {"method":"unannounce","params":{"name":"/ok","id":1}}
        ]"#;
        let msgs = decode_control(text).unwrap();
        assert_eq!(
            msgs,
            vec![ServerMessage::Unannounce {
                name: "/ok".into(),
                id: TopicId(1)
            }]
        );
    }

    #[test]
    fn test_decode_non_array_returns_error() {
        assert!(decode_control(r#"{"method":"announce"}"#).is_err());
        assert!(decode_control("not json").is_err());
    }
}
