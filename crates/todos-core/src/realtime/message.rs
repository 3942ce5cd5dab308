//! Realtime protocol message types
//!
//! Phoenix channel frames exchanged with the realtime service, JSON encoded
//! (serializer version 1.0.0).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::ChangeEvent;

/// Protocol version sent in the connection URL
pub const PROTOCOL_VSN: &str = "1.0.0";

/// Topic used for connection-level heartbeats
pub const PHOENIX_TOPIC: &str = "phoenix";

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub const EVENT_SYSTEM: &str = "system";

/// Full topic name for a channel
pub fn channel_topic(channel: &str) -> String {
    format!("realtime:{}", channel)
}

/// One frame on the socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl Frame {
    /// Join a channel, subscribing to every change event in every schema
    pub fn join(topic: &str, msg_ref: &str, access_token: &str) -> Self {
        Frame {
            topic: topic.to_string(),
            event: EVENT_JOIN.to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [ { "event": "*", "schema": "*" } ],
                    "private": false
                },
                "access_token": access_token
            }),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(msg_ref.to_string()),
        }
    }

    /// Leave a previously joined channel
    pub fn leave(topic: &str, msg_ref: &str, join_ref: &str) -> Self {
        Frame {
            topic: topic.to_string(),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    /// Connection keep-alive
    pub fn heartbeat(msg_ref: &str) -> Self {
        Frame {
            topic: PHOENIX_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }

    /// Encode to the JSON text sent on the socket
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a JSON text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Interpret the frame
    pub fn classify(self) -> Inbound {
        match self.event.as_str() {
            EVENT_REPLY => {
                let status = self
                    .payload
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let response = self.payload.get("response").cloned().unwrap_or(Value::Null);
                Inbound::Reply {
                    topic: self.topic,
                    msg_ref: self.msg_ref,
                    ok: status == "ok",
                    response,
                }
            }
            EVENT_POSTGRES_CHANGES => {
                // Current servers wrap the change in `data`
                let data = match self.payload.get("data") {
                    Some(data) => data.clone(),
                    None => self.payload,
                };
                match serde_json::from_value::<ChangeEvent>(data) {
                    Ok(change) => Inbound::Change {
                        topic: self.topic,
                        change,
                    },
                    Err(e) => Inbound::Malformed(format!("postgres_changes: {}", e)),
                }
            }
            EVENT_ERROR => Inbound::ChannelError { topic: self.topic },
            EVENT_CLOSE => Inbound::ChannelClosed { topic: self.topic },
            EVENT_SYSTEM => Inbound::System {
                topic: self.topic,
                payload: self.payload,
            },
            _ => Inbound::Other {
                topic: self.topic,
                event: self.event,
            },
        }
    }
}

/// Inbound frames, by meaning
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to a frame we sent (join, leave, heartbeat)
    Reply {
        topic: String,
        msg_ref: Option<String>,
        ok: bool,
        response: Value,
    },
    /// A row changed
    Change { topic: String, change: ChangeEvent },
    /// The server crashed the channel
    ChannelError { topic: String },
    /// The server closed the channel
    ChannelClosed { topic: String },
    /// Informational server message
    System { topic: String, payload: Value },
    /// Anything else (presence, broadcast, ...)
    Other { topic: String, event: String },
    /// A known event whose payload could not be understood
    Malformed(String),
}

/// Human-readable reason from a failed reply
pub fn reply_reason(response: &Value) -> String {
    response
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| response.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeKind;

    #[test]
    fn test_join_frame_shape() {
        let frame = Frame::join("realtime:any", "1", "anon");
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();

        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["topic"], "realtime:any");
        assert_eq!(value["ref"], "1");
        assert_eq!(value["join_ref"], "1");
        assert_eq!(
            value["payload"]["config"]["postgres_changes"][0],
            json!({"event": "*", "schema": "*"})
        );
        assert_eq!(value["payload"]["access_token"], "anon");
    }

    #[test]
    fn test_heartbeat_omits_join_ref() {
        let text = Frame::heartbeat("7").encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["topic"], "phoenix");
        assert_eq!(value["event"], "heartbeat");
        assert!(value.get("join_ref").is_none());
    }

    #[test]
    fn test_classify_reply() {
        let frame = Frame::decode(
            r#"{"topic":"realtime:any","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#,
        )
        .unwrap();

        match frame.classify() {
            Inbound::Reply { ok, msg_ref, .. } => {
                assert!(ok);
                assert_eq!(msg_ref.as_deref(), Some("1"));
            }
            other => panic!("Expected Reply, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_reply_reason() {
        let frame = Frame::decode(
            r#"{"topic":"realtime:any","event":"phx_reply","payload":{"status":"error","response":{"reason":"unmatched topic"}},"ref":"1"}"#,
        )
        .unwrap();

        match frame.classify() {
            Inbound::Reply { ok, response, .. } => {
                assert!(!ok);
                assert_eq!(reply_reason(&response), "unmatched topic");
            }
            other => panic!("Expected Reply, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_change_wrapped_in_data() {
        let frame = Frame::decode(
            r#"{
                "topic": "realtime:any",
                "event": "postgres_changes",
                "payload": {
                    "data": {
                        "schema": "public",
                        "table": "todos",
                        "commit_timestamp": "2024-03-07T15:30:00Z",
                        "type": "UPDATE",
                        "record": {"id": 3, "finished": true},
                        "old_record": {"id": 3},
                        "columns": [],
                        "errors": null
                    },
                    "ids": [1]
                },
                "ref": null
            }"#,
        )
        .unwrap();

        match frame.classify() {
            Inbound::Change { change, .. } => {
                assert_eq!(change.kind, ChangeKind::Update);
                assert_eq!(change.table, "todos");
                assert_eq!(change.record.unwrap()["finished"], json!(true));
            }
            other => panic!("Expected Change, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_unwrapped_change_with_unknown_type() {
        let frame = Frame::decode(
            r#"{"topic":"realtime:any","event":"postgres_changes","payload":{"schema":"public","table":"todos","type":"TRUNCATE"},"ref":null}"#,
        )
        .unwrap();

        match frame.classify() {
            Inbound::Change { change, .. } => {
                assert_eq!(change.kind, ChangeKind::Other("TRUNCATE".to_string()));
            }
            other => panic!("Expected Change, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_channel_lifecycle() {
        let frame = Frame {
            topic: "realtime:any".to_string(),
            event: EVENT_CLOSE.to_string(),
            payload: json!({}),
            msg_ref: None,
            join_ref: None,
        };
        assert!(matches!(frame.classify(), Inbound::ChannelClosed { .. }));

        let frame = Frame::decode(r#"{"topic":"realtime:any","event":"presence_state","payload":{}}"#)
            .unwrap();
        assert!(matches!(frame.classify(), Inbound::Other { .. }));
    }
}
