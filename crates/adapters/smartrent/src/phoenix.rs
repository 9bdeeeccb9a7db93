//! Phoenix channel frames (protocol `2.0.0`).
//!
//! Every frame is a JSON array `[join_ref, ref, topic, event, payload]`.

use rentbridge_domain::id::RemoteDeviceId;
use serde_json::Value;

/// Protocol version sent in the `vsn` query parameter.
pub const VERSION: &str = "2.0.0";

/// Topic carrying heartbeats.
pub const PHOENIX_TOPIC: &str = "phoenix";

const DEVICE_TOPIC_PREFIX: &str = "devices:";

pub mod event {
    pub const JOIN: &str = "phx_join";
    pub const REPLY: &str = "phx_reply";
    pub const ERROR: &str = "phx_error";
    pub const CLOSE: &str = "phx_close";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const ATTRIBUTE_STATE: &str = "attribute_state";
    pub const UPDATE_ATTRIBUTES: &str = "update_attributes";
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub join_ref: Option<String>,
    pub msg_ref: Option<String>,
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

type WireFrame = (Option<String>, Option<String>, String, String, Value);

impl Frame {
    #[must_use]
    pub fn new(
        msg_ref: impl Into<String>,
        topic: impl Into<String>,
        event: &str,
        payload: Value,
    ) -> Self {
        Self {
            join_ref: None,
            msg_ref: Some(msg_ref.into()),
            topic: topic.into(),
            event: event.to_string(),
            payload,
        }
    }

    /// Join the channel of `device`. The join reference is the message
    /// reference, as Phoenix clients do.
    #[must_use]
    pub fn join(msg_ref: &str, device: RemoteDeviceId) -> Self {
        Self {
            join_ref: Some(msg_ref.to_string()),
            ..Self::new(msg_ref, device_topic(device), event::JOIN, Value::Object(Default::default()))
        }
    }

    #[must_use]
    pub fn heartbeat(msg_ref: &str) -> Self {
        Self::new(msg_ref, PHOENIX_TOPIC, event::HEARTBEAT, Value::Object(Default::default()))
    }

    /// # Errors
    ///
    /// Fails only if the payload cannot be represented as JSON.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&(
            &self.join_ref,
            &self.msg_ref,
            &self.topic,
            &self.event,
            &self.payload,
        ))
    }

    /// # Errors
    ///
    /// Returns the JSON error if `text` is not a five-element frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let (join_ref, msg_ref, topic, event, payload): WireFrame = serde_json::from_str(text)?;
        Ok(Self {
            join_ref,
            msg_ref,
            topic,
            event,
            payload,
        })
    }

    /// The device whose channel this frame belongs to.
    #[must_use]
    pub fn device(&self) -> Option<RemoteDeviceId> {
        self.topic
            .strip_prefix(DEVICE_TOPIC_PREFIX)
            .and_then(|raw| raw.parse().ok())
    }

    /// For a `phx_reply`: `Ok(())` on `"ok"`, or the error reason.
    ///
    /// # Errors
    ///
    /// Returns the reason reported by the server, or the status itself.
    pub fn reply_status(&self) -> Result<(), String> {
        let status = self.payload.get("status").and_then(Value::as_str);
        if status == Some("ok") {
            return Ok(());
        }
        let reason = self
            .payload
            .get("response")
            .and_then(|response| response.get("reason"))
            .and_then(Value::as_str)
            .or(status)
            .unwrap_or("no status");
        Err(reason.to_string())
    }
}

#[must_use]
pub fn device_topic(device: RemoteDeviceId) -> String {
    format!("{DEVICE_TOPIC_PREFIX}{device}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_encode_join_as_array() {
        let frame = Frame::join("3", RemoteDeviceId::new(12));
        assert_eq!(frame.encode().unwrap(), r#"["3","3","devices:12","phx_join",{}]"#);
    }

    #[test]
    fn should_encode_heartbeat_without_join_ref() {
        let frame = Frame::heartbeat("9");
        assert_eq!(frame.encode().unwrap(), r#"[null,"9","phoenix","heartbeat",{}]"#);
    }

    #[test]
    fn should_decode_attribute_state_push() {
        let frame = Frame::decode(
            r#"[null,null,"devices:42","attribute_state",{"name":"locked","state":"false"}]"#,
        )
        .unwrap();
        assert_eq!(frame.event, event::ATTRIBUTE_STATE);
        assert_eq!(frame.device(), Some(RemoteDeviceId::new(42)));
        assert_eq!(frame.payload["name"], "locked");
        assert!(frame.msg_ref.is_none());
    }

    #[test]
    fn should_reject_non_frame_text() {
        assert!(Frame::decode(r#"{"event":"phx_reply"}"#).is_err());
        assert!(Frame::decode(r#"["1","1","phoenix"]"#).is_err());
    }

    #[test]
    fn should_not_parse_device_from_other_topics() {
        assert_eq!(Frame::heartbeat("1").device(), None);
        let frame = Frame::new("1", "devices:abc", event::JOIN, json!({}));
        assert_eq!(frame.device(), None);
    }

    #[test]
    fn should_read_reply_status() {
        let ok = Frame::new("1", "devices:1", event::REPLY, json!({"status": "ok", "response": {}}));
        assert_eq!(ok.reply_status(), Ok(()));

        let refused = Frame::new(
            "2",
            "devices:1",
            event::REPLY,
            json!({"status": "error", "response": {"reason": "unauthorized"}}),
        );
        assert_eq!(refused.reply_status(), Err("unauthorized".to_string()));

        let bare = Frame::new("3", "devices:1", event::REPLY, json!({"status": "error"}));
        assert_eq!(bare.reply_status(), Err("error".to_string()));
    }
}
