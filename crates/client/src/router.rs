//! Routing of inbound broker messages to the status display.

use std::sync::Arc;

use wsprobe_shared::{Command, Frame, HDR_DESTINATION, HDR_SUBSCRIPTION};

use crate::status::StatusReporter;

/// Broadcast topic carrying public orderbook updates.
pub const BROADCAST_TOPIC: &str = "/topic/orderbook";
/// Per-session private queue.
pub const PRIVATE_QUEUE: &str = "/user/queue/private";

const SUB_BROADCAST: &str = "sub-0";
const SUB_PRIVATE: &str = "sub-1";

/// Subscribes to the fixed destination set after each successful connect and
/// forwards every inbound message to the reporter. Never buffers.
pub struct SubscriptionRouter {
    reporter: Arc<dyn StatusReporter>,
}

impl SubscriptionRouter {
    pub fn new(reporter: Arc<dyn StatusReporter>) -> Self {
        Self { reporter }
    }

    /// SUBSCRIBE frames to issue on every (re)connect. Subscriptions live and
    /// die with the connection; nothing here is persisted.
    pub fn subscribe_frames(&self) -> Vec<Frame> {
        vec![
            Frame::subscribe(SUB_BROADCAST, BROADCAST_TOPIC),
            Frame::subscribe(SUB_PRIVATE, PRIVATE_QUEUE),
        ]
    }

    /// Dispatch one inbound MESSAGE frame. Non-MESSAGE frames are ignored.
    pub fn route(&self, frame: &Frame) {
        if frame.command != Command::Message {
            return;
        }
        let destination = frame
            .get(HDR_DESTINATION)
            .or_else(|| frame.get(HDR_SUBSCRIPTION))
            .unwrap_or("");

        match destination {
            PRIVATE_QUEUE | SUB_PRIVATE => {
                self.reporter.on_message(&format!("Private: {}", frame.body));
            }
            _ => {
                self.reporter.on_message(&extract_content(&frame.body));
            }
        }
    }
}

/// Pull the nested `content` field out of a structured broadcast body, falling
/// back to the raw body when it is not valid JSON or has no such field.
fn extract_content(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    match value.get("content") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => body.to_string(),
    }
}
