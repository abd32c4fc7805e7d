use std::collections::BTreeMap;

use serde::Serialize;

use crate::lib::engine::types::ProgressEvent;

/// Topic every client listens on.
pub const HUB_TARGET: &str = "message";
/// Sender tag attached to everything this process publishes.
pub const APP_SENDER: &str = "app";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Progress,
    Monitor,
}

/// JSON body carried by every hub message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub progress: Option<f64>,
    pub progress_message: Option<String>,
    pub status: Option<String>,
    pub objects: Option<BTreeMap<String, serde_json::Value>>,
}

impl Notification {
    pub fn new(kind: EventKind, event: ProgressEvent) -> Self {
        let mut notification = Notification {
            kind,
            progress: None,
            progress_message: None,
            status: None,
            objects: None,
        };

        match event {
            ProgressEvent::Status(message) => notification.status = Some(message),
            ProgressEvent::Progress {
                current,
                total,
                message,
            } => {
                notification.progress = Some(if total > 0 {
                    (current as f64 / total as f64 * 1000.0).round() / 10.0
                } else {
                    current as f64
                });
                notification.progress_message = Some(message);
            }
            ProgressEvent::Aux(objects) => notification.objects = Some(objects),
        }

        notification
    }
}

/// One broadcast on the hub: `(sender, body)` on the `message` topic.
#[derive(Debug, Clone, PartialEq)]
pub struct HubMessage {
    pub target: String,
    pub sender: String,
    pub body: String,
}

impl HubMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        HubMessage {
            target: HUB_TARGET.to_string(),
            sender: sender.into(),
            body: body.into(),
        }
    }

    /// Text frame pushed to websocket clients.
    pub fn to_frame(&self) -> String {
        serde_json::json!({
            "target": self.target,
            "arguments": [self.sender, self.body],
        })
        .to_string()
    }
}

/// Broadcast surface the core publishes through.
///
/// `broadcast` must not block; delivery is best effort.
pub trait NotificationSink: Send + Sync {
    fn broadcast(&self, message: HubMessage);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn status_event_serializes_with_nulls() {
        let body = serde_json::to_value(Notification::new(
            EventKind::Progress,
            ProgressEvent::status("Create the docker container..."),
        ))
        .unwrap();

        assert_eq!(
            body,
            json!({
                "type": "progress",
                "progress": null,
                "progressMessage": null,
                "status": "Create the docker container...",
                "objects": null,
            })
        );
    }

    #[test]
    fn progress_event_becomes_percentage() {
        let notification = Notification::new(
            EventKind::Progress,
            ProgressEvent::Progress {
                current: 1,
                total: 3,
                message: "Downloading".into(),
            },
        );
        assert_eq!(notification.progress, Some(33.3));
        assert_eq!(notification.progress_message.as_deref(), Some("Downloading"));
    }

    #[test]
    fn progress_without_total_keeps_current() {
        let notification = Notification::new(
            EventKind::Progress,
            ProgressEvent::Progress {
                current: 42,
                total: 0,
                message: "Extracting".into(),
            },
        );
        assert_eq!(notification.progress, Some(42.0));
    }

    #[test]
    fn aux_event_fills_objects() {
        let mut objects = BTreeMap::new();
        objects.insert("data".to_string(), json!([]));
        let body =
            serde_json::to_value(Notification::new(EventKind::Monitor, ProgressEvent::Aux(objects)))
                .unwrap();
        assert_eq!(body["type"], "monitor");
        assert_eq!(body["objects"]["data"], Value::Array(vec![]));
    }

    #[test]
    fn frame_wraps_sender_and_body() {
        let frame = HubMessage::new(APP_SENDER, "{}").to_frame();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({ "target": "message", "arguments": ["app", "{}"] }));
    }
}
