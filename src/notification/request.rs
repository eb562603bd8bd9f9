use serde::Serialize;
use serde_json::{Map, Value};

/// A composed notification, ready for the Mail Gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRequest {
    pub recipient_email: String,
    pub recipient_name: String,
    pub subject: String,
    /// Template name, e.g. `emails/document_notification`
    pub template: String,
    /// Template variables. Never holds artifact bytes or storage paths.
    pub context: Map<String, Value>,
}

impl NotificationRequest {
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }
}
