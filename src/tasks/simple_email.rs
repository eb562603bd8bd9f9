//! `send_simple_email`: generic asynchronous e-mail send.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::mail::MailGateway;
use crate::queue::RetryPolicy;
use crate::worker::{TaskHandler, TaskOutcome};

pub const SEND_SIMPLE_EMAIL: &str = "send_simple_email";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleEmailArgs {
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl SimpleEmailArgs {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            html: None,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn to_args(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Sends a pre-composed message; constant delay between attempts.
pub struct SendSimpleEmailTask {
    gateway: MailGateway,
}

impl SendSimpleEmailTask {
    pub fn new(gateway: MailGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl TaskHandler for SendSimpleEmailTask {
    fn name(&self) -> &'static str {
        SEND_SIMPLE_EMAIL
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(MAX_ATTEMPTS, RETRY_DELAY)
    }

    async fn handle(&self, args: &Value) -> Result<TaskOutcome, PipelineError> {
        let args: SimpleEmailArgs = serde_json::from_value(args.clone())
            .map_err(|e| PipelineError::InvalidPayload(e.to_string()))?;

        let accepted = self
            .gateway
            .send_email(&args.to, &args.subject, &args.text, args.html.as_deref())
            .await?;

        if !accepted {
            return Err(PipelineError::MailRejected);
        }

        tracing::info!(to = %args.to, "Simple email sent");
        Ok(TaskOutcome::Completed)
    }
}
