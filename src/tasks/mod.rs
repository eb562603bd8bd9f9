//! Task handlers registered with the worker pool.

mod document_notification;
mod simple_email;

pub use document_notification::{
    document_notification_args, DocumentNotificationTask, NotificationOutcome,
    SEND_DOCUMENT_NOTIFICATION,
};
pub use simple_email::{SendSimpleEmailTask, SimpleEmailArgs, SEND_SIMPLE_EMAIL};
