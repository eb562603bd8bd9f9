//! Notification composition.

mod builder;
mod request;

pub use builder::{NotificationBuilder, SEND_DATE_FORMAT, SUBJECT_PREFIX};
pub use request::NotificationRequest;
