use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::events::OrderStatusChangedEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub member_id: i32,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn for_status_change(event: &OrderStatusChangedEvent) -> Self {
        Self {
            member_id: event.member_id,
            subject: format!("Order #{} is now {}", event.order_id, event.status.label()),
            body: event.description.clone(),
        }
    }
}

/// Hand-off point to the mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<()>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, notification: Notification) -> Result<()> {
        info!(
            member_id = notification.member_id,
            subject = %notification.subject,
            "Sending notification: {}",
            notification.body
        );
        Ok(())
    }
}
