use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::status::OrderStatus;

/// Queue the order status notifications are published to.
pub const ORDER_STATUS_CHANGED: &str = "notifications.order_status_changed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub event_id: Uuid,
    pub order_id: i32,
    pub member_id: i32,
    pub status: OrderStatus,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

impl OrderStatusChangedEvent {
    pub fn new(
        order_id: i32,
        member_id: i32,
        status: OrderStatus,
        description: String,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            order_id,
            member_id,
            status,
            description,
            occurred_at,
        }
    }
}
