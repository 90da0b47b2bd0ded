use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use lapin::{message::Delivery, options::BasicAckOptions};
use tracing::info;

use crate::{
    notifications::{
        events::OrderStatusChangedEvent,
        mailer::{Mailer, Notification},
    },
    platform::app_state::AppState,
};

pub fn order_status_changed(
    delivery: Delivery,
    state: Arc<AppState>,
) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let payload = deliver_status_change(state.mailer.as_ref(), &delivery.data).await?;
        info!(
            "Notified member #{} about order #{}",
            payload.member_id, payload.order_id
        );

        delivery.ack(BasicAckOptions::default()).await?;

        Ok(())
    })
}

/// Decodes an `OrderStatusChangedEvent` and hands the rendered notification to `mailer`.
pub async fn deliver_status_change(
    mailer: &dyn Mailer,
    data: &[u8],
) -> Result<OrderStatusChangedEvent> {
    let payload: OrderStatusChangedEvent =
        serde_json::from_str(str::from_utf8(data)?).context("Malformed order status event")?;
    info!("Received event: {:?}", payload);

    mailer
        .send(Notification::for_status_change(&payload))
        .await
        .with_context(|| format!("Failed to notify about order #{}", payload.order_id))?;

    Ok(payload)
}
