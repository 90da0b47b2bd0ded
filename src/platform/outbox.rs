//! Transactional outbox: events are written next to the state change that caused
//! them and relayed to RabbitMQ afterwards.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use lapin::{BasicProperties, Channel, options::BasicPublishOptions};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::db::DbPool;
use crate::{
    models::{CreateOutboxEntity, OutboxEntity},
    schema::outbox,
};

pub const PENDING: &str = "PENDING";
pub const SENT: &str = "SENT";

/// Rows relayed per poll.
const BATCH_SIZE: i64 = 50;

/// Queues `payload` for `event_type` inside the caller's transaction.
pub async fn publish(
    conn: &mut AsyncPgConnection,
    event_type: String,
    payload: impl Serialize,
) -> Result<()> {
    let payload = serde_json::to_string(&payload).context("Failed to serialize outbox payload")?;

    diesel::insert_into(outbox::table)
        .values(CreateOutboxEntity {
            event_type,
            payload,
            status: PENDING.to_string(),
        })
        .execute(conn)
        .await
        .context("Failed to insert outbox event")?;

    Ok(())
}

/// Publishes one batch of pending rows and marks them sent. Returns how many went out.
pub async fn relay_pending(pool: &DbPool, channel: &Channel) -> Result<usize> {
    let conn = &mut pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    conn.transaction(|conn| {
        Box::pin(async move {
            let rows: Vec<OutboxEntity> = outbox::table
                .filter(outbox::status.eq(PENDING))
                .order_by(outbox::id.asc())
                .limit(BATCH_SIZE)
                .for_update()
                .skip_locked()
                .select(OutboxEntity::as_select())
                .get_results(conn)
                .await
                .context("Failed to get pending outbox events")?;

            for row in &rows {
                channel
                    .basic_publish(
                        "".into(),
                        row.event_type.as_str().into(),
                        BasicPublishOptions::default(),
                        row.payload.as_bytes(),
                        BasicProperties::default(),
                    )
                    .await
                    .with_context(|| format!("Failed to publish outbox event #{}", row.id))?
                    .await
                    .with_context(|| format!("Broker did not confirm outbox event #{}", row.id))?;

                diesel::update(outbox::table.find(row.id))
                    .set((
                        outbox::status.eq(SENT),
                        outbox::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)
                    .await
                    .context("Failed to mark outbox event as sent")?;
            }

            Ok::<usize, anyhow::Error>(rows.len())
        })
    })
    .await
}

/// Polls the outbox until `shutdown` flips to `true`.
pub async fn run_relay(
    pool: DbPool,
    channel: Channel,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Outbox relay started");
    let mut interval = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match relay_pending(&pool, &channel).await {
                    Ok(0) => {}
                    Ok(sent) => info!("Relayed {} outbox events", sent),
                    Err(err) => error!("Outbox relay failed: {:?}", err),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    warn!("Outbox relay stopped");
}
