use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use futures::{StreamExt, future::BoxFuture};
use lapin::{
    Channel, Connection, ConnectionProperties,
    message::Delivery,
    options::{BasicConsumeOptions, BasicNackOptions, ConfirmSelectOptions, QueueDeclareOptions},
    types::FieldTable,
};
use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use super::{app_state::AppState, db::DbPool, outbox};
use crate::{repository::Repository, services::scheduler::OrderScheduler};

/// Queue handler. Acks the delivery itself once the work is done.
pub type Consumer = fn(Delivery, Arc<AppState>) -> BoxFuture<'static, Result<()>>;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

pub fn init_env() {
    if let Err(err) = dotenvy::dotenv() {
        info!("No .env file loaded: {}", err);
    }
}

/// Runs the service until Ctrl+C / SIGTERM: HTTP server, queue consumers, outbox
/// relay and order scheduler.
pub async fn bootstrap(
    service_name: &str,
    app: Router,
    state: AppState,
    pool: DbPool,
    consumers: &[(&str, Consumer)],
) -> Result<()> {
    let config = Arc::clone(&state.config);

    let amqp = Connection::connect(&config.amqp.url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;
    info!("Connected to RabbitMQ");

    let publisher = amqp
        .create_channel()
        .await
        .context("Failed to open the publishing channel")?;
    publisher
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .context("Failed to enable publisher confirms")?;

    let state = Arc::new(state);
    for (queue, handler) in consumers {
        let channel = amqp
            .create_channel()
            .await
            .with_context(|| format!("Failed to open a channel for {queue}"))?;
        declare_queue(&channel, queue).await?;
        spawn_consumer(channel, queue, *handler, Arc::clone(&state)).await?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay = tokio::spawn(outbox::run_relay(
        pool,
        publisher,
        config.outbox.poll_interval,
        shutdown_rx,
    ));

    let repo: Arc<dyn Repository> = Arc::clone(&state.repo);
    let scheduler = OrderScheduler::new(repo, &config.scheduler).start();

    let address = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("{} listening on {}", service_name, address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("{} shutting down", service_name);
    scheduler.stop().await;
    let _ = shutdown_tx.send(true);
    if let Err(err) = relay.await {
        error!("Outbox relay ended abnormally: {}", err);
    }
    if let Err(err) = amqp.close(200, "Shutting down".into()).await {
        warn!("Failed to close RabbitMQ connection: {}", err);
    }

    Ok(())
}

async fn declare_queue(channel: &Channel, queue: &str) -> Result<()> {
    channel
        .queue_declare(
            queue.into(),
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .with_context(|| format!("Failed to declare queue {queue}"))?;
    Ok(())
}

async fn spawn_consumer(
    channel: Channel,
    queue: &str,
    handler: Consumer,
    state: Arc<AppState>,
) -> Result<()> {
    let mut consumer = channel
        .basic_consume(
            queue.into(),
            format!("orderservice.{queue}").as_str().into(),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .with_context(|| format!("Failed to consume {queue}"))?;

    let queue = queue.to_string();
    info!("Consuming {}", queue);

    tokio::spawn(async move {
        // Keeps the channel open for as long as the consumer runs.
        let _channel = channel;

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(err) => {
                    error!("Failed to receive from {}: {}", queue, err);
                    continue;
                }
            };

            let acker = delivery.acker.clone();
            if let Err(err) = handler(delivery, Arc::clone(&state)).await {
                error!("Failed to handle message from {}: {:?}", queue, err);
                if let Err(err) = acker.nack(BasicNackOptions::default()).await {
                    error!("Failed to nack message from {}: {}", queue, err);
                }
            }
        }

        warn!("Consumer for {} stopped", queue);
    });

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
