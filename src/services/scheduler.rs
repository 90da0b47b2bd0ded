//! Time-based order progression. Each job moves orders that have sat in one
//! status for longer than its threshold to the next status, as the system actor.

use std::{fmt, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use super::order_workflow::apply_transition;
use crate::{
    domain::{
        actor::Actor,
        status::{OrderStatus, Trigger},
    },
    platform::config::SchedulerConfig,
    repository::OrderRepository,
};

/// Reports buffered for the handle before new ones are dropped.
const REPORT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    AutoCancel,
    AutoPickup,
    AutoOutForDelivery,
    AutoDelivered,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::AutoCancel,
        JobKind::AutoPickup,
        JobKind::AutoOutForDelivery,
        JobKind::AutoDelivered,
    ];

    pub fn source(&self) -> OrderStatus {
        match self {
            JobKind::AutoCancel => OrderStatus::Placed,
            JobKind::AutoPickup => OrderStatus::Prepared,
            JobKind::AutoOutForDelivery => OrderStatus::PickedUp,
            JobKind::AutoDelivered => OrderStatus::OutForDelivery,
        }
    }

    pub fn target(&self) -> OrderStatus {
        match self {
            JobKind::AutoCancel => OrderStatus::Cancelled,
            JobKind::AutoPickup => OrderStatus::PickedUp,
            JobKind::AutoOutForDelivery => OrderStatus::OutForDelivery,
            JobKind::AutoDelivered => OrderStatus::Delivered,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::AutoCancel => "auto_cancel",
            JobKind::AutoPickup => "auto_pickup",
            JobKind::AutoOutForDelivery => "auto_out_for_delivery",
            JobKind::AutoDelivered => "auto_delivered",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSpec {
    pub kind: JobKind,
    /// Minimum time in `kind.source()` before an order qualifies.
    pub threshold: Duration,
    pub interval: Duration,
}

impl JobSpec {
    /// Ticks as often as the threshold is long.
    pub fn new(kind: JobKind, threshold: Duration) -> Self {
        Self {
            kind,
            threshold,
            interval: threshold,
        }
    }
}

pub fn jobs_from_config(config: &SchedulerConfig) -> Vec<JobSpec> {
    vec![
        JobSpec::new(JobKind::AutoCancel, config.automatically_cancelled),
        JobSpec::new(JobKind::AutoPickup, config.automatically_being_picked_up),
        JobSpec::new(
            JobKind::AutoOutForDelivery,
            config.automatically_out_for_delivery,
        ),
        JobSpec::new(JobKind::AutoDelivered, config.automatically_delivered),
    ]
}

#[derive(Debug)]
pub struct JobFailure {
    pub order_id: i32,
    pub error: String,
}

/// Outcome of one pass of one job.
#[derive(Debug)]
pub struct TickReport {
    pub job: JobKind,
    pub candidates: usize,
    pub transitioned: Vec<i32>,
    pub failures: Vec<JobFailure>,
}

pub struct OrderScheduler<R: ?Sized> {
    repo: Arc<R>,
    jobs: Vec<JobSpec>,
    tick_timeout: Duration,
}

impl<R> OrderScheduler<R>
where
    R: OrderRepository + ?Sized + 'static,
{
    pub fn new(repo: Arc<R>, config: &SchedulerConfig) -> Self {
        Self::with_jobs(repo, jobs_from_config(config), config.tick_timeout)
    }

    pub fn with_jobs(repo: Arc<R>, jobs: Vec<JobSpec>, tick_timeout: Duration) -> Self {
        Self {
            repo,
            jobs,
            tick_timeout,
        }
    }

    pub fn jobs(&self) -> &[JobSpec] {
        &self.jobs
    }

    /// Runs one pass of `job`. Orders are handled one after another and a
    /// failing order is recorded without stopping the rest of the batch.
    pub async fn run_tick(&self, job: &JobSpec) -> Result<TickReport> {
        let threshold =
            TimeDelta::from_std(job.threshold).context("Scheduler threshold out of range")?;
        let changed_before = Utc::now() - threshold;

        let candidates = self
            .repo
            .stale_orders(job.kind.source(), changed_before)
            .await
            .with_context(|| format!("Failed to get orders for {}", job.kind))?;

        let mut report = TickReport {
            job: job.kind,
            candidates: candidates.len(),
            transitioned: Vec::new(),
            failures: Vec::new(),
        };

        for order in &candidates {
            match apply_transition(
                &*self.repo,
                order,
                job.kind.target(),
                Trigger::Scheduler,
                &Actor::System,
            )
            .await
            {
                Ok(_) => report.transitioned.push(order.id),
                Err(err) => {
                    warn!(job = %job.kind, order_id = order.id, "Scheduled transition failed: {}", err);
                    report.failures.push(JobFailure {
                        order_id: order.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        if report.candidates > 0 {
            info!(
                job = %job.kind,
                candidates = report.candidates,
                transitioned = report.transitioned.len(),
                failed = report.failures.len(),
                "Scheduler tick finished"
            );
        } else {
            debug!(job = %job.kind, "Scheduler tick found nothing to do");
        }

        Ok(report)
    }

    /// Spawns one task per job. Every job ticks on its own interval, first tick
    /// one interval after start.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (report_tx, report_rx) = mpsc::channel(REPORT_BUFFER);
        let jobs = self.jobs.clone();
        let scheduler = Arc::new(self);

        let tasks = jobs
            .into_iter()
            .map(|job| {
                let scheduler = Arc::clone(&scheduler);
                let reports = report_tx.clone();
                let shutdown = shutdown_rx.clone();
                tokio::spawn(async move { scheduler.run_job(job, reports, shutdown).await })
            })
            .collect();

        info!("Order scheduler started");
        SchedulerHandle {
            shutdown: shutdown_tx,
            tasks,
            reports: report_rx,
        }
    }

    async fn run_job(
        &self,
        job: JobSpec,
        reports: mpsc::Sender<TickReport>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval_at(Instant::now() + job.interval, job.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match tokio::time::timeout(self.tick_timeout, self.run_tick(&job)).await {
                        Ok(Ok(report)) => {
                            if reports.try_send(report).is_err() {
                                debug!(job = %job.kind, "Dropped scheduler report");
                            }
                        }
                        Ok(Err(err)) => error!(job = %job.kind, "Scheduler tick failed: {:?}", err),
                        Err(_) => error!(
                            job = %job.kind,
                            "Scheduler tick timed out after {:?}, retrying next interval",
                            self.tick_timeout
                        ),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!(job = %job.kind, "Scheduler job stopped");
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    reports: mpsc::Receiver<TickReport>,
}

impl SchedulerHandle {
    pub fn reports(&mut self) -> &mut mpsc::Receiver<TickReport> {
        &mut self.reports
    }

    /// Signals every job and waits for in-flight ticks to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                error!("Scheduler job ended abnormally: {}", err);
            }
        }
        info!("Order scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_cover_the_timed_edges_of_the_graph() {
        for kind in JobKind::ALL {
            assert!(kind.source().can_transition(kind.target(), Trigger::Scheduler));
        }
    }

    #[test]
    fn jobs_tick_at_their_threshold() {
        let config = SchedulerConfig {
            automatically_cancelled: Duration::from_secs(30 * 60),
            automatically_being_picked_up: Duration::from_secs(15 * 60),
            automatically_out_for_delivery: Duration::from_secs(10 * 60),
            automatically_delivered: Duration::from_secs(30 * 60),
            tick_timeout: Duration::from_secs(30),
        };

        let jobs = jobs_from_config(&config);
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs[1].kind, JobKind::AutoPickup);
        assert_eq!(jobs[1].interval, Duration::from_secs(15 * 60));
        assert!(jobs.iter().all(|job| job.interval == job.threshold));
    }
}
