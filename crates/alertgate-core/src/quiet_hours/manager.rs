//! Per-channel notification queues drained when quiet hours end
//!
//! [`QuietHoursQueueManager`] owns one bounded FIFO per notification
//! channel and a background task that wakes every `tick_interval` to:
//!
//! 1. drop notifications older than their 24h TTL,
//! 2. if quiet hours are over, detach each non-empty queue and hand it to
//!    the delivery target on its own task with a deadline,
//! 3. forget channels whose queue is now empty.
//!
//! A slow delivery target never delays the next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerting::NotificationDelivery;
use crate::clock::{SharedClock, SystemClock};
use crate::error::{Error, Result};
use crate::models::{QueuedNotification, QuietHoursConfig, Severity};

use super::filter::{should_suppress, QuietHoursDecision};

/// Default per-channel queue capacity
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Default background wake interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Default deadline for a single delivery
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Construction options for [`QuietHoursQueueManager`]
#[derive(Clone)]
pub struct QueueManagerOptions {
    pub quiet_hours: QuietHoursConfig,
    pub clock: SharedClock,
    pub delivery: Option<Arc<dyn NotificationDelivery>>,
    pub max_queue_size: usize,
    pub tick_interval: Duration,
    pub delivery_timeout: Duration,
}

impl Default for QueueManagerOptions {
    fn default() -> Self {
        Self {
            quiet_hours: QuietHoursConfig::default(),
            clock: Arc::new(SystemClock),
            delivery: None,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

struct Inner {
    queues: DashMap<String, Vec<QueuedNotification>>,
    config: RwLock<QuietHoursConfig>,
    clock: SharedClock,
    delivery: Option<Arc<dyn NotificationDelivery>>,
    max_queue_size: usize,
    delivery_timeout: Duration,
    runtime: Handle,
}

impl Inner {
    fn check(&self, severity: Severity) -> QuietHoursDecision {
        let config = self.config.read().clone();
        should_suppress(&config, severity, self.clock.now())
    }

    fn process_queues(&self) {
        let now = self.clock.now();
        let in_quiet_hours = self.check(Severity::Info).suppress;
        let mut ready = Vec::new();

        self.queues.retain(|channel_id, queue| {
            let before = queue.len();
            queue.retain(|notification| notification.is_live(now));

            let expired = before - queue.len();
            if expired > 0 {
                warn!(channel_id = %channel_id, expired, "Dropped expired queued notifications");
            }

            if !in_quiet_hours && !queue.is_empty() {
                ready.push((channel_id.clone(), std::mem::take(queue)));
            }
            !queue.is_empty()
        });

        for (channel_id, batch) in ready {
            self.dispatch(channel_id, batch);
        }
    }

    fn dispatch(&self, channel_id: String, batch: Vec<QueuedNotification>) {
        let count = batch.len();
        let Some(delivery) = self.delivery.clone() else {
            warn!(channel_id = %channel_id, count, "No delivery target configured, discarding queued notifications");
            return;
        };

        let deadline = self.delivery_timeout;
        self.runtime.spawn(async move {
            match tokio::time::timeout(deadline, delivery.deliver(batch)).await {
                Ok(Ok(())) => {
                    info!(channel_id = %channel_id, count, "Delivered queued notifications");
                }
                Ok(Err(e)) => {
                    error!(channel_id = %channel_id, count, error = %e, "Failed to deliver queued notifications");
                }
                Err(_) => {
                    error!(channel_id = %channel_id, count, timeout = ?deadline, "Delivery of queued notifications timed out");
                }
            }
        });
    }
}

/// Holds notifications per channel during quiet hours
pub struct QuietHoursQueueManager {
    inner: Arc<Inner>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QuietHoursQueueManager {
    /// Create the manager and start its background task.
    ///
    /// Fails with [`Error::Runtime`] when called outside a Tokio runtime.
    pub fn new(options: QueueManagerOptions) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let inner = Arc::new(Inner {
            queues: DashMap::new(),
            config: RwLock::new(options.quiet_hours),
            clock: options.clock,
            delivery: options.delivery,
            max_queue_size: options.max_queue_size,
            delivery_timeout: options.delivery_timeout,
            runtime: runtime.clone(),
        });

        let shutdown = CancellationToken::new();
        let tick = options.tick_interval.max(Duration::from_millis(1));
        let worker = runtime.spawn(run_worker(inner.clone(), shutdown.clone(), tick));

        info!(
            tick_interval = ?tick,
            max_queue_size = inner.max_queue_size,
            "Quiet hours queue manager started"
        );

        Ok(Self {
            inner,
            shutdown,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Whether a notification of `severity` should be queued right now
    pub fn should_queue(&self, severity: Severity) -> QuietHoursDecision {
        self.inner.check(severity)
    }

    /// Queue a notification on its channel, stamping enqueue time and TTL.
    ///
    /// Fails with [`Error::QueueFull`] once the channel holds
    /// `max_queue_size` notifications.
    pub fn enqueue(&self, mut notification: QueuedNotification) -> Result<()> {
        let max_size = self.inner.max_queue_size;
        let mut queue = self
            .inner
            .queues
            .entry(notification.channel_id.clone())
            .or_default();

        if queue.len() >= max_size {
            warn!(channel_id = %notification.channel_id, max_size, "Quiet hours queue full");
            return Err(Error::QueueFull {
                channel_id: notification.channel_id,
                max_size,
            });
        }

        notification.stamp(self.inner.clock.now());
        debug!(
            channel_id = %notification.channel_id,
            alert_id = %notification.alert_id,
            "Notification queued for quiet hours"
        );
        queue.push(notification);
        Ok(())
    }

    /// Notifications queued for a channel
    pub fn queued_count(&self, channel_id: &str) -> usize {
        self.inner.queues.get(channel_id).map_or(0, |queue| queue.len())
    }

    /// Queued notifications per channel
    pub fn all_queued_counts(&self) -> HashMap<String, usize> {
        self.inner
            .queues
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect()
    }

    /// Discard a channel's queue
    pub fn clear_queue(&self, channel_id: &str) {
        self.inner.queues.remove(channel_id);
    }

    /// Discard every queue
    pub fn clear_all_queues(&self) {
        self.inner.queues.clear();
    }

    /// Run one expiry/delivery pass immediately
    pub fn process_now(&self) {
        self.inner.process_queues();
    }

    /// Deliver everything queued, ignoring quiet hours.
    ///
    /// Without a delivery target this succeeds only when nothing is
    /// queued; otherwise the queues are left untouched.
    pub async fn flush_all(&self) -> Result<()> {
        let Some(delivery) = self.inner.delivery.clone() else {
            if self.inner.queues.iter().all(|entry| entry.value().is_empty()) {
                return Ok(());
            }
            return Err(Error::NoDeliveryCallback);
        };

        let mut batch = Vec::new();
        let channels: Vec<String> = self
            .inner
            .queues
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for channel_id in channels {
            if let Some((_, queue)) = self.inner.queues.remove(&channel_id) {
                batch.extend(queue);
            }
        }

        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        let deadline = self.inner.delivery_timeout;
        tokio::time::timeout(deadline, delivery.deliver(batch))
            .await
            .map_err(|_| Error::DeliveryTimeout(deadline))??;

        info!(count, "Flushed queued notifications");
        Ok(())
    }

    /// Replace the quiet hours window; takes effect on the next check
    pub fn update_config(&self, config: QuietHoursConfig) {
        *self.inner.config.write() = config;
        debug!("Quiet hours config updated");
    }

    pub fn get_config(&self) -> QuietHoursConfig {
        self.inner.config.read().clone()
    }

    /// Stop the background task and wait for it to exit. Safe to call twice.
    pub async fn close(&self) {
        self.shutdown.cancel();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Quiet hours worker failed");
            }
            info!("Quiet hours queue manager stopped");
        }
    }
}

impl Drop for QuietHoursQueueManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_worker(inner: Arc<Inner>, shutdown: CancellationToken, tick: Duration) {
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => inner.process_queues(),
        }
    }

    debug!("Quiet hours worker exited");
}
