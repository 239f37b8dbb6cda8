//! Local `TaskDispatcher` backed by an unbounded Tokio channel.
//!
//! Tasks are executed by whoever drives [`QueueDispatcher::drain`] or
//! [`QueueDispatcher::run`], with at most `concurrency` in flight. A failed
//! delivery is queued again until it has been attempted `max_attempts`
//! times, then dropped with an error log. A redelivery waits
//! `retry_delay_ms`, doubled for every further attempt, before it runs.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, mpsc};

use crate::application::ports::{Task, TaskDispatcher};
use crate::domain::config::DispatcherConfig;

/// One delivery of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub task: Task,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Longest wait before a redelivery.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Tally of deliveries handled by a `drain` or `run` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: usize,
    pub redelivered: usize,
    pub dropped: usize,
}

pub struct QueueDispatcher {
    sender: mpsc::UnboundedSender<Delivery>,
    receiver: Mutex<mpsc::UnboundedReceiver<Delivery>>,
    config: DispatcherConfig,
}

impl QueueDispatcher {
    #[must_use]
    pub fn new(config: DispatcherConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            config,
        }
    }

    /// Execute queued deliveries until the queue is empty, redeliveries
    /// included.
    pub async fn drain<F, Fut>(&self, handler: F) -> DrainReport
    where
        F: Fn(Task) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut receiver = self.receiver.lock().await;
        let mut report = DrainReport::default();
        loop {
            let mut batch = Vec::new();
            while let Ok(delivery) = receiver.try_recv() {
                batch.push(delivery);
            }
            if batch.is_empty() {
                return report;
            }
            self.execute_batch(batch, &handler, &mut report).await;
        }
    }

    /// Execute deliveries as they arrive until `shutdown` resolves.
    ///
    /// A batch already in flight runs to completion before shutdown.
    pub async fn run<F, Fut>(&self, handler: F, shutdown: impl Future<Output = ()>) -> DrainReport
    where
        F: Fn(Task) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut receiver = self.receiver.lock().await;
        let mut report = DrainReport::default();
        tokio::pin!(shutdown);
        loop {
            let first = tokio::select! {
                () = &mut shutdown => break,
                delivery = receiver.recv() => delivery,
            };
            let Some(first) = first else { break };
            let mut batch = vec![first];
            while let Ok(delivery) = receiver.try_recv() {
                batch.push(delivery);
            }
            self.execute_batch(batch, &handler, &mut report).await;
        }
        tracing::debug!(?report, "task worker stopped");
        report
    }

    async fn execute_batch<F, Fut>(
        &self,
        batch: Vec<Delivery>,
        handler: &F,
        report: &mut DrainReport,
    ) where
        F: Fn(Task) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let outcomes: Vec<(Delivery, Result<()>)> = stream::iter(batch)
            .map(|delivery| {
                let delay = self.retry_delay(delivery.attempt);
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let result = handler(delivery.task.clone()).await;
                    (delivery, result)
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        for (delivery, result) in outcomes {
            self.settle(delivery, result, report);
        }
    }

    /// Wait before running delivery `attempt`: none for the first, then
    /// `retry_delay_ms` doubling per attempt, capped at [`MAX_RETRY_DELAY`].
    fn retry_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (attempt - 2).min(16);
        Duration::from_millis(self.config.retry_delay_ms.saturating_mul(factor))
            .min(MAX_RETRY_DELAY)
    }

    fn settle(&self, delivery: Delivery, result: Result<()>, report: &mut DrainReport) {
        let Err(err) = result else {
            report.succeeded += 1;
            return;
        };
        if delivery.attempt >= self.config.max_attempts {
            tracing::error!(
                task = %delivery.task,
                attempts = delivery.attempt,
                "task dropped: {err:#}"
            );
            report.dropped += 1;
            return;
        }
        tracing::warn!(
            task = %delivery.task,
            attempt = delivery.attempt,
            "task failed, redelivering: {err:#}"
        );
        let retry = Delivery {
            task: delivery.task,
            attempt: delivery.attempt + 1,
        };
        if self.sender.send(retry).is_ok() {
            report.redelivered += 1;
        } else {
            report.dropped += 1;
        }
    }
}

impl TaskDispatcher for QueueDispatcher {
    async fn enqueue(&self, task: Task) -> Result<()> {
        self.sender
            .send(Delivery { task, attempt: 1 })
            .map_err(|_| anyhow::anyhow!("task queue is closed"))
    }
}
