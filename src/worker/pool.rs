use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::time::timeout;

use super::handler::{HandlerRegistry, TaskOutcome};
use crate::config::TaskConfig;
use crate::error::{ErrorClass, PipelineError};
use crate::metrics::TaskMetrics;
use crate::queue::{QueueError, QueuedTask, TaskQueue};

/// Pause after a queue error before reserving again
const RESERVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// What happened to a task after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptReport {
    Completed(TaskOutcome),
    RetryScheduled { delay: Duration },
    DeadLettered { class: ErrorClass },
}

/// Pool of worker loops consuming the task queue.
#[derive(Clone)]
pub struct WorkerPool {
    queue: Arc<dyn TaskQueue>,
    registry: Arc<HandlerRegistry>,
    concurrency: usize,
    soft_timeout: Duration,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        registry: HandlerRegistry,
        concurrency: usize,
        soft_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            registry: Arc::new(registry),
            concurrency: concurrency.max(1),
            soft_timeout,
        }
    }

    pub fn from_config(
        queue: Arc<dyn TaskQueue>,
        registry: HandlerRegistry,
        concurrency: usize,
        task: &TaskConfig,
    ) -> Self {
        Self::new(
            queue,
            registry,
            concurrency,
            Duration::from_secs(task.soft_timeout_seconds),
        )
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `concurrency` worker loops until the shutdown signal fires.
    ///
    /// Reservation stops on shutdown; attempts already in flight finish.
    pub async fn run(&self, shutdown: broadcast::Sender<()>) {
        tracing::info!(
            concurrency = self.concurrency,
            soft_timeout_secs = self.soft_timeout.as_secs(),
            backend = self.queue.backend_name(),
            handlers = ?self.registry.names(),
            "Worker pool started"
        );

        let handles: Vec<_> = (0..self.concurrency)
            .map(|worker| {
                let pool = self.clone();
                let shutdown = shutdown.subscribe();
                tokio::spawn(async move { pool.worker_loop(worker, shutdown).await })
            })
            .collect();

        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker loop panicked");
            }
        }

        tracing::info!("Worker pool stopped");
    }

    async fn worker_loop(&self, worker: usize, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(worker, "Worker loop started");

        loop {
            let reserved = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                reserved = self.queue.reserve() => reserved,
            };

            match reserved {
                Ok(task) => {
                    self.process(task).await;
                }
                Err(e) => {
                    tracing::error!(worker, error = %e, "Failed to reserve task");
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(RESERVE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::debug!(worker, "Worker loop stopped");
    }

    /// Reserve the next eligible task and run one attempt of it.
    pub async fn run_once(&self) -> Result<AttemptReport, QueueError> {
        let task = self.queue.reserve().await?;
        Ok(self.process(task).await)
    }

    /// Run one attempt and settle the task with the queue.
    pub async fn process(&self, task: QueuedTask) -> AttemptReport {
        let started = Instant::now();
        TaskMetrics::record_attempt(&task.task_name);

        let Some(handler) = self.registry.get(&task.task_name) else {
            let err = PipelineError::UnknownTask(task.task_name.clone());
            tracing::error!(
                task_id = %task.id,
                task = %task.task_name,
                error_class = %err.class(),
                "No handler registered, task dead-lettered"
            );
            return self.dead_letter(&task, &err, started).await;
        };

        tracing::debug!(
            task_id = %task.id,
            task = %task.task_name,
            attempt = task.attempts,
            "Task attempt started"
        );

        let result = match timeout(self.soft_timeout, handler.handle(&task.args)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(self.soft_timeout)),
        };

        match result {
            Ok(outcome) => {
                if let Err(e) = self.queue.complete(task.id).await {
                    tracing::error!(task_id = %task.id, error = %e, "Failed to complete task");
                }
                TaskMetrics::record_duration(&task.task_name, "success", started.elapsed());
                tracing::debug!(
                    task_id = %task.id,
                    task = %task.task_name,
                    attempt = task.attempts,
                    outcome = ?outcome,
                    "Task completed"
                );
                AttemptReport::Completed(outcome)
            }
            Err(err) => {
                let policy = handler.retry_policy();
                if !err.is_retryable() || !policy.allows_retry(task.attempts) {
                    handler.on_exhausted(&task, &err);
                    return self.dead_letter(&task, &err, started).await;
                }

                let delay = policy.delay_for(task.attempts);
                tracing::warn!(
                    task_id = %task.id,
                    task = %task.task_name,
                    attempt = task.attempts,
                    max_attempts = policy.max_attempts,
                    error_class = %err.class(),
                    error = %err,
                    retry_in_secs = delay.as_secs_f64(),
                    "Task attempt failed, retry scheduled"
                );

                if let Err(e) = self
                    .queue
                    .schedule_retry(task.id, delay, &err.to_string())
                    .await
                {
                    tracing::error!(task_id = %task.id, error = %e, "Failed to schedule retry");
                }
                TaskMetrics::record_retry(&task.task_name);
                TaskMetrics::record_duration(&task.task_name, "retry", started.elapsed());
                AttemptReport::RetryScheduled { delay }
            }
        }
    }

    async fn dead_letter(
        &self,
        task: &QueuedTask,
        err: &PipelineError,
        started: Instant,
    ) -> AttemptReport {
        let class = err.class();
        tracing::error!(
            task_id = %task.id,
            task = %task.task_name,
            attempts = task.attempts,
            error_class = %class,
            error = %err,
            "Task attempts exhausted, dead-lettered"
        );

        if let Err(e) = self
            .queue
            .dead_letter(task.id, class, &err.to_string())
            .await
        {
            tracing::error!(task_id = %task.id, error = %e, "Failed to dead-letter task");
        }
        TaskMetrics::record_dead_letter(&task.task_name, class.as_str());
        TaskMetrics::record_duration(&task.task_name, "dead_letter", started.elapsed());
        AttemptReport::DeadLettered { class }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{MemoryTaskQueue, RetryPolicy};
    use crate::worker::TaskHandler;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` attempts with a provider rejection.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        exhausted: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                exhausted: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl TaskHandler for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy::fixed(3, Duration::from_secs(10))
        }

        async fn handle(&self, _args: &Value) -> Result<TaskOutcome, PipelineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(PipelineError::MailRejected)
            } else {
                Ok(TaskOutcome::Completed)
            }
        }

        fn on_exhausted(&self, _task: &QueuedTask, _error: &PipelineError) {
            self.exhausted.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Slow;

    #[async_trait]
    impl TaskHandler for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy::fixed(1, Duration::from_secs(1))
        }

        async fn handle(&self, _args: &Value) -> Result<TaskOutcome, PipelineError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(TaskOutcome::Completed)
        }
    }

    fn pool(queue: Arc<MemoryTaskQueue>, handler: Arc<dyn TaskHandler>) -> WorkerPool {
        WorkerPool::new(
            queue,
            HandlerRegistry::new().with(handler),
            1,
            Duration::from_secs(30),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let handler = Flaky::new(1);
        let pool = pool(queue.clone(), handler.clone());
        queue.enqueue("flaky", json!({})).await.unwrap();

        assert_eq!(
            pool.run_once().await.unwrap(),
            AttemptReport::RetryScheduled {
                delay: Duration::from_secs(10)
            }
        );
        assert_eq!(
            pool.run_once().await.unwrap(),
            AttemptReport::Completed(TaskOutcome::Completed)
        );
        assert!(queue.is_idle().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_dead_letter() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let handler = Flaky::new(u32::MAX);
        let pool = pool(queue.clone(), handler.clone());
        queue.enqueue("flaky", json!({"n": 1})).await.unwrap();

        pool.run_once().await.unwrap();
        pool.run_once().await.unwrap();
        assert_eq!(
            pool.run_once().await.unwrap(),
            AttemptReport::DeadLettered {
                class: ErrorClass::TransientProvider
            }
        );

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(handler.exhausted.load(Ordering::SeqCst), 1);

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 3);
        assert_eq!(dead[0].error_class, "transient_provider");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_task_dead_letters_immediately() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let pool = pool(queue.clone(), Flaky::new(0));
        queue.enqueue("nobody_home", json!({})).await.unwrap();

        assert_eq!(
            pool.run_once().await.unwrap(),
            AttemptReport::DeadLettered {
                class: ErrorClass::FatalConfiguration
            }
        );
        assert_eq!(queue.dead_letters().await.unwrap()[0].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_timeout_fails_attempt() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let pool = pool(queue.clone(), Arc::new(Slow));
        queue.enqueue("slow", json!({})).await.unwrap();

        assert_eq!(
            pool.run_once().await.unwrap(),
            AttemptReport::DeadLettered {
                class: ErrorClass::Timeout
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let handler = Flaky::new(0);
        let pool = WorkerPool::new(
            queue.clone(),
            HandlerRegistry::new().with(handler.clone()),
            2,
            Duration::from_secs(30),
        );
        queue.enqueue("flaky", json!({})).await.unwrap();

        let (tx, _) = broadcast::channel(1);
        let runner = {
            let pool = pool.clone();
            let tx = tx.clone();
            tokio::spawn(async move { pool.run(tx).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        tx.send(()).unwrap();
        runner.await.unwrap();
        assert!(queue.is_idle().await);
    }
}
