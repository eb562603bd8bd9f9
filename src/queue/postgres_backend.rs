//! PostgreSQL-based task queue.
//!
//! Tasks live in the `notification_tasks` table. Reservation uses
//! `FOR UPDATE SKIP LOCKED` so any number of worker processes can poll the
//! same table without handing one task to two workers. A task left
//! `running` longer than the visibility timeout (crashed worker) becomes
//! reservable again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::backend::{
    DeadLetter, QueueError, QueueStats, QueuedTask, TaskId, TaskQueue, DEAD_LETTER_LIMIT,
};
use crate::error::ErrorClass;
use crate::metrics::TaskMetrics;

type TaskRow = (
    Uuid,
    String,
    serde_json::Value,
    i32,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<String>,
);

pub struct PostgresTaskQueue {
    pool: PgPool,
    poll_interval: Duration,
    visibility_timeout: Duration,
    completed: AtomicU64,
}

impl PostgresTaskQueue {
    pub fn new(pool: PgPool, poll_interval: Duration, visibility_timeout: Duration) -> Self {
        Self {
            pool,
            poll_interval,
            visibility_timeout,
            completed: AtomicU64::new(0),
        }
    }

    async fn try_reserve(&self) -> Result<Option<QueuedTask>, QueueError> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            UPDATE notification_tasks
            SET status = 'running', attempts = attempts + 1, reserved_at = NOW()
            WHERE id = (
                SELECT id FROM notification_tasks
                WHERE (status = 'pending' AND next_eligible_at <= NOW())
                   OR (status = 'running' AND reserved_at < NOW() - make_interval(secs => $1))
                ORDER BY next_eligible_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, task_name, args, attempts, enqueued_at, next_eligible_at, last_error
            "#,
        )
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, task_name, args, attempts, enqueued_at, next_eligible_at, last_error)| {
                QueuedTask {
                    id: TaskId(id),
                    task_name,
                    args,
                    enqueued_at,
                    attempts: attempts.max(0) as u32,
                    next_eligible_at,
                    last_error,
                }
            },
        ))
    }
}

#[async_trait]
impl TaskQueue for PostgresTaskQueue {
    async fn enqueue(
        &self,
        task_name: &str,
        args: serde_json::Value,
    ) -> Result<TaskId, QueueError> {
        let id = TaskId::new();

        sqlx::query(
            r#"
            INSERT INTO notification_tasks (id, task_name, args, status, enqueued_at, next_eligible_at)
            VALUES ($1, $2, $3, 'pending', NOW(), NOW())
            "#,
        )
        .bind(id.0)
        .bind(task_name)
        .bind(&args)
        .execute(&self.pool)
        .await?;

        TaskMetrics::record_enqueued(task_name);
        tracing::trace!(task_id = %id, task = %task_name, "Task enqueued to PostgreSQL");

        Ok(id)
    }

    async fn reserve(&self) -> Result<QueuedTask, QueueError> {
        loop {
            if let Some(task) = self.try_reserve().await? {
                return Ok(task);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn complete(&self, id: TaskId) -> Result<(), QueueError> {
        let result =
            sqlx::query("DELETE FROM notification_tasks WHERE id = $1 AND status = 'running'")
                .bind(id.0)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotReserved(id));
        }

        self.completed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn schedule_retry(
        &self,
        id: TaskId,
        delay: Duration,
        error: &str,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_tasks
            SET status = 'pending',
                next_eligible_at = NOW() + make_interval(secs => $2),
                reserved_at = NULL,
                last_error = $3
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id.0)
        .bind(delay.as_secs_f64())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotReserved(id));
        }
        Ok(())
    }

    async fn dead_letter(
        &self,
        id: TaskId,
        class: ErrorClass,
        error: &str,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_tasks
            SET status = 'dead',
                error_class = $2,
                last_error = $3,
                reserved_at = NULL,
                dead_lettered_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id.0)
        .bind(class.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotReserved(id));
        }
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, QueueError> {
        let rows: Vec<(
            Uuid,
            String,
            serde_json::Value,
            i32,
            Option<String>,
            Option<String>,
            Option<DateTime<Utc>>,
        )> = sqlx::query_as(
            r#"
            SELECT id, task_name, args, attempts, error_class, last_error, dead_lettered_at
            FROM notification_tasks
            WHERE status = 'dead'
            ORDER BY dead_lettered_at DESC
            LIMIT $1
            "#,
        )
        .bind(DEAD_LETTER_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, task_name, args, attempts, error_class, last_error, dead_lettered_at)| {
                    DeadLetter {
                        task_id: TaskId(id),
                        task_name,
                        args,
                        attempts: attempts.max(0) as u32,
                        error_class: error_class.unwrap_or_default(),
                        last_error: last_error.unwrap_or_default(),
                        dead_lettered_at: dead_lettered_at.unwrap_or_else(Utc::now),
                    }
                },
            )
            .collect())
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM notification_tasks GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = QueueStats {
            backend: self.backend_name().to_string(),
            completed: self.completed.load(Ordering::Relaxed),
            ..Default::default()
        };

        for (status, count) in rows {
            let count = count.max(0) as usize;
            match status.as_str() {
                "pending" => stats.pending = count,
                "running" => stats.running = count,
                "dead" => stats.dead_lettered = count,
                _ => {}
            }
        }

        Ok(stats)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
