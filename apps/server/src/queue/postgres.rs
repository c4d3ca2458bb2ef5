//! PostgreSQL-backed message queue

use super::helpers::{notify_channel, try_claim_messages};
use super::models::{
    MessageId, OutboundMessage, QueueDepth, ReceiptHandle, ReceiveOptions, ReceivedMessage,
};
use super::traits::MessageQueue;
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgListener, types::Json, PgPool, Row};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration, Instant};

/// Upper bound on a single LISTEN wait. Messages whose visibility timeout lapses are not
/// announced, so the claim is retried at least this often during a long poll.
const LISTEN_SLICE: Duration = Duration::from_secs(1);

/// Queue stored in a single table, shared by every process pointing at the same database
#[derive(Clone)]
pub struct PostgresMessageQueue {
    pool: PgPool,
    name: String,
    table: String,
    channel: String,
    /// LISTEN connection for long polls, opened on first use and kept across receives.
    /// Concurrent long polls on one instance wait their turn for it.
    listener: Arc<Mutex<Option<PgListener>>>,
}

impl fmt::Debug for PostgresMessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresMessageQueue")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl PostgresMessageQueue {
    /// `table` must be a validated identifier; it is interpolated into SQL.
    pub fn new(pool: PgPool, name: impl Into<String>, table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            pool,
            name: name.into(),
            channel: notify_channel(&table),
            table,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Create the queue table and its index if they do not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        let table = &self.table;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                message_id UUID PRIMARY KEY,
                queue_name TEXT NOT NULL,
                body TEXT NOT NULL,
                attributes JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                sent_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                visible_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                receipt_handle UUID,
                receive_count INTEGER NOT NULL DEFAULT 0
            )
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_visible_idx ON {table} (queue_name, visible_at)"
        ))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {table}_receipt_idx ON {table} (receipt_handle)"
        ))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn claim(&self, options: &ReceiveOptions) -> Result<Vec<ReceivedMessage>> {
        try_claim_messages(
            &self.pool,
            &self.table,
            &self.name,
            options.batch_limit(),
            options.visibility_timeout,
        )
        .await
    }

    async fn connect_listener(&self) -> Result<PgListener> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(Error::Database)?;
        listener
            .listen(&self.channel)
            .await
            .map_err(Error::Database)?;
        tracing::debug!(channel = %self.channel, "Queue listener connected");
        Ok(listener)
    }

    /// Claim until messages arrive or `deadline` passes, waking on notifications.
    async fn wait_for_messages(
        &self,
        listener: &mut PgListener,
        options: &ReceiveOptions,
        deadline: Instant,
    ) -> Result<Vec<ReceivedMessage>> {
        loop {
            // Claim after LISTEN so a send between the first claim and LISTEN is not missed
            let messages = self.claim(options).await?;
            if !messages.is_empty() {
                return Ok(messages);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }

            match timeout(remaining.min(LISTEN_SLICE), listener.recv()).await {
                Ok(Ok(_notification)) => {}
                Ok(Err(e)) => return Err(Error::Database(e)),
                Err(_elapsed) => {}
            }
        }
    }
}

#[async_trait]
impl MessageQueue for PostgresMessageQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: OutboundMessage) -> Result<MessageId> {
        let id = MessageId::new();

        sqlx::query(&format!(
            "INSERT INTO {} (message_id, queue_name, body, attributes) VALUES ($1, $2, $3, $4)",
            self.table
        ))
        .bind(id.0)
        .bind(&self.name)
        .bind(&message.body)
        .bind(Json(&message.attributes))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        // Wake up long-polling consumers
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        tracing::debug!(message_id = %id, queue = %self.name, "Message sent");
        Ok(id)
    }

    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<ReceivedMessage>> {
        let messages = self.claim(options).await?;
        let wait = options.bounded_wait();
        if !messages.is_empty() || wait.is_zero() {
            return Ok(messages);
        }

        let deadline = Instant::now() + wait;
        let Ok(mut slot) = timeout(wait, self.listener.lock()).await else {
            // Another long poll held the listener for our whole wait
            return self.claim(options).await;
        };
        let mut listener = match slot.take() {
            Some(listener) => listener,
            None => self.connect_listener().await?,
        };

        let result = self.wait_for_messages(&mut listener, options, deadline).await;
        // A listener that failed is dropped and reconnected on the next long poll
        if result.is_ok() {
            *slot = Some(listener);
        }
        result
    }

    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE queue_name = $1 AND receipt_handle = $2",
            self.table
        ))
        .bind(&self.name)
        .bind(receipt.0)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::Queue(format!(
                "receipt handle {receipt} is stale or unknown"
            )));
        }
        Ok(())
    }

    async fn depth(&self) -> Result<QueueDepth> {
        let row = sqlx::query(&format!(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE visible_at <= NOW()) AS visible,
                COUNT(*) FILTER (WHERE visible_at > NOW()) AS in_flight
            FROM {}
            WHERE queue_name = $1
            "#,
            self.table
        ))
        .bind(&self.name)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueDepth {
            visible: row.get("visible"),
            in_flight: row.get("in_flight"),
        })
    }
}
