//! Helper functions for PostgreSQL queue operations

use super::models::{MessageId, ReceiptHandle, ReceivedMessage};
use crate::Result;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use std::collections::BTreeMap;
use std::time::Duration;

/// Claim up to `limit` visible messages without blocking.
///
/// Each claimed row gets a fresh receipt handle and stays hidden for `visibility_timeout`.
/// Rows locked by a concurrent consumer are skipped.
pub async fn try_claim_messages(
    pool: &PgPool,
    table: &str,
    queue_name: &str,
    limit: usize,
    visibility_timeout: Duration,
) -> Result<Vec<ReceivedMessage>> {
    let sql = format!(
        r#"
        UPDATE {table}
        SET receipt_handle = gen_random_uuid(),
            receive_count = receive_count + 1,
            visible_at = NOW() + make_interval(secs => $3)
        WHERE message_id IN (
            SELECT message_id
            FROM {table}
            WHERE queue_name = $1
              AND visible_at <= NOW()
            ORDER BY sent_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
        )
        RETURNING message_id, receipt_handle, body, attributes, receive_count, sent_at
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(queue_name)
        .bind(limit as i64)
        .bind(visibility_timeout.as_secs_f64())
        .fetch_all(pool)
        .await
        .map_err(crate::Error::Database)?;

    let mut messages: Vec<ReceivedMessage> = rows.iter().map(received_from_row).collect();
    // RETURNING does not preserve the subquery order.
    messages.sort_by_key(|m| m.sent_at);
    Ok(messages)
}

fn received_from_row(row: &PgRow) -> ReceivedMessage {
    let Json(attributes): Json<BTreeMap<String, String>> = row.get("attributes");
    ReceivedMessage {
        message_id: MessageId(row.get("message_id")),
        receipt_handle: ReceiptHandle(row.get("receipt_handle")),
        body: row.get("body"),
        attributes,
        receive_count: row.get("receive_count"),
        sent_at: row.get("sent_at"),
    }
}

/// Notification channel used to wake long-polling consumers of `table`.
pub fn notify_channel(table: &str) -> String {
    format!("{table}_sent")
}
