//! PostgreSQL queue and store. Requires `RDA_TEST_DATABASE_URL`; each test runs on its own
//! throwaway tables and is skipped when the variable is unset.

#[allow(unused)]
mod support;

use axum::http::StatusCode;
use rda_pipeline::{
    queue::{notify_channel, OutboundMessage, ReceiptHandle, ReceiveOptions},
    Error,
};
use std::time::Duration;
use support::{assert_status, encounter_ids, get_items, rda, with_postgres_app};

#[tokio::test]
async fn postgres_pipeline_round_trip() -> anyhow::Result<()> {
    with_postgres_app(|app| {
        Box::pin(async move {
            app.ingest(&rda("P1", "E2", "F1", "2024-03-01")).await?;
            app.ingest(&rda("P1", "E1", "F1", "2024-01-01")).await?;

            let (status, body) = app.get_json("/rda/P1/E1").await?;
            assert_status(status, StatusCode::OK, "point lookup");
            assert_eq!(body["item"]["validation_status"], "VALIDATED");

            let (_status, body) = app.get_json("/rda/P1").await?;
            assert_eq!(encounter_ids(&body)?, vec!["E1", "E2"]);

            let (_status, body) = app.get_json("/rda?facility_id=F1").await?;
            assert_eq!(encounter_ids(&body)?, vec!["E1", "E2"]);

            let (_status, body) = app.get_json("/rda").await?;
            assert_eq!(get_items(&body)?.len(), 2);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn postgres_upsert_keeps_one_row_per_key() -> anyhow::Result<()> {
    with_postgres_app(|app| {
        Box::pin(async move {
            app.ingest(&rda("P1", "E1", "F1", "2024-01-01")).await?;
            app.ingest(&rda("P1", "E1", "F2", "2024-01-01")).await?;

            assert_eq!(app.state.backends.store.count().await?, 1);
            let (_status, body) = app.get_json("/rda/P1/E1").await?;
            assert_eq!(body["item"]["facility_id"], "F2");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn postgres_decimals_survive_storage() -> anyhow::Result<()> {
    with_postgres_app(|app| {
        Box::pin(async move {
            let mut document = rda("P1", "E1", "F1", "2024-01-01");
            document["diagnosis"] = serde_json::from_str(r#"[{"confidence": 0.1}]"#)?;
            app.ingest(&document).await?;

            let (_status, _headers, body) = app
                .request(axum::http::Method::GET, "/rda/P1/E1", None)
                .await?;
            let text = String::from_utf8(body.to_vec())?;
            assert!(text.contains(r#""confidence":0.1"#), "body: {text}");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn postgres_queue_hides_received_messages() -> anyhow::Result<()> {
    with_postgres_app(|app| {
        Box::pin(async move {
            let queue = app.state.backends.require_queue()?;
            queue.send(OutboundMessage::new("first")).await?;
            queue.send(OutboundMessage::new("second")).await?;

            let options = ReceiveOptions {
                max_messages: 10,
                wait_time: Duration::ZERO,
                visibility_timeout: Duration::from_secs(30),
            };
            let received = queue.receive(&options).await?;
            let bodies: Vec<_> = received.iter().map(|m| m.body.as_str()).collect();
            assert_eq!(bodies, vec!["first", "second"]);
            assert!(queue.receive(&options).await?.is_empty());

            let depth = queue.depth().await?;
            assert_eq!((depth.visible, depth.in_flight), (0, 2));

            queue.delete(&received[0].receipt_handle).await?;
            assert!(matches!(
                queue.delete(&received[0].receipt_handle).await,
                Err(Error::Queue(_))
            ));
            assert!(matches!(
                queue.delete(&ReceiptHandle::new()).await,
                Err(Error::Queue(_))
            ));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn postgres_long_poll_wakes_on_send() -> anyhow::Result<()> {
    with_postgres_app(|app| {
        Box::pin(async move {
            let queue = app.state.backends.require_queue()?;
            let receiver = queue.clone();
            let waiting = tokio::spawn(async move {
                receiver
                    .receive(&ReceiveOptions {
                        max_messages: 1,
                        wait_time: Duration::from_secs(10),
                        visibility_timeout: Duration::from_secs(30),
                    })
                    .await
            });

            tokio::time::sleep(Duration::from_millis(200)).await;
            queue.send(OutboundMessage::new("wake")).await?;

            let received = tokio::time::timeout(Duration::from_secs(5), waiting).await???;
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].body, "wake");
            assert_eq!(received[0].receive_count, 1);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn postgres_long_poll_reuses_its_listener() -> anyhow::Result<()> {
    with_postgres_app(|app| {
        Box::pin(async move {
            let queue = app.state.backends.require_queue()?;
            let options = ReceiveOptions {
                max_messages: 1,
                wait_time: Duration::from_millis(300),
                visibility_timeout: Duration::from_secs(30),
            };
            for _ in 0..3 {
                assert!(queue.receive(&options).await?.is_empty());
            }

            let pool = app
                .state
                .backends
                .db_pool
                .clone()
                .expect("postgres backend has a pool");
            let channel = notify_channel(&app.state.config.queue.table);
            let listening: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM pg_stat_activity WHERE query LIKE 'LISTEN%' || $1 || '%'",
            )
            .bind(&channel)
            .fetch_one(&pool)
            .await?;
            assert_eq!(listening, 1);

            // The kept listener still wakes a waiting receive
            let receiver = queue.clone();
            let waiting = tokio::spawn(async move {
                receiver
                    .receive(&ReceiveOptions {
                        wait_time: Duration::from_secs(10),
                        ..options
                    })
                    .await
            });
            tokio::time::sleep(Duration::from_millis(200)).await;
            queue.send(OutboundMessage::new("after idle polls")).await?;

            let received = tokio::time::timeout(Duration::from_secs(5), waiting).await???;
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].body, "after idle polls");
            Ok(())
        })
    })
    .await
}
