//! Integration tests for the end-to-end sensor pipeline
//!
//! Key integration points tested:
//! - Allowlist loading (JSON and SQLite) feeding the trust filter
//! - Queue → ingestion → engine → report → CSV file
//! - Redelivery with a new delivery id leaving the report unchanged
//! - Empty allowlist keeping the pipeline running with an empty report

#[cfg(test)]
mod pipeline_integration_tests {
    use gasmon::aggregator_core::{BucketWidth, CsvReportWriter, ReportSink};
    use gasmon::config::AllowlistBackend;
    use gasmon::pipeline::{
        start_pipeline_ingestion, AllowlistSource, IngestionSettings, Location,
        LocationTrustFilter, PipelineEngine,
    };
    use gasmon::streamer_core::{ChannelQueue, QueueMessage, TailQueue};
    use rusqlite::Connection;
    use std::io::Write;
    use std::time::Duration;
    use tokio::sync::watch;

    const NINE_AM: i64 = 1_760_778_000_000; // 2025-10-18 09:00:00 UTC

    fn notification(delivery: &str, location: &str, event: &str, value: &str, timestamp: i64) -> String {
        let inner = format!(
            r#"{{"locationId":"{}","eventId":"{}","value":{},"timestamp":{}}}"#,
            location, event, value, timestamp
        );
        serde_json::json!({
            "Type": "Notification",
            "MessageId": delivery,
            "TopicArn": "arn:aws:sns:eu-west-1:552908040772:sensor-data",
            "Message": inner,
            "Timestamp": "2025-10-18T09:00:05.000Z"
        })
        .to_string()
    }

    fn settings() -> IngestionSettings {
        IngestionSettings {
            max_messages: 10,
            wait: Duration::from_millis(50),
            queue_size_log_every: 5,
            receive_error_pause: Duration::from_millis(10),
        }
    }

    async fn run_to_completion(engine: &PipelineEngine, bodies: Vec<String>) -> ChannelQueue {
        let (tx, mut queue) = ChannelQueue::new(bodies.len().max(1));
        for (i, body) in bodies.into_iter().enumerate() {
            tx.send(QueueMessage::new(format!("msg-{}", i), body)).await.unwrap();
        }
        drop(tx);

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        start_pipeline_ingestion(&mut queue, engine, &settings(), shutdown_rx).await;
        queue
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let allowlist_path = dir.path().join("locations.json");
        std::fs::write(&allowlist_path, r#"[{"id":"L1","x":10.5,"y":3.25}]"#).unwrap();

        // 1. Load allowlist through the configured backend
        let source = AllowlistSource::new(AllowlistBackend::Json, allowlist_path);
        let locations = source.load_locations().await.unwrap();
        let engine = PipelineEngine::new(LocationTrustFilter::new(locations), BucketWidth::Minute);

        // 2. Event A, its redelivery, and an untrusted reading
        let queue = run_to_completion(
            &engine,
            vec![
                notification("d1", "L1", "A", "5.0", NINE_AM + 10_000),
                notification("d2", "L1", "A", "5.0", NINE_AM + 10_000),
                notification("d3", "L9", "B", "7.0", NINE_AM + 20_000),
            ],
        )
        .await;

        let stats = engine.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.untrusted, 1);
        assert_eq!(stats.decode_errors, 0);
        assert_eq!(queue.acknowledged().len(), 3);

        // 3. Write the report
        let report_path = dir.path().join("MinuteAverages.csv");
        let mut writer = CsvReportWriter::new(&report_path);
        writer.write_report(&engine.report()).await.unwrap();

        let written = std::fs::read_to_string(&report_path).unwrap();
        assert_eq!(written, "Date,L1\n2025-10-18 09:00,5.0\n");
    }

    #[tokio::test]
    async fn test_redelivery_produces_identical_report() {
        let bodies = vec![
            notification("d1", "L1", "e1", "1.25", NINE_AM),
            notification("d2", "L2", "e2", "3", NINE_AM + 61_000),
            notification("d3", "L1", "e3", "2.75", NINE_AM + 59_999),
        ];

        let once = PipelineEngine::new(
            LocationTrustFilter::new(vec![Location::new("L1"), Location::new("L2")]),
            BucketWidth::Minute,
        );
        run_to_completion(&once, bodies.clone()).await;

        // Every message delivered twice, in reverse order the second time
        let mut redelivered = bodies.clone();
        redelivered.extend(bodies.iter().rev().cloned());
        let twice = PipelineEngine::new(
            LocationTrustFilter::new(vec![Location::new("L1"), Location::new("L2")]),
            BucketWidth::Minute,
        );
        run_to_completion(&twice, redelivered).await;

        assert_eq!(once.report(), twice.report());
        assert_eq!(
            once.report(),
            "Date,L1,L2\n2025-10-18 09:00,2.00,\n2025-10-18 09:01,,3\n"
        );
        assert_eq!(twice.stats().duplicates, 3);
    }

    #[tokio::test]
    async fn test_malformed_and_untrusted_do_not_touch_report() {
        let engine = PipelineEngine::new(
            LocationTrustFilter::new(vec![Location::new("L1")]),
            BucketWidth::Minute,
        );

        run_to_completion(
            &engine,
            vec![
                notification("d1", "L1", "e1", "4.5", NINE_AM),
                "{\"Message\": \"not a reading\"}".to_string(),
                notification("d2", "L1", "", "9.9", NINE_AM),
                notification("d3", "L7", "e3", "9.9", NINE_AM),
            ],
        )
        .await;

        let stats = engine.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.decode_errors, 2);
        assert_eq!(stats.untrusted, 1);
        assert_eq!(engine.report(), "Date,L1\n2025-10-18 09:00,4.5\n");
    }

    #[tokio::test]
    async fn test_empty_allowlist_runs_and_reports_header_only() {
        let engine = PipelineEngine::new(LocationTrustFilter::new(Vec::new()), BucketWidth::Minute);

        run_to_completion(
            &engine,
            vec![
                notification("d1", "L1", "e1", "1.0", NINE_AM),
                notification("d2", "L2", "e2", "2.0", NINE_AM),
            ],
        )
        .await;

        let stats = engine.stats();
        assert_eq!(stats.untrusted, 2);
        assert_eq!(stats.untrusted_fail_closed, 2);
        assert_eq!(engine.report(), "Date\n");
    }

    #[tokio::test]
    async fn test_sqlite_allowlist_and_file_queue() {
        let dir = tempfile::tempdir().unwrap();

        let db_path = dir.path().join("gasmon.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE trusted_locations (id TEXT NOT NULL, x REAL, y REAL, position INTEGER);
             INSERT INTO trusted_locations (id, position) VALUES ('L2', 1);
             INSERT INTO trusted_locations (id, position) VALUES ('L1', 0);",
        )
        .unwrap();
        drop(conn);

        let queue_path = dir.path().join("messages.jsonl");
        let mut file = std::fs::File::create(&queue_path).unwrap();
        writeln!(file, "{}", notification("d1", "L2", "e1", "8", NINE_AM)).unwrap();
        writeln!(file, "{}", notification("d2", "L1", "e2", "6.5", NINE_AM)).unwrap();
        file.sync_all().unwrap();
        drop(file);

        let source = AllowlistSource::new(AllowlistBackend::Sqlite, db_path);
        let locations = source.load_locations().await.unwrap();
        let engine = PipelineEngine::new(LocationTrustFilter::new(locations), BucketWidth::Minute);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            shutdown_tx.send(true).unwrap();
            shutdown_tx
        });

        let mut queue = TailQueue::new(queue_path);
        let handled = start_pipeline_ingestion(&mut queue, &engine, &settings(), shutdown_rx).await;
        stopper.await.unwrap();

        assert_eq!(handled, 2);
        assert_eq!(queue.acknowledged(), 2);
        assert_eq!(engine.report(), "Date,L1,L2\n2025-10-18 09:00,6.5,8\n");
    }

    #[tokio::test]
    async fn test_file_queue_counts_undecodable_line() {
        let dir = tempfile::tempdir().unwrap();
        let queue_path = dir.path().join("messages.jsonl");

        let mut file = std::fs::File::create(&queue_path).unwrap();
        writeln!(file, "{}", notification("d1", "L1", "e1", "1.0", NINE_AM)).unwrap();
        file.write_all(b"\xff\xfe garbage\n").unwrap();
        writeln!(file, "{}", notification("d3", "L1", "e3", "3.0", NINE_AM)).unwrap();
        file.sync_all().unwrap();
        drop(file);

        let engine = PipelineEngine::new(
            LocationTrustFilter::new(vec![Location::new("L1")]),
            BucketWidth::Minute,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            shutdown_tx.send(true).unwrap();
            shutdown_tx
        });

        let mut queue = TailQueue::new(queue_path);
        let handled = start_pipeline_ingestion(&mut queue, &engine, &settings(), shutdown_rx).await;
        stopper.await.unwrap();

        assert_eq!(handled, 3);
        assert_eq!(queue.acknowledged(), 3);
        let stats = engine.stats();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.decode_errors, 1);
        assert_eq!(engine.report(), "Date,L1\n2025-10-18 09:00,2.0\n");
    }
}
