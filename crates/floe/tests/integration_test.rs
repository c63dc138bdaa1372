//! Integration tests for floe

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use floe::{
    CapturedSource, ChangeStreamRecord, ChannelSink, PartitionToken, PipelineError, Row,
    WatchError, WatchOptions, WatchWindow, watch_stream,
};

fn ts(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
}

fn window() -> WatchWindow {
    WatchWindow {
        start: ts("2024-05-01T00:00:00Z"),
        end: ts("2024-05-01T00:10:00Z"),
    }
}

fn heartbeat_row(timestamp: &str) -> Row {
    Row::new(json!([{"heartbeat_record": [{"timestamp": timestamp}]}]))
}

fn data_change_row(sequence: usize) -> Row {
    Row::new(json!([{
        "data_change_record": [{
            "commit_timestamp": "2024-05-01T00:02:00Z",
            "record_sequence": format!("{sequence:08}"),
            "server_transaction_id": "tx-1",
            "is_last_record_in_transaction_in_partition": false,
            "table_name": "Singers",
            "column_types": [
                {"name": "SingerId", "type": {"code": "INT64"}, "is_primary_key": true, "ordinal_position": "1"}
            ],
            "mods": [{"keys": {"SingerId": sequence.to_string()}, "new_values": {}, "old_values": {}}],
            "mod_type": "INSERT",
            "value_capture_type": "OLD_AND_NEW_VALUES",
            "number_of_records_in_transaction": "5",
            "number_of_partitions_in_transaction": "1"
        }]
    }]))
}

fn child_partitions_row(start: &str, tokens: &[&str]) -> Row {
    let children: Vec<_> = tokens
        .iter()
        .map(|token| json!({"token": token, "parent_partition_tokens": [""]}))
        .collect();
    Row::new(json!([{
        "child_partitions_record": [{
            "start_timestamp": start,
            "record_sequence": "00000001",
            "child_partitions": children
        }]
    }]))
}

async fn drain(mut receiver: tokio::sync::mpsc::Receiver<floe::sink::Delivery>) -> Vec<floe::sink::Delivery> {
    let mut deliveries = Vec::new();
    while let Some(delivery) = receiver.recv().await {
        deliveries.push(delivery);
    }
    deliveries
}

mod watch_tests {
    use super::*;

    #[tokio::test]
    async fn test_root_split_into_children() {
        let source = Arc::new(CapturedSource::from_rows([
            (
                PartitionToken::root(),
                vec![
                    heartbeat_row("2024-05-01T00:00:30Z"),
                    child_partitions_row("2024-05-01T00:01:00Z", &["A", "B"]),
                ],
            ),
            (PartitionToken::from("A"), vec![heartbeat_row("2024-05-01T00:01:30Z")]),
            (PartitionToken::from("B"), vec![data_change_row(0)]),
        ]));
        let (sink, receiver) = ChannelSink::new(64);

        let report = watch_stream(
            WatchOptions::new("singers", window()),
            source.clone(),
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.summary.succeeded, 3);
        assert_eq!(report.stats.partitions_completed, 3);
        assert_eq!(report.stats.children_spawned, 2);
        assert_eq!(report.stats.records(), 4);

        let mut queries = source.queries();
        queries.sort_by(|a, b| a.token.cmp(&b.token));
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].partition_token(), None);
        assert_eq!(queries[0].start_timestamp, window().start);
        for query in &queries[1..] {
            assert_eq!(query.start_timestamp, ts("2024-05-01T00:01:00Z"));
            assert_eq!(query.end_timestamp, window().end);
            assert_eq!(query.heartbeat_interval, Duration::from_millis(300_000));
        }
        assert_eq!(queries[1].partition_token(), Some("A"));
        assert_eq!(queries[2].partition_token(), Some("B"));

        let deliveries = drain(receiver).await;
        assert_eq!(deliveries.len(), 4);
        let root: Vec<_> = deliveries
            .iter()
            .filter(|(origin, _)| origin.is_root())
            .map(|(_, record)| record.kind().as_str())
            .collect();
        assert_eq!(root, vec!["heartbeat", "child_partitions"]);
    }

    #[tokio::test]
    async fn test_every_child_is_watched() {
        let tokens: Vec<String> = (0..12).map(|i| format!("child-{i}")).collect();
        let token_refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let source = Arc::new(CapturedSource::from_rows([(
            PartitionToken::root(),
            vec![child_partitions_row("2024-05-01T00:01:00Z", &token_refs)],
        )]));
        let (sink, _receiver) = ChannelSink::new(64);

        let report = watch_stream(
            WatchOptions::new("singers", window()),
            source.clone(),
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.stats.children_spawned, 12);
        assert_eq!(report.summary.succeeded, 13);
        assert_eq!(source.queries().len(), 13);
    }

    #[tokio::test]
    async fn test_records_keep_partition_order() {
        let source = Arc::new(CapturedSource::from_rows([
            (
                PartitionToken::root(),
                vec![child_partitions_row("2024-05-01T00:01:00Z", &["A", "B"])],
            ),
            (PartitionToken::from("A"), (0..20).map(data_change_row).collect()),
            (PartitionToken::from("B"), (20..40).map(data_change_row).collect()),
        ]));
        let (sink, receiver) = ChannelSink::new(4);
        let cancel = CancellationToken::new();

        let (report, deliveries) = tokio::join!(
            watch_stream(
                WatchOptions::new("singers", window()),
                source,
                Arc::new(sink),
                &cancel,
            ),
            drain(receiver)
        );
        report.unwrap();

        for (token, expected) in [("A", 0..20), ("B", 20..40)] {
            let sequences: Vec<String> = deliveries
                .iter()
                .filter(|(origin, _)| origin.as_str() == token)
                .filter_map(|(_, record)| match record {
                    ChangeStreamRecord::DataChange(change) => Some(change.record_sequence.clone()),
                    _ => None,
                })
                .collect();
            let expected: Vec<String> = expected.map(|i| format!("{i:08}")).collect();
            assert_eq!(sequences, expected);
        }
    }

    #[tokio::test]
    async fn test_empty_window_reads_nothing() {
        let source = Arc::new(CapturedSource::from_rows([(
            PartitionToken::root(),
            vec![heartbeat_row("2024-05-01T00:00:30Z")],
        )]));
        let (sink, receiver) = ChannelSink::new(8);
        let start = ts("2024-05-01T00:00:00Z");

        let report = watch_stream(
            WatchOptions::new("singers", WatchWindow { start, end: start }),
            source.clone(),
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.stats.records(), 0);
        assert!(source.queries().is_empty());
        assert!(drain(receiver).await.is_empty());
    }

    #[tokio::test]
    async fn test_decode_failure_cancels_siblings() {
        // B never yields, so the run can only end through cancellation.
        struct StallingSource {
            inner: CapturedSource,
        }

        #[async_trait::async_trait]
        impl floe::ChangeStreamSource for StallingSource {
            async fn query(
                &self,
                query: floe::PartitionQuery,
            ) -> Result<floe::RowStream, floe::SourceError> {
                if query.token.as_str() == "B" {
                    return Ok(futures::stream::pending().boxed());
                }
                floe::ChangeStreamSource::query(&self.inner, query).await
            }
        }

        let inner = CapturedSource::from_rows([
            (
                PartitionToken::root(),
                vec![child_partitions_row("2024-05-01T00:01:00Z", &["B", "A"])],
            ),
            (PartitionToken::from("A"), vec![Row::new(json!("not an envelope"))]),
        ]);
        let (sink, _receiver) = ChannelSink::new(8);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            watch_stream(
                WatchOptions::new("singers", window()),
                Arc::new(StallingSource { inner }),
                Arc::new(sink),
                &CancellationToken::new(),
            ),
        )
        .await
        .expect("watch should end once A fails");

        let err = result.unwrap_err();
        match err.watch_error() {
            Some(WatchError::Decode { partition, .. }) => assert_eq!(partition.as_str(), "A"),
            other => panic!("expected a decode failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_error_after_rows_fails_the_run() {
        use std::sync::atomic::{AtomicBool, Ordering};

        struct DropFlag(Arc<AtomicBool>);

        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        // A breaks after its first row; B stalls until it is dropped.
        struct BrokenSource {
            inner: CapturedSource,
            stalled_dropped: Arc<AtomicBool>,
        }

        #[async_trait::async_trait]
        impl floe::ChangeStreamSource for BrokenSource {
            async fn query(
                &self,
                query: floe::PartitionQuery,
            ) -> Result<floe::RowStream, floe::SourceError> {
                match query.token.as_str() {
                    "A" => Ok(futures::stream::iter(vec![
                        Ok(heartbeat_row("2024-05-01T00:01:30Z")),
                        Err(floe::SourceError::Connection {
                            message: "reset".to_string(),
                        }),
                        Ok(heartbeat_row("2024-05-01T00:02:00Z")),
                    ])
                    .boxed()),
                    "B" => {
                        let flag = DropFlag(Arc::clone(&self.stalled_dropped));
                        Ok(futures::stream::pending()
                            .map(move |row| {
                                let _ = &flag;
                                row
                            })
                            .boxed())
                    }
                    _ => floe::ChangeStreamSource::query(&self.inner, query).await,
                }
            }
        }

        let stalled_dropped = Arc::new(AtomicBool::new(false));
        let source = BrokenSource {
            inner: CapturedSource::from_rows([(
                PartitionToken::root(),
                vec![child_partitions_row("2024-05-01T00:01:00Z", &["B", "A"])],
            )]),
            stalled_dropped: Arc::clone(&stalled_dropped),
        };
        let (sink, receiver) = ChannelSink::new(8);

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            watch_stream(
                WatchOptions::new("singers", window()),
                Arc::new(source),
                Arc::new(sink),
                &CancellationToken::new(),
            ),
        )
        .await
        .expect("watch should end once A fails")
        .unwrap_err();

        match err.watch_error() {
            Some(WatchError::Source {
                partition,
                source: floe::SourceError::Connection { .. },
            }) => assert_eq!(partition.as_str(), "A"),
            other => panic!("expected a connection failure, got {other:?}"),
        }
        assert!(stalled_dropped.load(Ordering::SeqCst));

        let delivered: Vec<(String, &str)> = drain(receiver)
            .await
            .iter()
            .map(|(origin, record)| (origin.as_str().to_string(), record.kind().as_str()))
            .collect();
        assert_eq!(
            delivered,
            vec![
                (String::new(), "child_partitions"),
                ("A".to_string(), "heartbeat"),
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_stalled_partitions() {
        struct PendingSource;

        #[async_trait::async_trait]
        impl floe::ChangeStreamSource for PendingSource {
            async fn query(
                &self,
                _query: floe::PartitionQuery,
            ) -> Result<floe::RowStream, floe::SourceError> {
                Ok(futures::stream::pending().boxed())
            }
        }

        let (sink, _receiver) = ChannelSink::new(8);
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            watch_stream(
                WatchOptions::new("singers", window()),
                Arc::new(PendingSource),
                Arc::new(sink),
                &shutdown,
            ),
        )
        .await
        .expect("watch should stop on shutdown")
        .unwrap_err();

        assert!(matches!(err, PipelineError::Shutdown));
    }

    #[tokio::test]
    async fn test_closed_receiver_fails_the_run() {
        let source = Arc::new(CapturedSource::from_rows([(
            PartitionToken::root(),
            vec![heartbeat_row("2024-05-01T00:00:30Z")],
        )]));
        let (sink, receiver) = ChannelSink::new(8);
        drop(receiver);

        let err = watch_stream(
            WatchOptions::new("singers", window()),
            source,
            Arc::new(sink),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err.watch_error(), Some(WatchError::Sink { .. })));
    }
}

mod sink_tests {
    use super::*;
    use floe::NdjsonSink;
    use serde_json::Value;

    #[tokio::test]
    async fn test_file_output_has_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("singers.ndjson");
        let source = Arc::new(CapturedSource::from_rows([
            (
                PartitionToken::root(),
                vec![child_partitions_row("2024-05-01T00:01:00Z", &["A"])],
            ),
            (PartitionToken::from("A"), vec![data_change_row(7)]),
        ]));

        watch_stream(
            WatchOptions::new("singers", window()),
            source,
            Arc::new(NdjsonSink::create(&path).await.unwrap()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0]["partition_token"], "");
        assert_eq!(
            lines[0]["child_partitions"]["child_partitions"][0]["token"],
            "A"
        );

        let change = &lines[1]["data_change"];
        assert_eq!(lines[1]["partition_token"], "A");
        assert_eq!(change["record_sequence"], "00000007");
        assert_eq!(change["mod_type"], "INSERT");
        assert_eq!(change["number_of_records_in_transaction"], 5);
        assert_eq!(change["column_types"][0]["type"]["code"], "INT64");
    }
}

mod config_tests {
    use floe::config::{Config, ConfigPath, SinkConfig, SourceConfig};
    use std::fs;

    #[test]
    fn test_config_directory_merges_streams() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("orders.yaml"),
            r#"
streams:
  orders:
    source:
      type: captured
      path: ./orders.ndjson
    start_timestamp: "2024-05-01T00:00:00Z"
    end_timestamp: "2024-05-01T00:05:00Z"
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("payments.yml"),
            r#"
streams:
  payments:
    source:
      type: captured
      path: ./payments.ndjson
    sink:
      type: file
      path: ./payments.out.ndjson
global:
  max_concurrent_partitions: 8
"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not yaml").unwrap();

        let config = Config::from_paths(&[ConfigPath::dir(dir.path())]).unwrap();
        assert_eq!(config.stream_count(), 2);
        assert_eq!(config.global.max_concurrent_partitions, Some(8));

        let streams: Vec<_> = config.streams().collect();
        let (_, orders) = streams
            .iter()
            .find(|(key, _)| key.id() == "orders")
            .unwrap();
        assert_eq!(
            orders.source,
            SourceConfig::Captured {
                path: "./orders.ndjson".to_string()
            }
        );
        assert_eq!(orders.sink, SinkConfig::Stdout);

        let (_, payments) = streams
            .iter()
            .find(|(key, _)| key.id() == "payments")
            .unwrap();
        assert_eq!(
            payments.sink,
            SinkConfig::File {
                path: "./payments.out.ndjson".to_string()
            }
        );
    }

    #[test]
    fn test_inverted_window_rejected() {
        let yaml = r#"
streams:
  orders:
    source:
      type: captured
      path: ./orders.ndjson
    start_timestamp: "2024-05-01T00:05:00Z"
    end_timestamp: "2024-05-01T00:00:00Z"
"#;
        assert!(Config::parse(yaml).is_err());
    }
}
