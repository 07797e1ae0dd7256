mod common;

use common::{MemorySink, ScriptedRemoteSink};
use futures::stream;
use rask_cloud_logging::engine::EngineConfig;
use rask_cloud_logging::sink::Sink;
use rask_cloud_logging::transport::{TransportSummary, ndjson_records, pump};
use rask_cloud_logging::{Engine, RawLogRecord, Severity};
use serde_json::json;
use tracing_test::traced_test;

fn records(n: usize) -> Vec<RawLogRecord> {
    (0..n)
        .map(|i| RawLogRecord::from_value(json!({"level": 30, "msg": format!("record {i}"), "seq": i})))
        .collect()
}

#[tokio::test]
#[traced_test]
async fn test_rejected_record_does_not_stop_stream() {
    let sink = ScriptedRemoteSink::rejecting(&[2]);
    let engine = Engine::with_sink(
        EngineConfig {
            project_id: Some("proj".to_string()),
            ..EngineConfig::default()
        },
        Sink::Async(sink.clone()),
    );

    let summary = pump(&engine, stream::iter(records(5))).await;

    assert_eq!(
        summary,
        TransportSummary {
            delivered: 4,
            failed: 1
        }
    );
    let delivered: Vec<u64> = sink
        .written()
        .iter()
        .map(|(_, entry)| entry.json_payload["seq"].as_u64().unwrap())
        .collect();
    assert_eq!(delivered, vec![0, 1, 3, 4]);
    assert!(logs_contain("Failed to write log record"));
    assert!(logs_contain("403"));
}

#[tokio::test]
async fn test_empty_stream() {
    let sink = MemorySink::new();
    let engine = Engine::with_sink(EngineConfig::stdout(), Sink::Sync(sink.clone()));

    let summary = pump(&engine, stream::iter(Vec::<RawLogRecord>::new())).await;
    assert_eq!(summary.total(), 0);
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn test_ndjson_input_is_shipped_in_order() {
    let sink = MemorySink::new();
    let engine = Engine::with_sink(EngineConfig::stdout(), Sink::Sync(sink.clone()));

    let input = concat!(
        "{\"level\":30,\"time\":1000,\"msg\":\"started\"}\n",
        "not json at all\n",
        "\n",
        "{\"level\":50,\"msg\":\"failed\",\"err\":{\"type\":\"Error\",\"message\":\"x\",\"stack\":\"Error: x\"}}\n",
    );
    let summary = pump(&engine, ndjson_records(input.as_bytes())).await;
    assert_eq!(summary.delivered, 3);

    let entries = sink.entries();
    assert_eq!(entries[0].message(), Some("started"));
    assert_eq!(entries[0].severity(), Severity::Info);
    assert_eq!(entries[1].message(), Some("not json at all"));
    assert_eq!(entries[1].severity(), Severity::Default);
    assert_eq!(entries[2].message(), Some("failed\nError: x"));
    assert_eq!(entries[2].severity(), Severity::Error);
}

#[tokio::test]
async fn test_undecodable_line_keeps_later_records() {
    let sink = MemorySink::new();
    let engine = Engine::with_sink(EngineConfig::stdout(), Sink::Sync(sink.clone()));

    let input: &[u8] = b"{\"msg\":\"first\"}\nbad \xff\xfe line\n{\"msg\":\"second\"}\n{\"msg\":\"third\"}\n";
    let summary = pump(&engine, ndjson_records(input)).await;

    assert_eq!(
        summary,
        TransportSummary {
            delivered: 4,
            failed: 0
        }
    );
    let messages: Vec<Option<String>> = sink
        .entries()
        .iter()
        .map(|entry| entry.message().map(str::to_string))
        .collect();
    assert_eq!(messages[0].as_deref(), Some("first"));
    assert!(messages[1].as_deref().unwrap().starts_with("bad "));
    assert_eq!(messages[2].as_deref(), Some("second"));
    assert_eq!(messages[3].as_deref(), Some("third"));
}
