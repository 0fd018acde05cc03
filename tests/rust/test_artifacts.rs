/// Integration tests for persisted tables and run directories.
use simparity_core::artifacts::{read_table, write_table, Table};
use simparity_core::metrics::{REQUEST_METRICS_FILE, TOKEN_METRICS_FILE};
use simparity_core::*;
use std::path::Path;

fn round_trip<T: Table + PartialEq + std::fmt::Debug>(dir: &Path, name: &str, rows: &[T]) -> String {
    let path = dir.join(name);
    write_table(&path, rows).unwrap();
    let loaded: Vec<T> = read_table(&path).unwrap();
    assert_eq!(loaded, rows, "{} did not round-trip", name);
    std::fs::read_to_string(&path).unwrap()
}

fn request_rows() -> Vec<RequestMetricsRow> {
    vec![
        RequestMetricsRow {
            request_id: 0,
            arrival_time_ns: 0,
            first_token_time_ns: 1_234_567_890_123,
            ttft_ns: 1_234_567_890_123,
            completion_time_ns: 2_000_000_000_000,
            num_prefill_tokens: 512,
            num_decode_tokens: 128,
            num_decode_tokens_actual: 127,
            status: RequestStatus::Ok,
            backend: Some("synthetic".to_string()),
        },
        RequestMetricsRow {
            request_id: 1,
            arrival_time_ns: 500,
            first_token_time_ns: 400,
            ttft_ns: -100,
            completion_time_ns: 900,
            num_prefill_tokens: 3,
            num_decode_tokens: 2,
            num_decode_tokens_actual: 2,
            status: RequestStatus::Ok,
            backend: None,
        },
        RequestMetricsRow {
            request_id: 2,
            arrival_time_ns: 1_000,
            first_token_time_ns: 1_000,
            ttft_ns: 0,
            completion_time_ns: 1_000,
            num_prefill_tokens: 3,
            num_decode_tokens: 2,
            num_decode_tokens_actual: 0,
            status: RequestStatus::Error,
            backend: None,
        },
    ]
}

fn token_rows() -> Vec<TokenMetricsRow> {
    vec![
        TokenMetricsRow {
            request_id: 0,
            token_index: 0,
            token_time_ns: 1_234_567_890_123,
            token_latency_ns: 0,
            token_id: Some(151_643),
        },
        TokenMetricsRow {
            request_id: 0,
            token_index: 1,
            token_time_ns: 1_234_580_390_123,
            token_latency_ns: 12_500_000,
            token_id: None,
        },
    ]
}

#[test]
fn test_all_tables_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let intervals = build_schedule(4, &ArrivalScheduleConfig::poisson(1.5, 11)).unwrap();
    let text = round_trip(dir.path(), "trace_intervals.csv", &intervals);
    assert!(text.starts_with("request_id,inter_arrival_ns,arrival_time_ns\n"));

    let lengths = vec![
        LengthRow {
            request_id: 0,
            prompt_id: "has,comma".to_string(),
            num_prefill_tokens: 17,
            num_decode_tokens: 64,
        },
        LengthRow {
            request_id: 1,
            prompt_id: "quote\"d".to_string(),
            num_prefill_tokens: 0,
            num_decode_tokens: 64,
        },
    ];
    round_trip(dir.path(), "trace_lengths.csv", &lengths);

    let text = round_trip(dir.path(), REQUEST_METRICS_FILE, &request_rows());
    assert!(text.contains(",-100,"));
    assert!(text.contains(",error,"));

    let text = round_trip(dir.path(), TOKEN_METRICS_FILE, &token_rows());
    assert!(text.contains("0,1,1234580390123,12500000,\n"));
}

#[test]
fn test_integers_stay_integers() {
    let dir = tempfile::tempdir().unwrap();
    let text = round_trip(dir.path(), REQUEST_METRICS_FILE, &request_rows());
    for line in text.lines().skip(1) {
        assert!(!line.contains('.'), "non-integer cell in {:?}", line);
    }
}

#[test]
fn test_token_id_column_optional_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(TOKEN_METRICS_FILE);
    std::fs::write(
        &path,
        "token_latency_ns,token_time_ns,token_index,request_id\n0,10,0,3\n5,15,1,3\n",
    )
    .unwrap();
    let rows: Vec<TokenMetricsRow> = read_table(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].token_latency_ns, 5);
    assert_eq!(rows[1].request_id, 3);
    assert_eq!(rows[1].token_id, None);
}

#[test]
fn test_request_metrics_missing_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(REQUEST_METRICS_FILE);
    std::fs::write(&path, "request_id,arrival_time_ns,ttft_ns\n0,0,5\n").unwrap();
    match read_table::<RequestMetricsRow>(&path).unwrap_err() {
        Error::SchemaViolation { context, missing } => {
            assert!(context.contains("request_metrics"), "{}", context);
            assert_eq!(
                missing,
                vec![
                    "first_token_time_ns",
                    "completion_time_ns",
                    "num_prefill_tokens",
                    "num_decode_tokens",
                    "num_decode_tokens_actual",
                    "status",
                ]
            );
        }
        other => panic!("Expected SchemaViolation, got {other:?}"),
    }
}

#[test]
fn test_run_directory_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let meta = RunMeta::new(RunType::Real, "real_rt")
        .with_workload_id("w")
        .with_backend("synthetic");
    let run = RunMetrics {
        request_metrics: request_rows(),
        token_metrics: token_rows(),
        run_meta: meta.clone(),
    };
    write_run(dir.path(), &run).unwrap();

    let loaded = load_run(dir.path()).unwrap();
    assert_eq!(loaded.request_metrics, run.request_metrics);
    assert_eq!(loaded.token_metrics, run.token_metrics);
    assert_eq!(loaded.run_meta, meta);
    assert_eq!(loaded.error_count(), 1);
    assert_eq!(loaded.negative_ttft_count(), 1);
}

#[test]
fn test_load_run_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(load_run(dir.path()).unwrap_err(), Error::Io(_)));
}

#[test]
fn test_percentile_table_empty_cells() {
    let dir = tempfile::tempdir().unwrap();
    let rows = compare(&[1.0, 2.0], &[], &[0.5]).unwrap();
    let text = round_trip(dir.path(), "ttft_percentiles.csv", &rows);
    assert_eq!(text, "metric,real_ns,sim_ns\np50,1.5,\n");
}
