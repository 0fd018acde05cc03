/// End-to-end tests: workload -> real replay -> sim ingestion -> report.
use simparity_backends::{
    BackendError, RealBackend, SyntheticBackend, SyntheticBackendConfig, TokenEvent,
};
use simparity_core::metrics::REQUEST_METRICS_FILE;
use simparity_core::report::{SUMMARY_FILE, TABLES_DIR, TOKEN_LATENCY_TABLE_FILE, TTFT_TABLE_FILE};
use simparity_core::sim_adapter::{sim_trace_rows, SimTraceRow};
use simparity_core::*;
use std::path::Path;
use std::rc::Rc;

const CONFIG: &str = r#"
[workload]
workload_id = "e2e"
num_decode_tokens = 4

[workload.arrival]
kind = "fixed_interval"
inter_arrival_ns = 1000000000

[real]
run_id = "real-e2e"
max_sleep_ms = 50

[real.synthetic]
prefill_tokens_per_sec = 1000
decode_tokens_per_sec = 100
stop_after_tokens = 3

[sim]
run_id = "sim-e2e"

[compare]
comparison_id = "cmp-e2e"
percentiles = [0.5, 1.0]
"#;

fn write_corpus(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("corpus.jsonl");
    std::fs::write(
        &path,
        "{\"prompt_id\": \"short\", \"text\": \"a b\"}\n{\"prompt_id\": \"long\", \"text\": \"a b c d\"}\n",
    )
    .unwrap();
    path
}

fn write_sim_metrics(path: &Path) {
    std::fs::write(
        path,
        "Request Id,request_e2e_time,prefill_e2e_time,request_num_tokens\n\
         0,0.035,0.005,6\n\
         1,0.033,0.003,8\n",
    )
    .unwrap();
}

#[test]
fn test_full_pipeline_through_directories() {
    let root = tempfile::tempdir().unwrap();
    let config = SimParityConfig::from_str(CONFIG).unwrap();

    let workload_dir = root.path().join("workload");
    let corpus = write_corpus(root.path());
    generate_workload_dir(&config, &corpus, &workload_dir).unwrap();

    // Real replay on a virtual clock far from zero
    let clock = Rc::new(ManualClock::starting_at_ns(5_000_000_000));
    let real_dir = root.path().join("real");
    let real = run_real(&config, &workload_dir, &real_dir, clock.clone()).unwrap();

    let ttft: Vec<i64> = real.request_metrics.iter().map(|r| r.ttft_ns).collect();
    assert_eq!(ttft, vec![2_000_000, 4_000_000]);
    let r1 = &real.request_metrics[1];
    assert_eq!(r1.first_token_time_ns, 1_004_000_000);
    assert_eq!(r1.completion_time_ns, 1_024_000_000);
    assert_eq!(r1.num_decode_tokens, 4);
    assert_eq!(r1.num_decode_tokens_actual, 3);
    assert_eq!(real.run_meta.run_id, "real-e2e");
    assert_eq!(real.run_meta.workload_id.as_deref(), Some("e2e"));
    // The wait loop never slept longer than its bound
    assert!(clock.longest_sleep_ns() <= 50_000_000);

    // Simulator round
    let trace_path = root.path().join("sim_trace.csv");
    let spec = load_workload(&workload_dir).unwrap();
    write_sim_trace(&trace_path, &spec).unwrap();
    let trace: Vec<SimTraceRow> = simparity_core::artifacts::read_table(&trace_path).unwrap();
    assert_eq!(trace, sim_trace_rows(&spec));
    assert_eq!(trace[1].arrived_at, 1.0);
    assert_eq!(trace[1].num_prefill_tokens, 4);

    let sim_csv = root.path().join("sim_request_metrics.csv");
    write_sim_metrics(&sim_csv);
    let sim_dir = root.path().join("sim");
    let sim = ingest_sim(&config, &workload_dir, &sim_csv, &sim_dir).unwrap();
    assert_eq!(sim.run_meta.run_id, "sim-e2e");
    assert_eq!(sim.token_metrics.len(), 8);
    let sim_times: Vec<i64> = sim
        .token_metrics
        .iter()
        .filter(|t| t.request_id == 0)
        .map(|t| t.token_time_ns)
        .collect();
    assert_eq!(sim_times, vec![5_000_000, 15_000_000, 25_000_000, 35_000_000]);

    // Compare
    let report_dir = root.path().join("report");
    let report = compare_runs(&config, &real_dir, &sim_dir, &report_dir).unwrap();
    assert_eq!(report.ttft[0].metric, "p50");
    assert_eq!(report.ttft[0].real_ns, Some(3_000_000.0));
    assert_eq!(report.ttft[0].sim_ns, Some(4_000_000.0));
    assert_eq!(report.ttft[1].metric, "p100");
    assert_eq!(report.ttft[1].sim_ns, Some(5_000_000.0));
    assert_eq!(report.token_latency[0].real_ns, Some(10_000_000.0));
    assert_eq!(report.token_latency[0].sim_ns, Some(10_000_000.0));
    assert_eq!(report.real.aligned_tokens, 6);
    assert_eq!(report.sim.aligned_tokens, 6);
    assert_eq!(report.real.error_count, 0);

    let tables = report_dir.join(TABLES_DIR);
    let ttft_csv = std::fs::read_to_string(tables.join(TTFT_TABLE_FILE)).unwrap();
    assert_eq!(
        ttft_csv,
        "metric,real_ns,sim_ns\np50,3000000.0,4000000.0\np100,4000000.0,5000000.0\n"
    );
    assert!(tables.join(TOKEN_LATENCY_TABLE_FILE).exists());
    let summary = std::fs::read_to_string(report_dir.join(SUMMARY_FILE)).unwrap();
    assert!(summary.contains("`real-e2e`"));
    assert!(summary.contains("interpolated"));

    let meta: RunMeta =
        simparity_core::artifacts::read_json(&report_dir.join("run_meta.json")).unwrap();
    assert_eq!(meta.run_id, "cmp-e2e");
    assert_eq!(meta.run_type, RunType::Compare);
    assert_eq!(meta.workload_id.as_deref(), Some("e2e"));
}

#[test]
fn test_sim_missing_request_aborts_before_writing() {
    let root = tempfile::tempdir().unwrap();
    let config = SimParityConfig::from_str(CONFIG).unwrap();
    let workload_dir = root.path().join("workload");
    let corpus = write_corpus(root.path());
    generate_workload_dir(&config, &corpus, &workload_dir).unwrap();

    let sim_csv = root.path().join("partial.csv");
    std::fs::write(&sim_csv, "Request Id,request_e2e_time,prefill_e2e_time\n0,0.1,0.01\n").unwrap();
    let sim_dir = root.path().join("sim");
    match ingest_sim(&config, &workload_dir, &sim_csv, &sim_dir).unwrap_err() {
        Error::MissingData(msg) => assert!(msg.contains("request_id 1"), "{}", msg),
        other => panic!("Expected MissingData, got {other:?}"),
    }
    assert!(!sim_dir.join(REQUEST_METRICS_FILE).exists());
}

/// Delegates to the synthetic backend but fails chosen prompts.
struct FlakyBackend {
    inner: SyntheticBackend,
    fail_on: &'static str,
}

impl RealBackend for FlakyBackend {
    fn warmup(&mut self) -> std::result::Result<(), BackendError> {
        self.inner.warmup()
    }

    fn run_request(
        &mut self,
        prompt: &str,
        max_new_tokens: u64,
    ) -> std::result::Result<Vec<TokenEvent>, BackendError> {
        if prompt == self.fail_on {
            return Err(BackendError::Request("CUDA out of memory".to_string()));
        }
        self.inner.run_request(prompt, max_new_tokens)
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[test]
fn test_execution_failure_visible_in_report() {
    let prompts = vec![
        PromptRecord::new("ok-1", "one two"),
        PromptRecord::new("bad", "three"),
        PromptRecord::new("ok-2", "four five six"),
    ];
    let workload = generate_workload(
        prompts,
        &simparity_backends::WhitespaceTokenizer::new(),
        2,
        &ArrivalScheduleConfig::fixed_interval(100_000_000),
        Some("flaky"),
    )
    .unwrap()
    .spec;

    let clock = Rc::new(ManualClock::new());
    let synthetic = SyntheticBackendConfig {
        prefill_tokens_per_sec: 1000.0,
        decode_tokens_per_sec: 100.0,
        startup_time_ms: 0,
        stop_after_tokens: None,
    };
    let mut backend = FlakyBackend {
        inner: SyntheticBackend::new(synthetic, clock.clone()),
        fail_on: "three",
    };
    let real = replay_real(
        &workload,
        &mut backend,
        clock.as_ref(),
        &ReplayOptions::default(),
        RunMeta::new(RunType::Real, "real-flaky"),
    )
    .unwrap();
    assert_eq!(real.error_request_ids(), vec![1]);
    assert_eq!(real.request_metrics[1].backend.as_deref(), Some("flaky"));

    let timings: Vec<simparity_core::sim_adapter::SimRequestTiming> = (0..3)
        .map(|id| simparity_core::sim_adapter::SimRequestTiming {
            request_id: id,
            request_e2e_time: 0.02,
            prefill_e2e_time: 0.01,
        })
        .collect();
    let sim = standardize_sim_outputs(&workload, &timings, RunMeta::new(RunType::Sim, "sim-flaky"))
        .unwrap();

    let report = build_report(&real, &sim, &ReportOptions::default()).unwrap();
    assert_eq!(report.real.error_count, 1);
    assert_eq!(report.real.error_request_ids, vec![1]);
    // Error row contributes ttft_ns = 0 unless excluded
    assert_eq!(report.ttft[0].real_ns, Some(2_000_000.0));
    assert_eq!(report.ttft[0].sim_ns, Some(10_000_000.0));
    // The failed request has no aligned tokens on either side
    assert!(report.sim.aligned_tokens == 4 && report.real.aligned_tokens == 4);

    let excluded = build_report(
        &real,
        &sim,
        &ReportOptions {
            exclude_errors: true,
            ..ReportOptions::default()
        },
    )
    .unwrap();
    assert_eq!(excluded.ttft[0].real_ns, Some(2_500_000.0));
    assert_eq!(excluded.real.error_count, 1);
    assert!(format_table(&excluded).contains("Errors: 1 real / 0 sim"));
}
