/// Integration tests for workload generation and the workload directory.
use simparity_backends::{ByteTokenizer, WhitespaceTokenizer};
use simparity_core::workload::{
    load_workload_meta, PROMPTS_FILE, TRACE_INTERVALS_FILE, TRACE_LENGTHS_FILE,
};
use simparity_core::*;

fn corpus(n: usize) -> Vec<PromptRecord> {
    (0..n)
        .map(|i| {
            let words: Vec<String> = (0..(i % 7 + 1)).map(|w| format!("w{}", w)).collect();
            PromptRecord::new(format!("prompt-{:03}", i), words.join(" "))
        })
        .collect()
}

#[test]
fn test_fixed_interval_workload() {
    let generated = generate_workload(
        corpus(5),
        &WhitespaceTokenizer::new(),
        32,
        &ArrivalScheduleConfig::fixed_interval(10),
        None,
    )
    .unwrap();

    let arrivals: Vec<i64> = generated.spec.iter().map(|r| r.arrival_time_ns).collect();
    assert_eq!(arrivals, vec![0, 10, 20, 30, 40]);
    let gaps: Vec<i64> = generated.intervals.iter().map(|r| r.inter_arrival_ns).collect();
    assert_eq!(gaps, vec![0, 10, 10, 10, 10]);

    let prefill: Vec<u64> = generated
        .spec
        .iter()
        .map(|r| r.num_prefill_tokens)
        .collect();
    assert_eq!(prefill, vec![1, 2, 3, 4, 5]);
    assert!(generated.spec.iter().all(|r| r.num_decode_tokens == 32));
    assert_eq!(generated.spec.get(3).unwrap().prompt_id, "prompt-003");
}

#[test]
fn test_regeneration_is_byte_identical() {
    let arrival = ArrivalScheduleConfig::poisson(3.0, 2024);
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();

    for dir in [a.path(), b.path()] {
        let generated =
            generate_workload(corpus(40), &ByteTokenizer::new(), 16, &arrival, None).unwrap();
        write_workload(dir, &generated).unwrap();
    }

    for file in [PROMPTS_FILE, TRACE_LENGTHS_FILE, TRACE_INTERVALS_FILE] {
        let left = std::fs::read(a.path().join(file)).unwrap();
        let right = std::fs::read(b.path().join(file)).unwrap();
        assert_eq!(left, right, "{} differs between regenerations", file);
    }

    let meta_a = load_workload_meta(a.path()).unwrap().unwrap();
    let meta_b = load_workload_meta(b.path()).unwrap().unwrap();
    assert_eq!(meta_a.workload_id, meta_b.workload_id);
    assert_eq!(meta_a.arrival, arrival);
    assert_eq!(meta_a.tokenizer, "byte");
}

#[test]
fn test_load_workload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let generated = generate_workload(
        corpus(12),
        &WhitespaceTokenizer::new(),
        8,
        &ArrivalScheduleConfig::poisson(100.0, 1),
        Some("roundtrip"),
    )
    .unwrap();
    write_workload(dir.path(), &generated).unwrap();

    let loaded = load_workload(dir.path()).unwrap();
    assert_eq!(loaded, generated.spec);
    assert_eq!(loaded.len(), 12);
}

#[test]
fn test_load_workload_missing_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let generated = generate_workload(
        corpus(3),
        &WhitespaceTokenizer::new(),
        8,
        &ArrivalScheduleConfig::fixed_interval(0),
        Some("w"),
    )
    .unwrap();
    write_workload(dir.path(), &generated).unwrap();

    // Drop one prompt from the corpus on disk
    write_prompts_jsonl(&dir.path().join(PROMPTS_FILE), &generated.prompts[..2]).unwrap();
    match load_workload(dir.path()).unwrap_err() {
        Error::MissingData(msg) => assert!(msg.contains("prompt-002"), "{}", msg),
        other => panic!("Expected MissingData, got {other:?}"),
    }
}

#[test]
fn test_load_workload_schema_violation() {
    let dir = tempfile::tempdir().unwrap();
    let generated = generate_workload(
        corpus(2),
        &WhitespaceTokenizer::new(),
        8,
        &ArrivalScheduleConfig::fixed_interval(5),
        Some("w"),
    )
    .unwrap();
    write_workload(dir.path(), &generated).unwrap();

    std::fs::write(
        dir.path().join(TRACE_INTERVALS_FILE),
        "request_id,gap\n0,0\n1,5\n",
    )
    .unwrap();
    match load_workload(dir.path()).unwrap_err() {
        Error::SchemaViolation { missing, .. } => {
            assert_eq!(missing, vec!["inter_arrival_ns", "arrival_time_ns"]);
        }
        other => panic!("Expected SchemaViolation, got {other:?}"),
    }
}

#[test]
fn test_invalid_config_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let prompts_path = dir.path().join("corpus.jsonl");
    write_prompts_jsonl(&prompts_path, &corpus(3)).unwrap();

    let mut config = SimParityConfig::default();
    config.workload.arrival = ArrivalScheduleConfig::poisson(-1.0, 0);
    let out = dir.path().join("workload");
    let result = generate_workload_dir(&config, &prompts_path, &out);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(!out.exists());
}

#[test]
fn test_generate_workload_dir_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let prompts_path = dir.path().join("corpus.jsonl");
    write_prompts_jsonl(&prompts_path, &corpus(4)).unwrap();

    let config = SimParityConfig::from_str(
        r#"
[workload]
workload_id = "from-config"
num_decode_tokens = 3

[workload.arrival]
kind = "fixed_interval"
inter_arrival_ns = 1000
"#,
    )
    .unwrap();
    let out = dir.path().join("w");
    let generated = generate_workload_dir(&config, &prompts_path, &out).unwrap();
    assert_eq!(generated.meta.workload_id, "from-config");
    assert_eq!(generated.meta.params["workload"]["num_decode_tokens"], 3);

    let loaded = load_workload(&out).unwrap();
    assert_eq!(loaded.span_ns(), 3000);
}
