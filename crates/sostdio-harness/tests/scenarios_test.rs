use sostdio_harness::scenarios::{SCENARIOS, run_and_log};
use sostdio_harness::structured_log::{LogEmitter, validate_log_file};

// Scenarios compare global metric deltas, so they run from a single test.
#[test]
fn every_scenario_passes_and_logs_valid_jsonl() {
    let dir = std::env::temp_dir().join(format!("sostdio-scenarios-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let log = dir.join("run.jsonl");

    let results = {
        let mut emitter = LogEmitter::to_file(&log, "test").unwrap();
        run_and_log(&dir, &mut emitter).unwrap()
    };

    assert_eq!(results.len(), SCENARIOS.len());
    for r in &results {
        assert!(r.passed, "{} failed: {:?}", r.name, r.message);
    }

    let (lines, errors) = validate_log_file(&log).unwrap();
    assert!(errors.is_empty(), "log errors: {errors:?}");
    // run_start + one per scenario + run_summary
    assert_eq!(lines, SCENARIOS.len() + 2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn scenario_names_are_unique() {
    let mut names: Vec<_> = SCENARIOS.iter().map(|s| s.name).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), SCENARIOS.len());
}
