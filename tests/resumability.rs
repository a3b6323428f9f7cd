//! Whole-batch runs: resuming, failure handling and folder accounting.

mod resumability_tests {
    use shardfix::testing::{ShardTreeBuilder, read_gz_lines, write_gz_lines};
    use shardfix::{
        BatchError, ConfigError, ConvertConfig, DatasetKind, FailurePolicy, ParseMode,
        ProgressTracker, run_batch,
    };
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const FOLDERS: [&str; 3] = [
        "updated_date=2024-01-01",
        "updated_date=2024-01-02",
        "updated_date=2024-01-03",
    ];

    fn build(root: &Path) -> Vec<PathBuf> {
        let mut builder = ShardTreeBuilder::new(root.join("raw/2024-05-01/works"));
        for folder in FOLDERS {
            builder = builder
                .shard(folder, "part_000.gz", &["{\"id\":\"W1\"}", "{\"id\":\"W2\"}"])
                .shard(folder, "part_001.gz", &["{\"id\":\"W3\",\"host_venue\":null}"]);
        }
        builder.build().unwrap()
    }

    fn config(root: &Path) -> ConvertConfig {
        let mut c = ConvertConfig::new(
            "2024-05-01",
            DatasetKind::Works,
            root.join("raw"),
            root.join("out"),
        );
        c.concurrency = 3;
        c
    }

    fn output_for(root: &Path, input: &Path) -> PathBuf {
        let rel = input.strip_prefix(root.join("raw")).unwrap();
        root.join("out").join(rel)
    }

    #[test]
    fn test_second_run_skips_everything() {
        let dir = TempDir::new().unwrap();
        let inputs = build(dir.path());
        let config = config(dir.path());

        let first = ProgressTracker::new();
        run_batch(&config, &first).unwrap();
        let s = first.snapshot();
        assert_eq!(s.files_total, 6);
        assert_eq!(s.files_completed, 6);
        assert_eq!(s.records_total, 9);
        assert_eq!(s.folders_completed, 3);
        assert!(s.max_in_flight <= 3);

        let before: Vec<Vec<u8>> = inputs
            .iter()
            .map(|p| fs::read(output_for(dir.path(), p)).unwrap())
            .collect();

        let second = ProgressTracker::new();
        run_batch(&config, &second).unwrap();
        let s = second.snapshot();
        assert_eq!(s.files_skipped, 6);
        assert_eq!(s.files_completed, 0);
        assert_eq!(s.records_total, 0);
        assert_eq!(s.folders_completed, 3);

        let after: Vec<Vec<u8>> = inputs
            .iter()
            .map(|p| fs::read(output_for(dir.path(), p)).unwrap())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_leftover_partial_is_not_treated_as_done() {
        let dir = TempDir::new().unwrap();
        let inputs = build(dir.path());
        let target = output_for(dir.path(), &inputs[0]);
        let partial = PathBuf::from(format!("{}.partial", target.display()));
        fs::create_dir_all(partial.parent().unwrap()).unwrap();
        fs::write(&partial, b"truncated garbage").unwrap();

        let progress = ProgressTracker::new();
        run_batch(&config(dir.path()), &progress).unwrap();

        assert_eq!(progress.snapshot().files_skipped, 0);
        assert!(!partial.exists());
        assert_eq!(read_gz_lines(&target).unwrap().len(), 2);
    }

    #[test]
    fn test_only_missing_outputs_are_converted() {
        let dir = TempDir::new().unwrap();
        let inputs = build(dir.path());
        write_gz_lines(&output_for(dir.path(), &inputs[1]), &["{}"]).unwrap();

        let progress = ProgressTracker::new();
        run_batch(&config(dir.path()), &progress).unwrap();
        let s = progress.snapshot();
        assert_eq!((s.files_completed, s.files_skipped), (5, 1));
        assert_eq!(s.records_total, 8);
    }

    #[test]
    fn test_batch_range_limits_folders() {
        let dir = TempDir::new().unwrap();
        build(dir.path());
        let mut c = config(dir.path());
        c.batch_range = Some("2-3".parse().unwrap());

        let progress = ProgressTracker::new();
        run_batch(&c, &progress).unwrap();
        let s = progress.snapshot();
        assert_eq!(s.folders_total, 2);
        assert_eq!(s.files_completed, 4);
        assert!(!dir.path().join("out/2024-05-01/works").join(FOLDERS[0]).exists());
    }

    #[test]
    fn test_abort_policy_stops_admitting_units() {
        let dir = TempDir::new().unwrap();
        build(dir.path());
        write_gz_lines(
            &dir.path().join("raw/2024-05-01/works").join(FOLDERS[0]).join("part_000.gz"),
            &["{broken"],
        )
        .unwrap();

        let mut c = config(dir.path());
        c.concurrency = 1;
        c.pipeline.parse_mode = ParseMode::Strict;

        let progress = ProgressTracker::new();
        let err = run_batch(&c, &progress).unwrap_err();
        let batch = err.downcast_ref::<BatchError>().unwrap();
        assert_eq!(batch.admitted, 1);
        assert_eq!(batch.failures.len(), 1);
        assert!(batch.failures[0].label.ends_with("part_000.gz"));

        let s = progress.snapshot();
        assert_eq!(s.files_failed, 1);
        assert_eq!(s.files_completed, 0);
        assert!(s.in_flight.is_empty());
    }

    #[test]
    fn test_continue_policy_converts_the_rest() {
        let dir = TempDir::new().unwrap();
        build(dir.path());
        write_gz_lines(
            &dir.path().join("raw/2024-05-01/works").join(FOLDERS[1]).join("part_001.gz"),
            &["{broken"],
        )
        .unwrap();

        let mut c = config(dir.path());
        c.pipeline.parse_mode = ParseMode::Strict;
        c.failure_policy = FailurePolicy::Continue;

        let progress = ProgressTracker::new();
        let err = run_batch(&c, &progress).unwrap_err();
        let batch = err.downcast_ref::<BatchError>().unwrap();
        assert_eq!(batch.admitted, 6);
        assert_eq!(batch.failures.len(), 1);

        let s = progress.snapshot();
        assert_eq!((s.files_completed, s.files_failed), (5, 1));
        // The folder holding the failed shard stays incomplete.
        assert_eq!(s.folders_completed, 2);
    }

    #[test]
    fn test_summary_json_is_written() {
        let dir = TempDir::new().unwrap();
        build(dir.path());
        let mut c = config(dir.path());
        let summary = dir.path().join("summary.json");
        c.summary_json = Some(summary.clone());

        run_batch(&c, &ProgressTracker::new()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
        assert_eq!(json["records_total"], 9);
        assert_eq!(json["files_total"], 6);
    }

    #[test]
    fn test_missing_input_root_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = run_batch(&config(dir.path()), &ProgressTracker::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingInputRoot(_))
        ));
    }
}
