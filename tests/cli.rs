#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    fn write_durations(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("durations.csv");
        fs::write(&path, "carrier,air_time\nWN,45\nWN,\nWN,80\nWN,62.5\n").unwrap();
        path
    }

    #[test]
    fn writes_one_summary_row_per_run() {
        let dir = tempdir().unwrap();
        let durations = write_durations(dir.path());

        assert_cmd::cargo::cargo_bin_cmd!("flight-contagion")
            .arg("--durations")
            .arg(&durations)
            .arg("--output-dir")
            .arg(dir.path())
            .args(["--runs", "3", "--horizon", "600", "--random-seed", "5"])
            .assert()
            .success();

        let summary = fs::read_to_string(dir.path().join("results.csv")).unwrap();
        let mut lines = summary.lines();
        assert_eq!(
            lines.next(),
            Some("run,total_flights,newly_infected,total_infected")
        );
        let runs: Vec<&str> = lines
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(runs, vec!["1", "2", "3"]);
    }

    #[test]
    fn same_seed_same_summary() {
        let dir = tempdir().unwrap();
        let durations = write_durations(dir.path());
        let mut outputs = Vec::new();
        for name in ["first", "second"] {
            let output_dir = dir.path().join(name);
            assert_cmd::cargo::cargo_bin_cmd!("flight-contagion")
                .arg("--durations")
                .arg(&durations)
                .arg("--output-dir")
                .arg(&output_dir)
                .args(["--runs", "2", "--horizon", "500", "--random-seed", "11"])
                .assert()
                .success();
            outputs.push(fs::read_to_string(output_dir.join("results.csv")).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn config_file_and_flight_report() {
        let dir = tempdir().unwrap();
        let durations = write_durations(dir.path());
        let config = dir.path().join("config.json");
        fs::write(
            &config,
            format!(
                r#"{{"horizon": 400.0, "runs": 1, "occupancy": 60, "flight_durations_file": {:?}}}"#,
                durations.display().to_string()
            ),
        )
        .unwrap();

        assert_cmd::cargo::cargo_bin_cmd!("flight-contagion")
            .arg("--config")
            .arg(&config)
            .arg("--output-dir")
            .arg(dir.path())
            .arg("--flight-report")
            .assert()
            .success();

        let flights = fs::read_to_string(dir.path().join("flights_run_1.csv")).unwrap();
        assert!(flights.starts_with(
            "flight_id,departure,duration,seeded,new_infections,infected,not_contagious"
        ));
        assert!(flights.lines().count() >= 2);
    }

    #[test]
    fn empty_durations_file_is_rejected() {
        let dir = tempdir().unwrap();
        let durations = dir.path().join("empty.csv");
        fs::write(&durations, "air_time\n").unwrap();

        let assert = assert_cmd::cargo::cargo_bin_cmd!("flight-contagion")
            .arg("--durations")
            .arg(&durations)
            .arg("--output-dir")
            .arg(dir.path())
            .assert()
            .failure();
        let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
        assert!(stderr.contains("configuration error"), "{stderr}");
        assert!(!dir.path().join("results.csv").exists());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let dir = tempdir().unwrap();
        let durations = write_durations(dir.path());

        assert_cmd::cargo::cargo_bin_cmd!("flight-contagion")
            .arg("--durations")
            .arg(&durations)
            .arg("--output-dir")
            .arg(dir.path())
            .args(["--log-level", "loud"])
            .assert()
            .failure();
    }
}
