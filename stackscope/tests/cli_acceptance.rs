use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    work: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let work = base.join("work");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");
        fs::create_dir_all(&work).expect("failed to create work dir");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
            work,
        }
    }

    /// Copy a core fixture log into the work directory.
    fn seed_fixture(&self, name: &str) -> PathBuf {
        let source = fixture_path(name);
        let target = self.work.join(name);
        fs::copy(source, &target).expect("failed to copy fixture log");
        target
    }

    fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.work.join("config.toml");
        fs::write(&path, contents).expect("failed to write config");
        path
    }
}

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../stackscope-core/tests/fixtures")
        .join(name)
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("stackscope"));

    Command::new(bin_path)
        .args(args)
        .current_dir(&env.work)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute stackscope: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    panic!(
        "stackscope {rendered_args} failed with status {:?}\nstdout:\n{stdout}\nstderr:\n{stderr}",
        output.status.code()
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn analyze_prints_full_report() {
    let env = CliTestEnv::new();
    let log = path_arg(&env.seed_fixture("basic.log"));
    let args = ["analyze", log.as_str()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let text = stdout(&output);
    assert!(text.contains("STACKSCOPE PROCESSING REPORT"));
    assert!(text.contains("Conversion"));
    assert!(text.contains("Registration"));
    assert!(text.contains("00:12:30"), "total elapsed missing:\n{text}");
    assert!(text.contains("120 in, 95 out"));
}

#[test]
fn analyze_is_idempotent() {
    let env = CliTestEnv::new();
    let log = path_arg(&env.seed_fixture("siril-session.log"));
    let args = ["analyze", log.as_str()];

    let first = run_bin(&env, &args);
    let second = run_bin(&env, &args);
    assert_success(&args, &first);
    assert_success(&args, &second);
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn analyze_empty_log_succeeds() {
    let env = CliTestEnv::new();
    let log = path_arg(&env.seed_fixture("empty.log"));
    let args = ["analyze", log.as_str()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert!(stdout(&output).contains("No data extracted from this log."));
}

#[test]
fn analyze_interrupted_run_succeeds() {
    let env = CliTestEnv::new();
    let log = path_arg(&env.seed_fixture("partial.log"));
    let args = ["analyze", log.as_str()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let text = stdout(&output);
    assert!(text.contains("abandoned"), "missing abandoned phase:\n{text}");
    assert!(text.contains("Some phases never finished"));
}

#[test]
fn analyze_missing_log_reports_critical_finding() {
    let env = CliTestEnv::new();
    let missing = path_arg(&env.work.join("missing.log"));
    let args = ["analyze", missing.as_str()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let text = stdout(&output);
    assert!(text.contains("CRITICAL"));
    assert!(text.contains("missing.log"));
}

#[test]
fn analyze_output_writes_file() {
    let env = CliTestEnv::new();
    let log = path_arg(&env.seed_fixture("siril-session.log"));
    let report_path = env.work.join("report.txt");
    let report = path_arg(&report_path);
    let args = ["analyze", log.as_str(), "--output", report.as_str()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    assert!(stdout(&output).contains("Report saved to:"));
    let saved = fs::read_to_string(&report_path).expect("report file should exist");
    assert!(saved.contains("[2] IMAGE WATERFALL"));

    // Same bytes as the printed report
    let printed = run_bin(&env, &["analyze", log.as_str()]);
    assert_eq!(printed.stdout, saved.as_bytes());
}

#[test]
fn analyze_unwritable_output_fails_cleanly() {
    let env = CliTestEnv::new();
    let log = path_arg(&env.seed_fixture("basic.log"));
    let report_path = env.work.join("no/such/dir/report.txt");
    let report = path_arg(&report_path);

    let output = run_bin(&env, &["analyze", log.as_str(), "-o", report.as_str()]);

    assert!(!output.status.success());
    assert!(!report_path.exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to save report"));
}

#[test]
fn analyze_waterfall_only() {
    let env = CliTestEnv::new();
    let log = path_arg(&env.seed_fixture("siril-session.log"));
    let args = ["analyze", log.as_str(), "--waterfall-only"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let text = stdout(&output);
    assert!(text.contains("IMAGE PROCESSING WATERFALL"));
    assert!(!text.contains("[1] PHASE TIMINGS"));
}

#[test]
fn analyze_json_format() {
    let env = CliTestEnv::new();
    let log = path_arg(&env.seed_fixture("basic.log"));
    let args = ["analyze", log.as_str(), "--format", "json"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let text = stdout(&output);
    assert!(text.trim_start().starts_with('{'));
    assert!(text.contains("\"phases\""));
    assert!(text.contains("\"conversion\""));
}

#[test]
fn usage_errors_exit_non_zero() {
    let env = CliTestEnv::new();

    let no_path = run_bin(&env, &["analyze"]);
    assert!(!no_path.status.success());

    let log = path_arg(&env.seed_fixture("basic.log"));
    let conflicting = run_bin(
        &env,
        &["analyze", log.as_str(), "--waterfall-only", "--format", "json"],
    );
    assert!(!conflicting.status.success());

    let unknown = run_bin(&env, &["frobnicate"]);
    assert!(!unknown.status.success());
}

#[test]
fn rules_lists_rules_and_detectors() {
    let env = CliTestEnv::new();
    let args = ["rules"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let text = stdout(&output);
    assert!(text.contains("Pattern rules (rule set v"));
    assert!(text.contains("siril.plate_solve"));
    assert!(text.contains("Detectors:"));
    assert!(text.contains("core.repeated_failure"));
    assert!(!text.contains("(disabled)"));
}

#[test]
fn config_disables_detectors() {
    let env = CliTestEnv::new();
    let config = env.write_config(
        "[detectors]\n\
         disabled = [\"core.timing_gap\"]\n",
    );
    let config = path_arg(&config);
    let log = path_arg(&env.seed_fixture("siril-session.log"));

    let rules_args = ["--config", config.as_str(), "rules"];
    let rules = run_bin(&env, &rules_args);
    assert_success(&rules_args, &rules);
    assert!(stdout(&rules).contains("(disabled)"));

    let analyze_args = ["--config", config.as_str(), "analyze", log.as_str()];
    let output = run_bin(&env, &analyze_args);
    assert_success(&analyze_args, &output);
    assert!(!stdout(&output).contains("core.timing_gap"));
}

#[test]
fn broken_default_config_falls_back_to_defaults() {
    let env = CliTestEnv::new();
    let config_dir = env.xdg_config.join("stackscope");
    fs::create_dir_all(&config_dir).expect("failed to create config dir");
    fs::write(config_dir.join("config.toml"), "[detectors\nnot toml")
        .expect("failed to write config");
    let log = path_arg(&env.seed_fixture("basic.log"));
    let args = ["analyze", log.as_str()];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    assert!(stdout(&output).contains("STACKSCOPE PROCESSING REPORT"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("using defaults"), "stderr:\n{stderr}");
}

#[test]
fn invalid_config_is_an_error() {
    let env = CliTestEnv::new();
    let config = path_arg(&env.write_config("[detectors\nnot toml"));
    let log = path_arg(&env.seed_fixture("basic.log"));

    let output = run_bin(&env, &["--config", config.as_str(), "analyze", log.as_str()]);
    assert!(!output.status.success());
}
