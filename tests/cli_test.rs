use std::path::PathBuf;
use std::process::{Command, Output};
use tempdir::TempDir;

/// Runs the binary inside a scratch directory with no API key in the environment.
struct TestEnv {
    _temp_dir: TempDir,
    work_dir: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new("cli").expect("Failed to create temp directory");
        let work_dir = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            work_dir,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_generate-images"))
            .args(args)
            .current_dir(&self.work_dir)
            .env_remove("OPENAI_API_KEY")
            .env_remove("IMAGE_OUTPUT_DIR")
            .env_remove("OPENAI_API_BASE")
            .output()
            .expect("Failed to execute generate-images")
    }
}

#[test]
fn missing_key_is_reported_before_reading_the_manifest() {
    let env = TestEnv::new();

    let output = env.run(&["--manifest", "does-not-exist.json"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {stderr}");
    assert!(stderr.contains("export"), "stderr: {stderr}");
    assert!(!stderr.contains("manifest"), "stderr: {stderr}");
}

#[test]
fn missing_key_exits_without_creating_the_output_directory() {
    let env = TestEnv::new();

    let output = env.run(&["--output", "out/images"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(!env.work_dir.join("out").exists());
}

#[test]
fn list_needs_no_key() {
    let env = TestEnv::new();

    let output = env.run(&["--list", "--only", "team-photo.jpg"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.starts_with("team-photo.jpg: "));
}
