use drover_core::model::JobDeclaration;
use drover_core::{Environment, LogDir};
use std::path::PathBuf;

/// A throwaway playground for pipeline tests: a log directory, a data
/// directory for declared files, and helpers to build shell jobs whose
/// executions can be counted afterwards.
pub struct TestContext {
    pub _temp_dir: tempfile::TempDir,
    pub logs_root: PathBuf,
    pub data_root: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("drover-test-")
            .tempdir()
            .expect("Failed to create temp dir");
        let logs_root = temp_dir.path().join("logs");
        let data_root = temp_dir.path().join("data");
        fs_err::create_dir_all(&data_root).expect("Failed to create data dir");

        TestContext {
            _temp_dir: temp_dir,
            logs_root,
            data_root,
        }
    }

    pub fn logs(&self) -> LogDir {
        LogDir::new(&self.logs_root)
    }

    pub fn env(&self) -> Environment {
        Environment {
            user: "tester".to_string(),
            hostname: "testhost".to_string(),
            os: "linux",
            shell: PathBuf::from("/bin/sh"),
            runner: PathBuf::from("/usr/local/bin/drover"),
            at_bin: PathBuf::from("at"),
            qsub_bin: PathBuf::from("qsub"),
        }
    }

    /// Absolute path (as a string) of a file under the data directory.
    pub fn data_file(&self, name: &str) -> String {
        self.data_root.join(name).to_string_lossy().to_string()
    }

    /// Create a data file so it passes the pre-flight existence check.
    pub fn seed_file(&self, name: &str) -> String {
        let path = self.data_file(name);
        fs_err::write(&path, "seed\n").expect("Failed to seed data file");
        path
    }

    /// A shell job that appends one line to `<name>.count`, touches its
    /// declared outputs, and succeeds.
    pub fn counting_job(
        &self,
        name: &str,
        files_in: &[&str],
        files_out: &[&str],
    ) -> JobDeclaration {
        let mut command = format!("echo run >> '{}'", self.data_file(&format!("{}.count", name)));
        for out in files_out {
            command.push_str(&format!(" && touch '{}'", out));
        }
        let mut decl = JobDeclaration::new(command);
        decl.files_in = files_in.iter().map(|s| s.to_string()).collect();
        decl.files_out = files_out.iter().map(|s| s.to_string()).collect();
        decl
    }

    /// A job that fails without producing its declared outputs.
    pub fn failing_job(&self, files_in: &[&str], files_out: &[&str]) -> JobDeclaration {
        let mut decl = JobDeclaration::new("exit 1");
        decl.files_in = files_in.iter().map(|s| s.to_string()).collect();
        decl.files_out = files_out.iter().map(|s| s.to_string()).collect();
        decl
    }

    /// How many times the counting job `name` actually ran.
    pub fn run_count(&self, name: &str) -> usize {
        match fs_err::read_to_string(self.data_file(&format!("{}.count", name))) {
            Ok(content) => content.lines().count(),
            Err(_) => 0,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
