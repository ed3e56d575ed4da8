//! fio invocation.
//!
//! Every run writes its job file to a unique path under the scratch directory:
//!   <scratch>/<run id>-<sequence>.fio
//! The run id is random per process and the sequence is a process-wide counter,
//! so concurrent harness processes never share a path. The file is removed on
//! every exit path by `TempArtifact`'s drop.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::error::HarnessError;
use crate::metrics::{self, ResultRecord};
use crate::store::{JobFile, ParamSet, JOB_FILE_SUFFIX};

static ARTIFACT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn run_id() -> &'static str {
    static RUN_ID: OnceLock<String> = OnceLock::new();
    RUN_ID.get_or_init(|| uuid::Uuid::new_v4().simple().to_string())
}

fn artifact_path(scratch_dir: &Path) -> PathBuf {
    let seq = ARTIFACT_COUNTER.fetch_add(1, Ordering::Relaxed);
    scratch_dir.join(format!("{}-{seq}{JOB_FILE_SUFFIX}", run_id()))
}

/// A temporary job file, deleted when dropped.
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn write(scratch_dir: &Path, job: &JobFile) -> Result<Self, HarnessError> {
        let path = artifact_path(scratch_dir);
        let to_error = |source| HarnessError::ArtifactWrite {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(scratch_dir).map_err(to_error)?;
        // Construct the guard first so a partial write is still cleaned up.
        let artifact = TempArtifact { path: path.clone() };
        std::fs::write(&path, job.to_ini()).map_err(to_error)?;
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "cannot remove temporary job file"
                );
            }
        }
    }
}

// ─── Executors ────────────────────────────────────────────────────────────────

/// Where fio runs.
pub trait Executor {
    /// Run fio against a local job file and return its captured output.
    fn run_fio(&self, fio_bin: &str, job_path: &Path) -> Result<Output, HarnessError>;
}

fn spawn(mut cmd: Command, what: &str) -> Result<Output, HarnessError> {
    tracing::debug!(command = ?cmd, "spawning {what}");
    cmd.stdin(Stdio::null())
        .output()
        .map_err(|e| HarnessError::Invocation {
            status: format!("cannot start {what}"),
            stderr: e.to_string(),
        })
}

fn ensure_success(output: Output, what: &str) -> Result<Output, HarnessError> {
    if output.status.success() {
        return Ok(output);
    }
    Err(HarnessError::Invocation {
        status: format!("{what} exited with {}", output.status),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

pub struct LocalExecutor;

impl Executor for LocalExecutor {
    fn run_fio(&self, fio_bin: &str, job_path: &Path) -> Result<Output, HarnessError> {
        let mut cmd = Command::new(fio_bin);
        cmd.arg(job_path).arg("--output-format=json");
        spawn(cmd, "fio")
    }
}

/// Runs fio on a remote target reached through user-supplied commands.
///
/// The copy template receives `{src}` and `{dst}` placeholders, for example
/// `scp {src} root@10.0.0.2:{dst}`. The exec prefix gets the remote command
/// line appended as a single argument, for example `ssh root@10.0.0.2`.
pub struct RemoteExecutor {
    copy_template: Vec<String>,
    exec_prefix: Vec<String>,
    remote_dir: String,
}

impl RemoteExecutor {
    pub fn new(
        copy_template: &str,
        exec_prefix: &str,
        remote_dir: &str,
    ) -> Result<Self, HarnessError> {
        let copy_template: Vec<String> = copy_template
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let exec_prefix: Vec<String> = exec_prefix
            .split_whitespace()
            .map(str::to_string)
            .collect();

        if exec_prefix.is_empty() {
            return Err(HarnessError::InvalidParams(
                "remote exec prefix is empty".to_string(),
            ));
        }
        let has = |placeholder: &str| copy_template.iter().any(|a| a.contains(placeholder));
        if copy_template.is_empty() || !has("{src}") || !has("{dst}") {
            return Err(HarnessError::InvalidParams(
                "remote copy template must contain {src} and {dst}".to_string(),
            ));
        }

        Ok(RemoteExecutor {
            copy_template,
            exec_prefix,
            remote_dir: remote_dir.trim_end_matches('/').to_string(),
        })
    }

    fn remote_path(&self, job_path: &Path) -> String {
        let file_name = job_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{}/{file_name}", self.remote_dir)
    }

    fn copy(&self, src: &Path, dst: &str) -> Result<(), HarnessError> {
        let src = src.to_string_lossy();
        let argv: Vec<String> = self
            .copy_template
            .iter()
            .map(|a| a.replace("{src}", &src).replace("{dst}", dst))
            .collect();
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        ensure_success(spawn(cmd, "remote copy")?, "remote copy").map(|_| ())
    }

    fn exec(&self, remote_command: &str) -> Result<Output, HarnessError> {
        let mut cmd = Command::new(&self.exec_prefix[0]);
        cmd.args(&self.exec_prefix[1..]).arg(remote_command);
        spawn(cmd, "remote command")
    }
}

impl Executor for RemoteExecutor {
    fn run_fio(&self, fio_bin: &str, job_path: &Path) -> Result<Output, HarnessError> {
        let remote_path = self.remote_path(job_path);
        self.copy(job_path, &remote_path)?;
        let output = self.exec(&format!("{fio_bin} {remote_path} --output-format=json"));

        match self.exec(&format!("rm -f {remote_path}")) {
            Ok(out) if out.status.success() => {}
            Ok(out) => tracing::warn!(
                path = %remote_path,
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "cannot remove remote job file"
            ),
            Err(e) => {
                tracing::warn!(path = %remote_path, error = %e, "cannot remove remote job file")
            }
        }

        output
    }
}

// ─── Runner ───────────────────────────────────────────────────────────────────

/// Runs one parameter set and returns its parsed result.
pub trait JobRunner {
    fn run_params(&self, job_name: &str, params: &ParamSet) -> Result<ResultRecord, HarnessError>;
}

pub struct FioRunner {
    fio_bin: String,
    scratch_dir: PathBuf,
    executor: Box<dyn Executor>,
}

impl FioRunner {
    pub fn new(
        fio_bin: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
        executor: Box<dyn Executor>,
    ) -> Self {
        FioRunner {
            fio_bin: fio_bin.into(),
            scratch_dir: scratch_dir.into(),
            executor,
        }
    }

    pub fn local(fio_bin: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self::new(fio_bin, scratch_dir, Box::new(LocalExecutor))
    }

    /// Run a job file and return fio's JSON output.
    pub fn run(&self, job: &JobFile) -> Result<String, HarnessError> {
        let artifact = TempArtifact::write(&self.scratch_dir, job)?;
        tracing::debug!(path = %artifact.path().display(), "running fio");

        let output = self.executor.run_fio(&self.fio_bin, artifact.path())?;
        let output = ensure_success(output, "fio")?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    pub fn run_and_extract(&self, job: &JobFile) -> Result<ResultRecord, HarnessError> {
        let raw = self.run(job)?;
        metrics::extract(&raw)
    }
}

impl JobRunner for FioRunner {
    fn run_params(&self, job_name: &str, params: &ParamSet) -> Result<ResultRecord, HarnessError> {
        let record = self.run_and_extract(&JobFile::single_job(job_name, params))?;
        let [read, write] = record.summary_lines();
        tracing::debug!(job = job_name, "{read}");
        tracing::debug!(job = job_name, "{write}");
        Ok(record)
    }
}
