#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn ptest_bin() -> &'static str {
    env!("CARGO_BIN_EXE_ptest")
}

/// fio stand-in. Checks the arguments it is called with, records the job
/// file path in `$FAKE_FIO_LOG`, and prints a fixed JSON report. Read-only
/// jobs report zero writes and write-only jobs report zero reads, as fio does.
/// `$FAKE_FIO_FAIL` makes it exit 1; `$FAKE_FIO_GARBAGE` makes it print
/// non-JSON text and exit 0.
const FAKE_FIO: &str = r#"#!/bin/sh
if [ "$2" != "--output-format=json" ]; then
    echo "fake fio: unexpected arguments: $*" >&2
    exit 2
fi
if [ ! -f "$1" ]; then
    echo "fake fio: job file $1 does not exist" >&2
    exit 2
fi
if [ -n "$FAKE_FIO_LOG" ]; then
    echo "$1" >> "$FAKE_FIO_LOG"
    cat "$1" >> "$FAKE_FIO_LOG"
fi
if [ -n "$FAKE_FIO_FAIL" ]; then
    echo "fio: injected failure" >&2
    exit 1
fi
if [ -n "$FAKE_FIO_GARBAGE" ]; then
    echo "fio: garbage out"
    exit 0
fi

RB=600000 RI=160000 RL=10000
WB=520000 WI=140000 WL=8000
case "$(grep -E '^rw=' "$1" | head -n 1)" in
    rw=randread|rw=read) WB=0 WI=0 WL=0 ;;
    rw=randwrite|rw=write) RB=0 RI=0 RL=0 ;;
esac

printf '{"fio version":"fio-3.36","jobs":[{"jobname":"fake","read":{"bw":%s,"iops":%s.0,"lat_ns":{"mean":%s.0}},"write":{"bw":%s,"iops":%s.0,"lat_ns":{"mean":%s.0}}}]}\n' \
    "$RB" "$RI" "$RL" "$WB" "$WI" "$WL"
"#;

/// Per-test sandbox: config dir, scratch dir, and a fake fio binary.
pub struct Sandbox {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub fio_bin: PathBuf,
    pub fio_log: PathBuf,
}

impl Sandbox {
    pub fn new(root: &Path) -> Self {
        let fio_bin = root.join("fake-fio");
        std::fs::write(&fio_bin, FAKE_FIO).expect("write fake fio");
        make_executable(&fio_bin);

        Sandbox {
            root: root.to_path_buf(),
            config_dir: root.join("fio"),
            scratch_dir: root.join("scratch"),
            fio_bin,
            fio_log: root.join("fio-calls.log"),
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_env(args, &[])
    }

    pub fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Output {
        let mut cmd = Command::new(ptest_bin());
        cmd.current_dir(&self.root)
            .env("PTEST_CONFIG_DIR", &self.config_dir)
            .env("PTEST_SCRATCH_DIR", &self.scratch_dir)
            .env("PTEST_FIO_BIN", &self.fio_bin)
            .env("FAKE_FIO_LOG", &self.fio_log)
            .env_remove("PTEST_NO_FAIL")
            .env_remove("FAKE_FIO_FAIL")
            .env_remove("FAKE_FIO_GARBAGE");
        for arg in args {
            cmd.arg(arg);
        }
        for (k, v) in env {
            cmd.env(k, v);
        }
        cmd.output().expect("run ptest")
    }

    /// Job files fio was handed, in call order.
    pub fn fio_calls(&self) -> String {
        std::fs::read_to_string(&self.fio_log).unwrap_or_default()
    }

    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.scratch_dir) {
            Ok(entries) => entries.map(|e| e.expect("dir entry").path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake fio");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

pub fn assert_ok(output: &Output, context: &str) {
    assert!(
        output.status.success(),
        "{context} failed (status {:?})\nstdout:\n{}\nstderr:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn assert_failed(output: &Output, context: &str) {
    assert!(
        !output.status.success(),
        "{context} unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
