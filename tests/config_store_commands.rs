//! Stored job management
//!
//! Acceptance criteria:
//! - `ptest add <name> --params <json>` writes `<config-dir>/<name>.fio`.
//! - `ptest list` prints stored job names, sorted, one per line.
//! - `ptest show <name>` prints each section header and its options.
//! - `ptest show` on an unknown name fails and names the job.
//! - `ptest del` removes the job; deleting a missing job still succeeds.
//! - Non-object JSON parameters are rejected without touching the store.

mod common;

use tempfile::TempDir;

#[test]
fn add_list_show_del_round_trip() {
    let tmp = TempDir::new().unwrap();
    let sb = common::Sandbox::new(tmp.path());

    let out = sb.run(&[
        "add",
        "seq1",
        "--params",
        r#"{"rw":"read","bs":"4k","size":"1G","direct":1}"#,
    ]);
    common::assert_ok(&out, "ptest add seq1");
    assert!(common::stdout_str(&out).contains("Test seq1 added"));

    let stored = std::fs::read_to_string(sb.config_dir.join("seq1.fio")).unwrap();
    assert!(stored.starts_with("[global]\n"), "unexpected file:\n{stored}");
    assert!(stored.contains("[seq1]\n"));
    assert!(stored.contains("direct=1\n"));

    let out = sb.run(&["add", "aaa", "--params", r#"{"rw":"write"}"#]);
    common::assert_ok(&out, "ptest add aaa");

    let out = sb.run(&["list"]);
    common::assert_ok(&out, "ptest list");
    assert_eq!(common::stdout_str(&out), "aaa\nseq1\n");

    let out = sb.run(&["show", "seq1"]);
    common::assert_ok(&out, "ptest show seq1");
    let shown = common::stdout_str(&out);
    assert!(shown.contains("[seq1]"), "unexpected show output:\n{shown}");
    assert!(shown.contains("    rw=read"), "unexpected show output:\n{shown}");
    assert!(shown.contains("    size=1G"), "unexpected show output:\n{shown}");

    let out = sb.run(&["del", "seq1"]);
    common::assert_ok(&out, "ptest del seq1");
    assert!(!sb.config_dir.join("seq1.fio").exists());

    let out = sb.run(&["del", "seq1"]);
    common::assert_ok(&out, "ptest del seq1 again");

    let out = sb.run(&["list"]);
    common::assert_ok(&out, "ptest list after del");
    assert_eq!(common::stdout_str(&out), "aaa\n");
}

#[test]
fn show_unknown_job_fails() {
    let tmp = TempDir::new().unwrap();
    let sb = common::Sandbox::new(tmp.path());

    let out = sb.run(&["show", "missing"]);
    common::assert_failed(&out, "ptest show missing");
    assert!(
        common::stderr_str(&out).contains("no stored fio job named 'missing'"),
        "stderr: {}",
        common::stderr_str(&out)
    );
}

#[test]
fn list_without_config_dir_is_empty() {
    let tmp = TempDir::new().unwrap();
    let sb = common::Sandbox::new(tmp.path());

    let out = sb.run(&["list"]);
    common::assert_ok(&out, "ptest list");
    assert_eq!(common::stdout_str(&out), "");
}

#[test]
fn add_rejects_non_object_params() {
    let tmp = TempDir::new().unwrap();
    let sb = common::Sandbox::new(tmp.path());

    let out = sb.run(&["add", "bad", "--params", r#"["rw","read"]"#]);
    common::assert_failed(&out, "ptest add with array params");
    assert!(common::stderr_str(&out).contains("invalid job parameters"));
    assert!(!sb.config_dir.join("bad.fio").exists());
}
