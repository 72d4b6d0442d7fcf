use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::info;
use nix::sys::signal::Signal;
use nix::unistd::Uid;
use tempfile::TempDir;

use ojcore::{judge, JudgeStatus};

mod common;

const DEFAULT_LIMITS: &str = r#"{
  "time_limit": 1000,
  "memory_limit": 65536,
  "output_limit": 64000000,
  "compile_timeout": 30000,
  "stack_limit": 8192
}"#;

fn has_toolchain() -> bool {
  Command::new("g++").arg("--version").output().is_ok()
}

/// Running a submission needs root and a cgroup v2 root with the memory
/// controller delegated
fn has_sandbox() -> bool {
  Uid::effective().is_root()
    && fs::read_to_string("/sys/fs/cgroup/cgroup.subtree_control")
      .map(|text| text.contains("memory"))
      .unwrap_or(false)
}

fn judge_fixture(fixture: &str, limits: &str, input: &str) -> ojcore::JudgeResult {
  let dir = TempDir::new().unwrap();
  let limits_file = dir.path().join("limits.json");
  let input_file = dir.path().join("input.txt");
  fs::write(&limits_file, limits).unwrap();
  fs::write(&input_file, input).unwrap();

  let source = PathBuf::from(format!("fixtures/{}", fixture));
  info!("Judging fixture {}", fixture);
  judge(limits_file.as_path(), source.as_path(), input_file.as_path())
}

fn leftover_judge_nodes() -> usize {
  fs::read_dir("/sys/fs/cgroup")
    .map(|entries| {
      entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("judge_"))
        .count()
    })
    .unwrap_or(0)
}

#[test]
fn it_should_report_compile_error() {
  common::setup();
  let _guard = common::lock();
  if !has_toolchain() {
    eprintln!("skipped: g++ is not available");
    return;
  }

  let result = judge_fixture("ce.cpp", DEFAULT_LIMITS, "");
  assert_eq!(result.status, JudgeStatus::Ce);
  assert!(!result.error_message.is_empty());
  assert_eq!(result.mem_used, 0);
  assert_eq!(result.allocated_cpu, "");
  assert!(!Path::new("fixtures/ce.cpp.out").exists());
}

#[test]
fn it_should_accept_hello() {
  common::setup();
  let _guard = common::lock();
  if !has_toolchain() || !has_sandbox() {
    eprintln!("skipped: needs g++, root and cgroup v2");
    return;
  }

  let before = leftover_judge_nodes();
  let result = judge_fixture("ac.cpp", DEFAULT_LIMITS, "");
  assert_eq!(result.status, JudgeStatus::Ok, "{}", result.error_message);
  assert_eq!(result.exit_code, 0);
  assert_eq!(result.stdout_content, "hello");
  assert_eq!(result.output_len, 5);
  assert!(result.time_used <= 1000);
  assert!(result.mem_used > 0);
  assert!(!result.allocated_cpu.is_empty());

  // the per-run node must not survive the run
  assert_eq!(leftover_judge_nodes(), before);
  assert!(!Path::new("fixtures/ac.cpp.out").exists());
}

#[test]
fn it_should_kill_spinning_program() {
  common::setup();
  let _guard = common::lock();
  if !has_toolchain() || !has_sandbox() {
    eprintln!("skipped: needs g++, root and cgroup v2");
    return;
  }

  let result = judge_fixture("tle.cpp", DEFAULT_LIMITS, "");
  assert_eq!(result.status, JudgeStatus::Tle, "{}", result.error_message);
  assert!(result.time_used >= 1000);
  let xcpu = 128 + Signal::SIGXCPU as i32;
  let kill = 128 + Signal::SIGKILL as i32;
  assert!(result.exit_code == xcpu || result.exit_code == kill);
}

#[test]
fn it_should_kill_memory_hog() {
  common::setup();
  let _guard = common::lock();
  if !has_toolchain() || !has_sandbox() {
    eprintln!("skipped: needs g++, root and cgroup v2");
    return;
  }

  let result = judge_fixture("mle.cpp", DEFAULT_LIMITS, "");
  assert_eq!(result.status, JudgeStatus::Mle, "{}", result.error_message);
  assert!(result.mem_used >= 64 * 1024 * 1024);
  let kill = 128 + Signal::SIGKILL as i32;
  let abrt = 128 + Signal::SIGABRT as i32;
  assert!(result.exit_code == kill || result.exit_code == abrt);
}

#[test]
fn it_should_report_segfault() {
  common::setup();
  let _guard = common::lock();
  if !has_toolchain() || !has_sandbox() {
    eprintln!("skipped: needs g++, root and cgroup v2");
    return;
  }

  let result = judge_fixture("segv.cpp", DEFAULT_LIMITS, "");
  assert_eq!(result.status, JudgeStatus::Re, "{}", result.error_message);
  assert!(result.error_message.contains("Segmentation fault"));
  assert_eq!(result.exit_code, 128 + Signal::SIGSEGV as i32);
}

#[test]
fn it_should_report_output_over_limit() {
  common::setup();
  let _guard = common::lock();
  if !has_toolchain() || !has_sandbox() {
    eprintln!("skipped: needs g++, root and cgroup v2");
    return;
  }

  // pipes are not subject to RLIMIT_FSIZE, so the capture sees the
  // whole overflow and the clean-exit branch decides
  let limits = r#"{"time_limit": 1000, "memory_limit": 65536, "output_limit": 32}"#;
  let result = judge_fixture("ole.cpp", limits, "");
  assert_eq!(result.status, JudgeStatus::Ole, "{}", result.error_message);
  assert_eq!(result.output_len, 100);
}

#[test]
fn it_should_pin_the_reported_core() {
  common::setup();
  let _guard = common::lock();
  if !has_toolchain() || !has_sandbox() {
    eprintln!("skipped: needs g++, root and cgroup v2");
    return;
  }

  let result = judge_fixture("affinity.cpp", DEFAULT_LIMITS, "");
  assert_eq!(result.status, JudgeStatus::Ok, "{}", result.error_message);
  assert_eq!(result.stdout_content, result.allocated_cpu);
}

#[test]
fn it_should_report_se_without_privilege() {
  common::setup();
  let _guard = common::lock();
  if !has_toolchain() || has_sandbox() {
    eprintln!("skipped: needs g++ and an unprivileged environment");
    return;
  }

  let result = judge_fixture("ac.cpp", DEFAULT_LIMITS, "");
  assert_eq!(result.status, JudgeStatus::Se);
  assert!(!result.error_message.is_empty());
  assert_eq!(result.exit_code, -1);
  assert_eq!(result.allocated_cpu, "");
}
