use nix::sys::signal::Signal;

use ojcore::{classify, JudgeStatus, Limits};

mod common;

fn limits() -> Limits {
  Limits {
    time_limit: 1000,
    memory_limit: 64 * 1024 * 1024,
    output_limit: 64_000_000,
    compile_timeout: 30_000,
    stack_limit: 8 * 1024 * 1024,
  }
}

#[test]
fn it_should_accept_clean_run() {
  common::setup();
  let (status, exit_code, message) = classify(Some(0), None, 42, 1024, 5, "", &limits());
  assert_eq!(status, JudgeStatus::Ok);
  assert_eq!(exit_code, 0);
  assert!(message.is_empty());
}

#[test]
fn it_should_detect_time_over_limit_on_clean_exit() {
  common::setup();
  let (status, _, _) = classify(Some(0), None, 1001, 1024, 0, "", &limits());
  assert_eq!(status, JudgeStatus::Tle);
}

#[test]
fn it_should_prefer_tle_over_mle_and_ole() {
  common::setup();
  // every limit violated at once, time wins
  let (status, _, _) = classify(
    Some(0),
    None,
    5000,
    512 * 1024 * 1024,
    65_000_000,
    "",
    &limits(),
  );
  assert_eq!(status, JudgeStatus::Tle);

  let (status, _, _) = classify(Some(0), None, 10, 512 * 1024 * 1024, 65_000_000, "", &limits());
  assert_eq!(status, JudgeStatus::Mle);

  let (status, _, _) = classify(Some(0), None, 10, 1024, 65_000_000, "", &limits());
  assert_eq!(status, JudgeStatus::Ole);
}

#[test]
fn it_should_accept_exact_limit_values() {
  common::setup();
  let limits = limits();
  let (status, _, _) = classify(
    Some(0),
    None,
    limits.time_limit,
    limits.memory_limit,
    limits.output_limit as usize,
    "",
    &limits,
  );
  assert_eq!(status, JudgeStatus::Ok);
}

#[test]
fn it_should_report_non_zero_exit_with_stderr_tail() {
  common::setup();
  let (status, exit_code, message) = classify(Some(42), None, 10, 1024, 0, "oops", &limits());
  assert_eq!(status, JudgeStatus::Re);
  assert_eq!(exit_code, 42);
  assert_eq!(message, "Program exited with non-zero code: 42\nStderr: oops");

  let (_, _, message) = classify(Some(1), None, 10, 1024, 0, "", &limits());
  assert_eq!(message, "Program exited with non-zero code: 1");
}

#[test]
fn it_should_map_sigxcpu_to_tle() {
  common::setup();
  let (status, exit_code, message) =
    classify(None, Some(Signal::SIGXCPU), 1500, 1024, 0, "", &limits());
  assert_eq!(status, JudgeStatus::Tle);
  assert_eq!(exit_code, 128 + Signal::SIGXCPU as i32);
  assert_eq!(message, "Time limit exceeded (SIGXCPU)");
}

#[test]
fn it_should_disambiguate_sigkill_by_peak_memory() {
  common::setup();
  let limits = limits();

  // the cgroup oom kill leaves the peak exactly at the cap
  let (status, exit_code, message) = classify(
    None,
    Some(Signal::SIGKILL),
    500,
    limits.memory_limit,
    0,
    "",
    &limits,
  );
  assert_eq!(status, JudgeStatus::Mle);
  assert_eq!(exit_code, 128 + Signal::SIGKILL as i32);
  assert_eq!(message, "Memory limit exceeded (cgroup)");

  let (status, _, message) = classify(None, Some(Signal::SIGKILL), 2500, 1024, 0, "", &limits);
  assert_eq!(status, JudgeStatus::Tle);
  assert_eq!(message, "Time limit exceeded (SIGKILL)");
}

#[test]
fn it_should_map_fatal_signals_to_re() {
  common::setup();
  let (status, exit_code, message) =
    classify(None, Some(Signal::SIGSEGV), 10, 1024, 0, "", &limits());
  assert_eq!(status, JudgeStatus::Re);
  assert_eq!(exit_code, 128 + Signal::SIGSEGV as i32);
  assert_eq!(message, "Segmentation fault");

  let (status, _, message) = classify(None, Some(Signal::SIGFPE), 10, 1024, 0, "", &limits());
  assert_eq!(status, JudgeStatus::Re);
  assert_eq!(message, "Floating point exception");

  let (status, _, message) = classify(None, Some(Signal::SIGTERM), 10, 1024, 0, "", &limits());
  assert_eq!(status, JudgeStatus::Re);
  assert_eq!(message, format!("Program terminated by signal {}", Signal::SIGTERM as i32));
}

#[test]
fn it_should_disambiguate_sigabrt_by_peak_memory() {
  common::setup();
  let limits = limits();

  let (status, _, message) = classify(
    None,
    Some(Signal::SIGABRT),
    10,
    limits.memory_limit + 1,
    0,
    "",
    &limits,
  );
  assert_eq!(status, JudgeStatus::Mle);
  assert_eq!(message, "Memory limit exceeded (allocation failed)");

  let (status, exit_code, message) =
    classify(None, Some(Signal::SIGABRT), 10, 1024, 0, "", &limits);
  assert_eq!(status, JudgeStatus::Re);
  assert_eq!(exit_code, 128 + Signal::SIGABRT as i32);
  assert_eq!(message, "Program aborted");
}

#[test]
fn it_should_classify_deterministically() {
  common::setup();
  let limits = limits();
  let first = classify(None, Some(Signal::SIGKILL), 1200, 1024, 16, "tail", &limits);
  let second = classify(None, Some(Signal::SIGKILL), 1200, 1024, 16, "tail", &limits);
  assert_eq!(first, second);
}
