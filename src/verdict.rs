use std::fmt::{Display, Formatter};

use nix::sys::signal::Signal;

use crate::limits::Limits;

/// Verdict of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeStatus {
  Ok,
  Tle,
  Mle,
  Re,
  Ce,
  Ole,
  Se,
}

impl JudgeStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      JudgeStatus::Ok => "OK",
      JudgeStatus::Tle => "TLE",
      JudgeStatus::Mle => "MLE",
      JudgeStatus::Re => "RE",
      JudgeStatus::Ce => "CE",
      JudgeStatus::Ole => "OLE",
      JudgeStatus::Se => "SE",
    }
  }
}

impl Display for JudgeStatus {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Classify the terminated child.
///
/// `status` and `signal` carry the wait outcome the way the run stage
/// observes it: a normal exit code or the terminating signal, never
/// both. Returns the verdict, the reported exit code (`128 + signal`
/// for signal terminations) and the error message.
///
/// On a clean exit the violations are checked in the order time,
/// memory, output: a program that both exceeds the time limit and the
/// memory limit is reported TLE. All clean-exit thresholds are strict,
/// so a run that lands exactly on a limit passes. On the signal path
/// the memory test is `>=` instead: a cgroup OOM kill leaves
/// `memory.peak` exactly at `memory.max`.
pub fn classify(
  status: Option<i32>,
  signal: Option<Signal>,
  time_used: u64,
  mem_used: u64,
  output_len: usize,
  stderr_output: &str,
  limits: &Limits,
) -> (JudgeStatus, i32, String) {
  if let Some(code) = status {
    if code == 0 {
      if time_used > limits.time_limit {
        (JudgeStatus::Tle, 0, String::new())
      } else if mem_used > limits.memory_limit {
        (JudgeStatus::Mle, 0, String::new())
      } else if output_len as u64 > limits.output_limit {
        (JudgeStatus::Ole, 0, String::new())
      } else {
        (JudgeStatus::Ok, 0, String::new())
      }
    } else {
      let mut message = format!("Program exited with non-zero code: {}", code);
      if !stderr_output.is_empty() {
        message.push_str(&format!("\nStderr: {}", stderr_output));
      }
      (JudgeStatus::Re, code, message)
    }
  } else if let Some(signal) = signal {
    let exit_code = 128 + signal as i32;
    let (status, message) = match signal {
      Signal::SIGXCPU => (JudgeStatus::Tle, "Time limit exceeded (SIGXCPU)".to_string()),
      Signal::SIGKILL => {
        if mem_used >= limits.memory_limit {
          (JudgeStatus::Mle, "Memory limit exceeded (cgroup)".to_string())
        } else {
          (JudgeStatus::Tle, "Time limit exceeded (SIGKILL)".to_string())
        }
      }
      Signal::SIGSEGV => (JudgeStatus::Re, "Segmentation fault".to_string()),
      Signal::SIGFPE => (JudgeStatus::Re, "Floating point exception".to_string()),
      Signal::SIGABRT => {
        if mem_used >= limits.memory_limit {
          (JudgeStatus::Mle, "Memory limit exceeded (allocation failed)".to_string())
        } else {
          (JudgeStatus::Re, "Program aborted".to_string())
        }
      }
      signal => (
        JudgeStatus::Re,
        format!("Program terminated by signal {}", signal as i32),
      ),
    };
    (status, exit_code, message)
  } else {
    // waitpid reported neither an exit nor a signal
    (JudgeStatus::Se, -1, "Unknown wait status".to_string())
  }
}
