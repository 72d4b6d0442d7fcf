use std::convert::Infallible;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::libc;
use nix::sys::resource::{getrusage, setrlimit, Resource, UsageWho};
use nix::sys::select::{select, FdSet};
use nix::sys::signal::{kill, Signal};
use nix::sys::stat::Mode;
use nix::sys::time::{TimeVal, TimeValLike};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, dup2, fork, ForkResult, Pid};

use crate::cgroup::JudgeCgroup;
use crate::error::JudgeError;
use crate::limits::Limits;
use crate::pipe::{JudgePipe, JudgeReadPipe};
use crate::result::JudgeResult;
use crate::verdict::classify;

/// Whole seconds granted to the child, rounded up from the millisecond
/// time limit
fn time_limit_seconds(limits: &Limits) -> u64 {
  (limits.time_limit as f64 / 1000.0).ceil() as u64
}

/// Install the per-process ceilings inside the child.
///
/// The CPU hard limit sits one second above the soft limit, giving the
/// kernel a grace second to raise SIGXCPU before escalating to SIGKILL.
/// RLIMIT_NPROC of 1 keeps the child from forking.
fn set_resource_limit(limits: &Limits) -> Result<(), JudgeError> {
  let time_limit = time_limit_seconds(limits);
  setrlimit(Resource::RLIMIT_CPU, time_limit, time_limit + 1)?;
  setrlimit(Resource::RLIMIT_STACK, limits.stack_limit, limits.stack_limit)?;
  setrlimit(Resource::RLIMIT_FSIZE, limits.output_limit, limits.output_limit)?;
  setrlimit(Resource::RLIMIT_NPROC, 1, 1)?;
  Ok(())
}

/// Child side between fork and exec: descriptor wiring, rlimits, exec.
/// Only async-signal-safe-adjacent calls, no logging, no allocation
/// beyond the argv strings.
fn child_setup(
  executable: &Path,
  input_file: &Path,
  limits: &Limits,
  stdout_pipe: &JudgePipe,
  stderr_pipe: &JudgePipe,
) -> Result<Infallible, JudgeError> {
  let input_fd = open(input_file, OFlag::O_RDONLY, Mode::empty())?;
  dup2(input_fd, libc::STDIN_FILENO)?;
  unistd::close(input_fd)?;

  dup2(stdout_pipe.write_fd(), libc::STDOUT_FILENO)?;
  dup2(stderr_pipe.write_fd(), libc::STDERR_FILENO)?;
  stdout_pipe.close_both()?;
  stderr_pipe.close_both()?;

  set_resource_limit(limits)?;

  let program = CString::new(executable.as_os_str().as_bytes())
    .map_err(|_| JudgeError::exec("executable path contains NUL"))?;
  let args = [program.clone()];
  Ok(unistd::execv(&program, &args)?)
}

/// Run the compiled executable under the per-run cgroup.
///
/// Sandbox faults are reported as SE results; only unexpected kernel
/// errors propagate as `JudgeError` for the orchestrator's catch-all.
pub fn run_program<P: AsRef<Path>>(
  executable: P,
  input_file: P,
  limits: &Limits,
) -> Result<JudgeResult, JudgeError> {
  let executable = executable.as_ref();
  let input_file = input_file.as_ref();

  let mut cgroup = JudgeCgroup::new();
  if cgroup.create().is_err() {
    return Ok(JudgeResult::system_error(
      "Failed to create cgroup (requires root privilege)",
    ));
  }
  if cgroup.set_memory_limit(limits.memory_limit).is_err() {
    return Ok(JudgeResult::system_error("Failed to set memory limit in cgroup"));
  }
  if cgroup.set_cpu_limit().is_err() {
    return Ok(JudgeResult::system_error("Failed to set CPU limit in cgroup"));
  }
  let allocated_cpu = cgroup.get_allocated_cpu();
  debug!("Cgroup {} pinned to cpu {}", cgroup.name(), allocated_cpu);

  let stdout_pipe = match JudgePipe::new() {
    Ok(pipe) => pipe,
    Err(_) => return Ok(JudgeResult::system_error("Failed to create pipes")),
  };
  let stderr_pipe = match JudgePipe::new() {
    Ok(pipe) => pipe,
    Err(_) => return Ok(JudgeResult::system_error("Failed to create pipes")),
  };

  let start = Instant::now();

  match unsafe { fork() } {
    Ok(ForkResult::Parent { child, .. }) => supervise(
      child,
      cgroup,
      allocated_cpu,
      stdout_pipe,
      stderr_pipe,
      start,
      limits,
    ),
    Ok(ForkResult::Child) => {
      let _ = child_setup(executable, input_file, limits, &stdout_pipe, &stderr_pipe);
      unsafe { libc::_exit(1) }
    }
    Err(_) => Ok(JudgeResult::system_error("Failed to fork process")),
  }
}

/// Supervisor side: enroll, pin, drain, reap, measure, classify.
/// The cgroup node is dropped on return, always after the child has
/// been reaped.
fn supervise(
  child: Pid,
  cgroup: JudgeCgroup,
  allocated_cpu: String,
  stdout_pipe: JudgePipe,
  stderr_pipe: JudgePipe,
  start: Instant,
  limits: &Limits,
) -> Result<JudgeResult, JudgeError> {
  info!("Start judging child process (pid = {})", child);

  if cgroup.add_process(child).is_err() {
    let _ = kill(child, Signal::SIGKILL);
    let _ = waitpid(child, None);
    return Ok(JudgeResult::system_error("Failed to add process to cgroup"));
  }

  // Defense in depth atop cpuset.cpus; a failure here is only a warning
  let mut warning = String::new();
  match allocated_cpu.parse::<usize>() {
    Ok(cpu_id) => {
      if let Err(err) = cgroup.force_cpu_binding(child, cpu_id) {
        warn!("Force CPU affinity on pid {} fails: {}", child, err);
        warning.push_str("Warning: Failed to set CPU affinity; ");
      }
    }
    Err(_) => {
      warn!("Allocated cpu {:?} is not a core index", allocated_cpu);
    }
  }

  // A fault between enrollment and reaping must not leak the child
  let (stdout_bytes, stderr_bytes) = match capture_output(stdout_pipe, stderr_pipe, limits) {
    Ok(captured) => captured,
    Err(err) => {
      let _ = kill(child, Signal::SIGKILL);
      let _ = waitpid(child, None);
      return Err(err);
    }
  };

  let wait_status = match waitpid(child, None) {
    Ok(status) => status,
    Err(_) => {
      return Ok(JudgeResult {
        allocated_cpu,
        ..JudgeResult::system_error("Failed to wait for child process")
      });
    }
  };
  let time_used = start.elapsed().as_millis() as u64;

  // memory.peak when the kernel provides it; scaled ru_maxrss (KiB on
  // Linux) otherwise
  let mem_used = cgroup.get_memory_peak().unwrap_or_else(|| {
    getrusage(UsageWho::RUSAGE_CHILDREN)
      .map(|usage| (usage.max_rss() as u64).saturating_mul(1024))
      .unwrap_or(0)
  });

  let stdout_content = String::from_utf8_lossy(&stdout_bytes).into_owned();
  let stderr_content = String::from_utf8_lossy(&stderr_bytes).into_owned();
  let output_len = stdout_content.len();

  let (status, signal) = match wait_status {
    WaitStatus::Exited(pid, code) => {
      info!("Child process #{} exited with status {}", pid, code);
      (Some(code), None)
    }
    WaitStatus::Signaled(pid, signal, _) => {
      info!("Child process #{} is signaled by {}", pid, signal);
      (None, Some(signal))
    }
    status => {
      warn!("Unexpected wait status: {:?}", status);
      (None, None)
    }
  };

  let (status, exit_code, message) = classify(
    status,
    signal,
    time_used,
    mem_used,
    output_len,
    &stderr_content,
    limits,
  );

  Ok(JudgeResult {
    status,
    time_used,
    mem_used,
    exit_code,
    error_message: format!("{}{}", warning, message),
    stdout_content,
    output_len,
    allocated_cpu,
  })
}

/// Close the write ends and drain both capture pipes. The read ends
/// are closed on return, before the child is reaped.
fn capture_output(
  stdout_pipe: JudgePipe,
  stderr_pipe: JudgePipe,
  limits: &Limits,
) -> Result<(Vec<u8>, Vec<u8>), JudgeError> {
  let stdout_pipe = stdout_pipe.into_read()?;
  let stderr_pipe = stderr_pipe.into_read()?;

  let deadline = Duration::from_secs(time_limit_seconds(limits) + 1);
  drain_pipes(&stdout_pipe, &stderr_pipe, deadline)
}

/// Drain both capture pipes with select until each reports end of file,
/// or until the wall deadline expires. The deadline only stops the
/// capture; the child itself is bounded by RLIMIT_CPU and memory.max.
fn drain_pipes(
  stdout_pipe: &JudgeReadPipe,
  stderr_pipe: &JudgeReadPipe,
  deadline: Duration,
) -> Result<(Vec<u8>, Vec<u8>), JudgeError> {
  let deadline = Instant::now() + deadline;
  let mut stdout_bytes = Vec::new();
  let mut stderr_bytes = Vec::new();
  let mut stdout_done = false;
  let mut stderr_done = false;

  while !stdout_done || !stderr_done {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
      debug!("Pipe drain deadline expired");
      break;
    }

    let mut read_fds = FdSet::new();
    if !stdout_done {
      read_fds.insert(stdout_pipe.fd());
    }
    if !stderr_done {
      read_fds.insert(stderr_pipe.fd());
    }

    let mut timeout = TimeVal::milliseconds(remaining.as_millis() as i64);
    match select(None, &mut read_fds, None, None, &mut timeout) {
      Ok(0) => break,
      Ok(_) => {}
      Err(Errno::EINTR) => continue,
      Err(err) => {
        warn!("Select on capture pipes fails: {}", err);
        break;
      }
    }

    if !stdout_done && read_fds.contains(stdout_pipe.fd()) {
      stdout_done = stdout_pipe.read_chunk(&mut stdout_bytes);
    }
    if !stderr_done && read_fds.contains(stderr_pipe.fd()) {
      stderr_done = stderr_pipe.read_chunk(&mut stderr_bytes);
    }
  }

  Ok((stdout_bytes, stderr_bytes))
}
