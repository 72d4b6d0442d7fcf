use std::os::unix::io::FromRawFd;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use lazy_static::lazy_static;
use log::{error, info};
use nix::unistd::{close, dup};

use crate::limits::Limits;
use crate::pipe::JudgePipe;
use crate::result::JudgeResult;
use crate::verdict::JudgeStatus;

lazy_static! {
  /// Fixed C++ toolchain invocation for submissions
  static ref CPP_COMPILE_ARGS: Vec<&'static str> = vec![
    "-g",
    "-std=c++20",
    "-O2",
    "-Wall",
    "-Wextra",
    "-Wshadow",
    "-Wconversion",
    "-Wfloat-equal",
  ];
}

/// Compile the submission with g++, writing the executable to `output`.
///
/// Stdout and stderr of the toolchain share one pipe, so the combined
/// diagnostics buffer keeps the emission order. A nonzero toolchain
/// exit or a wall time beyond `compile_timeout` is a CE; otherwise the
/// outcome is OK with the measured wall time. The run stage fields
/// stay zeroed.
pub fn compile_program<P: AsRef<Path>>(source: P, output: P, limits: &Limits) -> JudgeResult {
  let source = source.as_ref();
  let output = output.as_ref();
  let mut result = JudgeResult::empty(JudgeStatus::Ce);
  result.error_message = "Failed to create compilation process".to_string();

  info!(
    "Compile {} -> {}",
    source.to_string_lossy(),
    output.to_string_lossy()
  );

  let pipe = match JudgePipe::new() {
    Ok(pipe) => pipe,
    Err(err) => {
      error!("Create diagnostics pipe fails: {}", err);
      return result;
    }
  };
  let merged = dup(pipe.write_fd()).and_then(|out_fd| match dup(pipe.write_fd()) {
    Ok(err_fd) => Ok((out_fd, err_fd)),
    Err(err) => {
      let _ = close(out_fd);
      Err(err)
    }
  });
  let (out_fd, err_fd) = match merged {
    Ok(fds) => fds,
    Err(err) => {
      error!("Duplicate diagnostics pipe fails: {}", err);
      return result;
    }
  };

  let start = Instant::now();
  let mut command = Command::new("g++");
  command
    .args(CPP_COMPILE_ARGS.iter())
    .arg(source)
    .arg("-o")
    .arg(output)
    .stdin(Stdio::null())
    .stdout(unsafe { Stdio::from_raw_fd(out_fd) })
    .stderr(unsafe { Stdio::from_raw_fd(err_fd) });
  let spawned = command.spawn();
  // release the duplicated write ends held for the child, the pipe
  // must see end of file once the toolchain exits
  drop(command);

  let mut child = match spawned {
    Ok(child) => child,
    Err(err) => {
      error!("Spawn g++ fails: {}", err);
      return result;
    }
  };

  let reader = match pipe.into_read() {
    Ok(reader) => reader,
    Err(err) => {
      error!("Close diagnostics write end fails: {}", err);
      let _ = child.kill();
      let _ = child.wait();
      return result;
    }
  };

  // drained before wait so a chatty toolchain can not fill the pipe
  let mut diagnostics = Vec::new();
  while !reader.read_chunk(&mut diagnostics) {}
  drop(reader);

  let status = child.wait();
  result.time_used = start.elapsed().as_millis() as u64;

  let status = match status {
    Ok(status) => status,
    Err(err) => {
      error!("Wait for g++ fails: {}", err);
      return result;
    }
  };

  if !status.success() {
    info!("Compile fails in {} ms", result.time_used);
    result.error_message = String::from_utf8_lossy(&diagnostics).into_owned();
    return result;
  }

  if result.time_used > limits.compile_timeout {
    info!("Compile times out after {} ms", result.time_used);
    result.error_message = "Compilation timeout".to_string();
    return result;
  }

  info!("Compile ok in {} ms", result.time_used);
  result.status = JudgeStatus::Ok;
  result.error_message = String::new();
  result
}
