use std::mem;
use std::os::unix::prelude::RawFd;

use nix::errno::Errno;
use nix::unistd::{close, pipe, read};

use crate::error::JudgeError;

const READ_CHUNK_SIZE: usize = 4096;

/// Unidirectional pipe for capturing one child stream. Both ends are
/// closed when the pair is dropped, so no descriptor outlives an early
/// return.
pub struct JudgePipe(RawFd, RawFd);

/// Supervisor half of a pipe after the write end has been closed
pub struct JudgeReadPipe(RawFd);

impl JudgePipe {
  pub fn new() -> Result<Self, JudgeError> {
    let (read_fd, write_fd) = pipe()?;
    Ok(JudgePipe(read_fd, write_fd))
  }

  pub fn read_fd(&self) -> RawFd {
    self.0
  }

  pub fn write_fd(&self) -> RawFd {
    self.1
  }

  /// Close both ends, used on the child side after dup2
  pub fn close_both(&self) -> Result<(), JudgeError> {
    close(self.0)?;
    close(self.1)?;
    Ok(())
  }

  /// Keep the read end for draining, closing the write end so that a
  /// child exit is observed as end of file
  pub fn into_read(self) -> Result<JudgeReadPipe, JudgeError> {
    let (read_fd, write_fd) = (self.0, self.1);
    mem::forget(self);
    close(write_fd)?;
    Ok(JudgeReadPipe(read_fd))
  }
}

impl Drop for JudgePipe {
  fn drop(&mut self) {
    let _ = close(self.0);
    let _ = close(self.1);
  }
}

impl JudgeReadPipe {
  pub fn fd(&self) -> RawFd {
    self.0
  }

  /// Read one chunk into the sink, returning true once the pipe is
  /// exhausted
  pub fn read_chunk(&self, sink: &mut Vec<u8>) -> bool {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    match read(self.0, &mut chunk) {
      Ok(0) => true,
      Ok(size) => {
        sink.extend_from_slice(&chunk[..size]);
        false
      }
      Err(Errno::EINTR) => false,
      Err(_) => true,
    }
  }
}

impl Drop for JudgeReadPipe {
  fn drop(&mut self) {
    let _ = close(self.0);
  }
}
