use std::{
  error::Error,
  fmt::{Debug, Display},
  process::{ExitCode, Termination},
};

use flexi_logger::FlexiLoggerError;
use nix::errno::Errno;

pub enum JudgeError {
  Cgroup(String),
  Pipe(String),
  Fork(String),
  Exec(String),
  Nix(Errno),
  Fs(String),
  Cli(String),
  Logger(FlexiLoggerError),
}

pub enum JudgeExit {
  Ok,
  Err(JudgeError),
}

impl JudgeError {
  pub fn cgroup<MS: Into<String>>(msg: MS) -> JudgeError {
    JudgeError::Cgroup(msg.into())
  }

  pub fn pipe<MS: Into<String>>(msg: MS) -> JudgeError {
    JudgeError::Pipe(msg.into())
  }

  pub fn fork<MS: Into<String>>(msg: MS) -> JudgeError {
    JudgeError::Fork(msg.into())
  }

  pub fn exec<MS: Into<String>>(msg: MS) -> JudgeError {
    JudgeError::Exec(msg.into())
  }

  pub fn cli<MS: Into<String>>(msg: MS) -> JudgeError {
    JudgeError::Cli(msg.into())
  }
}

impl Debug for JudgeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    std::fmt::Display::fmt(&self, f)
  }
}

impl Display for JudgeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self {
      JudgeError::Cgroup(msg) => f.write_fmt(format_args!("Judge Cgroup Error: {}", msg)),
      JudgeError::Pipe(msg) => f.write_fmt(format_args!("Judge Pipe Error: {}", msg)),
      JudgeError::Fork(msg) => f.write_fmt(format_args!("Judge Fork Error: {}", msg)),
      JudgeError::Exec(msg) => f.write_fmt(format_args!("Judge Exec Error: {}", msg)),
      JudgeError::Nix(errno) => f.write_fmt(format_args!("Judge Nix Error: {}", errno)),
      JudgeError::Fs(msg) => f.write_fmt(format_args!("Judge File System Error: {}", msg)),
      JudgeError::Cli(msg) => f.write_fmt(format_args!("Judge CLI Error: {}", msg)),
      JudgeError::Logger(err) => f.write_fmt(format_args!("Judge Logger Error: {}", err)),
    }
  }
}

impl From<Errno> for JudgeError {
  fn from(errno: Errno) -> Self {
    JudgeError::Nix(errno)
  }
}

impl From<std::io::Error> for JudgeError {
  fn from(err: std::io::Error) -> Self {
    JudgeError::Fs(err.to_string())
  }
}

impl From<FlexiLoggerError> for JudgeError {
  fn from(err: FlexiLoggerError) -> Self {
    JudgeError::Logger(err)
  }
}

impl Error for JudgeError {}

impl Termination for JudgeExit {
  fn report(self) -> ExitCode {
    match self {
      JudgeExit::Ok => ExitCode::SUCCESS.report(),
      JudgeExit::Err(err) => {
        eprintln!("{}", err);
        ExitCode::FAILURE.report()
      }
    }
  }
}
