use std::fs::remove_file;
use std::path::{Path, PathBuf};

use log::{error, info};
use path_absolutize::Absolutize;

use crate::compile::compile_program;
use crate::error::JudgeError;
use crate::limits::Limits;
use crate::result::JudgeResult;
use crate::sandbox::run_program;
use crate::verdict::JudgeStatus;

/// Judge one submission: load limits, compile, run, clean up.
///
/// This is the catch-all boundary: whatever goes wrong below, exactly
/// one result comes back, with unexpected failures mapped to SE.
pub fn judge<P: AsRef<Path>>(limits_file: P, source_file: P, input_file: P) -> JudgeResult {
  match try_judge(limits_file.as_ref(), source_file.as_ref(), input_file.as_ref()) {
    Ok(result) => result,
    Err(err) => {
      error!("Judging fails: {}", err);
      JudgeResult::system_error(format!("System error: {}", err))
    }
  }
}

fn try_judge(
  limits_file: &Path,
  source_file: &Path,
  input_file: &Path,
) -> Result<JudgeResult, JudgeError> {
  let limits = Limits::load(limits_file);

  let source = source_file
    .absolutize()
    .map_err(|err| JudgeError::Fs(err.to_string()))?;
  let executable = PathBuf::from(format!("{}.out", source.to_string_lossy()));

  let compiled = compile_program(source.as_ref(), executable.as_path(), &limits);
  let result = if compiled.status == JudgeStatus::Ok {
    run_program(executable.as_path(), input_file, &limits)
  } else {
    Ok(compiled)
  };

  // The executable is removed on every outcome, even when the run
  // stage errors out; a failed compile just never produced one
  let _ = remove_file(&executable);
  let result = result?;

  info!("Judging finished: {}", result.status);
  Ok(result)
}
