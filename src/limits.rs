use std::fs;
use std::path::Path;

use log::{debug, warn};

pub const DEFAULT_TIME_LIMIT: u64 = 1000;
pub const DEFAULT_MEMORY_LIMIT: u64 = 64 * 1024 * 1024;
pub const DEFAULT_OUTPUT_LIMIT: u64 = 64_000_000;
pub const DEFAULT_COMPILE_TIMEOUT: u64 = 30_000;
pub const DEFAULT_STACK_LIMIT: u64 = 8 * 1024 * 1024;

/// Resource limits for one submission, immutable after load
#[derive(Debug, Clone)]
pub struct Limits {
  pub time_limit: u64,
  pub memory_limit: u64,
  pub output_limit: u64,
  pub compile_timeout: u64,
  pub stack_limit: u64,
}

impl Default for Limits {
  fn default() -> Self {
    Limits {
      time_limit: DEFAULT_TIME_LIMIT,
      memory_limit: DEFAULT_MEMORY_LIMIT,
      output_limit: DEFAULT_OUTPUT_LIMIT,
      compile_timeout: DEFAULT_COMPILE_TIMEOUT,
      stack_limit: DEFAULT_STACK_LIMIT,
    }
  }
}

impl Limits {
  /// Load limits from a configuration file.
  ///
  /// The loader never fails: a missing file, an unparsable field or a
  /// non-positive value each fall back to the built-in default for that
  /// field alone. `memory_limit` and `stack_limit` are given in KiB and
  /// scaled to bytes; the other fields are used verbatim.
  pub fn load<P: AsRef<Path>>(path: P) -> Limits {
    let text = match fs::read_to_string(path.as_ref()) {
      Ok(text) => text,
      Err(err) => {
        warn!(
          "Can not read limits file {}: {}, using defaults",
          path.as_ref().to_string_lossy(),
          err
        );
        return Limits::default();
      }
    };

    let limits = Limits {
      time_limit: parse_field(&text, "time_limit").unwrap_or(DEFAULT_TIME_LIMIT),
      memory_limit: parse_field(&text, "memory_limit")
        .map(|kib| kib.saturating_mul(1024))
        .unwrap_or(DEFAULT_MEMORY_LIMIT),
      output_limit: parse_field(&text, "output_limit").unwrap_or(DEFAULT_OUTPUT_LIMIT),
      compile_timeout: parse_field(&text, "compile_timeout").unwrap_or(DEFAULT_COMPILE_TIMEOUT),
      stack_limit: parse_field(&text, "stack_limit")
        .map(|kib| kib.saturating_mul(1024))
        .unwrap_or(DEFAULT_STACK_LIMIT),
    };

    debug!("Loaded limits: {:?}", limits);

    limits
  }
}

/// Scan the text for `"key" : <digits>` and return the value when it is
/// a positive decimal number. Whitespace around the colon is skipped;
/// anything else yields `None`.
fn parse_field(text: &str, key: &str) -> Option<u64> {
  let quoted = format!("\"{}\"", key);
  let pos = text.find(&quoted)? + quoted.len();
  let rest = &text[pos..];
  let pos = rest.find(':')? + 1;
  let rest = rest[pos..].trim_start_matches(|c| c == ' ' || c == '\t');

  let digits = rest
    .chars()
    .take_while(|c| c.is_ascii_digit())
    .collect::<String>();
  if digits.is_empty() {
    return None;
  }

  let value = digits
    .chars()
    .fold(0u64, |acc, c| acc.saturating_mul(10).saturating_add(c as u64 - '0' as u64));
  if value > 0 {
    Some(value)
  } else {
    None
  }
}
