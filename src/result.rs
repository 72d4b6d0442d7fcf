use crate::verdict::JudgeStatus;

/// Complete outcome of one judged submission
#[derive(Debug, Clone)]
pub struct JudgeResult {
  pub status: JudgeStatus,
  pub time_used: u64,
  pub mem_used: u64,
  pub exit_code: i32,
  pub error_message: String,
  pub stdout_content: String,
  pub output_len: usize,
  pub allocated_cpu: String,
}

impl JudgeResult {
  /// Result skeleton for a stage that never ran the user program
  pub fn empty(status: JudgeStatus) -> Self {
    JudgeResult {
      status,
      time_used: 0,
      mem_used: 0,
      exit_code: 0,
      error_message: String::new(),
      stdout_content: String::new(),
      output_len: 0,
      allocated_cpu: String::new(),
    }
  }

  /// SE result for a fault of the judge itself
  pub fn system_error<MS: Into<String>>(message: MS) -> Self {
    JudgeResult {
      exit_code: -1,
      error_message: message.into(),
      ..JudgeResult::empty(JudgeStatus::Se)
    }
  }

  /// Serialize to the canonical textual object.
  ///
  /// Field order is fixed; `error_message` and `stdout` are escaped,
  /// numbers are plain decimal. Equal results encode byte-identically.
  pub fn to_json(&self) -> String {
    let mut out = String::new();
    out.push_str("{\n");
    out.push_str(&format!("  \"status\": \"{}\",\n", self.status));
    out.push_str(&format!("  \"time_used\": {},\n", self.time_used));
    out.push_str(&format!("  \"mem_used\": {},\n", self.mem_used));
    out.push_str(&format!("  \"exit_code\": {},\n", self.exit_code));
    out.push_str(&format!("  \"error_message\": \"{}\",\n", escape(&self.error_message)));
    out.push_str(&format!("  \"stdout\": \"{}\",\n", escape(&self.stdout_content)));
    out.push_str(&format!("  \"output_len\": {},\n", self.output_len));
    out.push_str(&format!("  \"allocated_cpu\": \"{}\"\n", self.allocated_cpu));
    out.push('}');
    out
  }
}

/// Escape double quote, backslash, newline, carriage return and tab
fn escape(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      c => out.push(c),
    }
  }
  out
}
