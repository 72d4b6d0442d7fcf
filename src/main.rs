use std::env;

use clap::error::ErrorKind;
use clap::Parser;
use flexi_logger::{DeferredNow, FileSpec, Logger};
use log::{info, Record};

use ojcore::{judge, JudgeError, JudgeExit};

#[derive(Parser, Debug)]
#[command(author, version, about = "Online judge execution core", long_about = None)]
struct Cli {
  #[arg(help = "Resource limits configuration file")]
  limits_file: String,

  #[arg(help = "Submission source file")]
  source_file: String,

  #[arg(help = "Standard input file")]
  input_file: String,
}

/// A logline-formatter that produces log lines like <br>
/// ```[datetime: INFO] Created cgroup judge_123456```
fn default_format(
  w: &mut dyn std::io::Write,
  now: &mut DeferredNow,
  record: &Record,
) -> Result<(), std::io::Error> {
  write!(
    w,
    "[{}: {:5}] {}",
    now.format("%Y-%m-%d %H:%M:%S"),
    record.level(),
    record.args()
  )
}

fn setup_logger() -> Result<(), JudgeError> {
  Logger::try_with_str("ojcore=info")?
    .log_to_file(
      FileSpec::default()
        .directory(env::var("JUDGE_LOG").unwrap_or("./logs/".into()))
        .basename("judge")
        .discriminant(format!(
          "{}",
          chrono::offset::Local::now().format("%Y-%m-%d")
        ))
        .suppress_timestamp(),
    )
    .append()
    .format_for_files(default_format)
    .start()?;
  Ok(())
}

fn bootstrap() -> Result<(), JudgeError> {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(err) => {
      return match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
          let _ = err.print();
          Ok(())
        }
        _ => Err(JudgeError::cli(
          "Usage: ojcore <limits_file> <source_file> <input_file>",
        )),
      };
    }
  };

  // Stdout carries only the encoded result, so the judge keeps going
  // without a logger rather than fail the run
  let _ = setup_logger();

  info!("Start running ojcore");

  let result = judge(&cli.limits_file, &cli.source_file, &cli.input_file);
  println!("{}", result.to_json());

  Ok(())
}

fn main() -> JudgeExit {
  match bootstrap() {
    Ok(_) => JudgeExit::Ok,
    Err(err) => JudgeExit::Err(err),
  }
}
