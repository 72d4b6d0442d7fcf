pub use compile::compile_program;
pub use error::{JudgeError, JudgeExit};
pub use judge::judge;
pub use limits::Limits;
pub use result::JudgeResult;
pub use verdict::{classify, JudgeStatus};

mod cgroup;
mod compile;
mod error;
mod judge;
mod limits;
mod pipe;
mod result;
mod sandbox;
mod verdict;
