use std::collections::hash_map::DefaultHasher;
use std::fs::{self, DirBuilder};
use std::hash::{Hash, Hasher};
use std::os::unix::fs::DirBuilderExt;
use std::path::PathBuf;

use log::{debug, error};
use nix::errno::Errno;
use nix::sched::{sched_setaffinity, CpuSet};
use nix::time::{clock_gettime, ClockId};
use nix::unistd::Pid;
use rand::Rng;

use crate::error::JudgeError;

const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// One cgroup v2 node under /sys/fs/cgroup, owned for the lifetime of a
/// single run. The directory is removed when the owner goes out of
/// scope, which is always after the enrolled child has been reaped.
pub struct JudgeCgroup {
  name: String,
  path: PathBuf,
  created: bool,
}

impl JudgeCgroup {
  /// Pick a random node name, avoiding collisions between concurrent
  /// judges without coordination. Nothing is touched on disk yet.
  pub fn new() -> Self {
    let name = format!("judge_{}", rand::thread_rng().gen_range(100_000..=999_999));
    let path = PathBuf::from(CGROUP_ROOT).join(&name);
    JudgeCgroup {
      name,
      path,
      created: false,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Create the node directory with mode 0755. Fails when the cgroup v2
  /// filesystem is absent, the caller lacks privilege, or the path
  /// already exists.
  pub fn create(&mut self) -> Result<(), JudgeError> {
    DirBuilder::new()
      .mode(0o755)
      .create(&self.path)
      .map_err(|err| {
        error!("Create cgroup {} fails: {}", self.name, err);
        JudgeError::cgroup(format!("mkdir {}: {}", self.path.to_string_lossy(), err))
      })?;
    self.created = true;
    debug!("Created cgroup {}", self.name);
    Ok(())
  }

  /// Write the hard memory cap into memory.max
  pub fn set_memory_limit(&self, limit_bytes: u64) -> Result<(), JudgeError> {
    if !self.created {
      return Err(JudgeError::cgroup("cgroup is not created"));
    }
    write_cgroup_file(&self.path.join("memory.max"), &limit_bytes.to_string())
  }

  /// Restrict the node to one selected CPU core.
  ///
  /// Enables the cpuset controller in the root node (errors ignored,
  /// the controller may already be enabled), writes the selected core
  /// into cpuset.cpus and inherits cpuset.mems from the parent's
  /// effective set, defaulting to "0".
  pub fn set_cpu_limit(&self) -> Result<(), JudgeError> {
    if !self.created {
      return Err(JudgeError::cgroup("cgroup is not created"));
    }

    let root_subtree = PathBuf::from(CGROUP_ROOT).join("cgroup.subtree_control");
    let _ = write_cgroup_file(&root_subtree, "+cpuset");

    let selected_cpu = select_cpu(&self.name);
    debug!("Cgroup {} selected cpu {}", self.name, selected_cpu);
    write_cgroup_file(&self.path.join("cpuset.cpus"), &selected_cpu)?;

    let parent_mems = PathBuf::from(CGROUP_ROOT).join("cpuset.mems.effective");
    let mems = fs::read_to_string(parent_mems)
      .map(|text| text.trim().to_string())
      .unwrap_or_default();
    let mems = if mems.is_empty() { "0".to_string() } else { mems };
    write_cgroup_file(&self.path.join("cpuset.mems"), &mems)
  }

  /// Enroll the process into cgroup.procs. Descendants are enrolled
  /// transitively by the kernel, though the sandbox caps RLIMIT_NPROC
  /// at 1 anyway.
  pub fn add_process(&self, pid: Pid) -> Result<(), JudgeError> {
    if !self.created {
      return Err(JudgeError::cgroup("cgroup is not created"));
    }
    write_cgroup_file(&self.path.join("cgroup.procs"), &pid.as_raw().to_string())
  }

  /// Pin the process to the selected core via the kernel affinity mask,
  /// backing up cpuset.cpus
  pub fn force_cpu_binding(&self, pid: Pid, cpu_id: usize) -> Result<(), Errno> {
    let mut cpu_set = CpuSet::new();
    cpu_set.set(cpu_id)?;
    sched_setaffinity(pid, &cpu_set)
  }

  /// Peak memory of the node since creation, from memory.peak
  pub fn get_memory_peak(&self) -> Option<u64> {
    if !self.created {
      return None;
    }
    fs::read_to_string(self.path.join("memory.peak"))
      .ok()
      .and_then(|text| text.trim().parse::<u64>().ok())
  }

  /// Read back cpuset.cpus, trimmed. Empty when unreadable.
  pub fn get_allocated_cpu(&self) -> String {
    if !self.created {
      return String::new();
    }
    fs::read_to_string(self.path.join("cpuset.cpus"))
      .map(|text| text.trim().to_string())
      .unwrap_or_default()
  }
}

impl Drop for JudgeCgroup {
  fn drop(&mut self) {
    if self.created {
      debug!("Delete created cgroup {}", self.name);
      // The kernel reclaims the node once empty, failure is tolerated
      let _ = fs::remove_dir(&self.path);
      self.created = false;
    }
  }
}

fn write_cgroup_file(path: &PathBuf, value: &str) -> Result<(), JudgeError> {
  fs::write(path, format!("{}\n", value)).map_err(|err| {
    error!("Write {} <- {} fails: {}", path.to_string_lossy(), value, err);
    JudgeError::cgroup(format!("write {}: {}", path.to_string_lossy(), err))
  })
}

/// Pick one core index in [0, N) where N is the number of processor
/// lines in /proc/cpuinfo. The index disperses concurrent judges by
/// hashing the node name against the monotonic clock; it is not a
/// guarantee of exclusivity.
fn select_cpu(cgroup_name: &str) -> String {
  let cpu_count = get_cpu_count();
  if cpu_count == 0 {
    return "0".to_string();
  }

  let mut hasher = DefaultHasher::new();
  cgroup_name.hash(&mut hasher);
  let hash_value = hasher.finish();

  let timestamp = clock_gettime(ClockId::CLOCK_MONOTONIC)
    .map(|ts| ts.tv_sec() as u64 * 1_000_000_000 + ts.tv_nsec() as u64)
    .unwrap_or(0);

  let selected = (hash_value ^ timestamp) % cpu_count as u64;
  selected.to_string()
}

fn get_cpu_count() -> usize {
  match fs::read_to_string("/proc/cpuinfo") {
    Ok(text) => text.lines().filter(|line| line.starts_with("processor")).count(),
    Err(_) => 0,
  }
}
