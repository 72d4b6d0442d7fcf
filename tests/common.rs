use std::sync::{Mutex, MutexGuard, Once};

use flexi_logger::Logger;

static INIT: Once = Once::new();
static LOCK: Mutex<()> = Mutex::new(());

pub fn setup() {
  INIT.call_once(|| {
    Logger::try_with_str("ojcore=debug,info")
      .unwrap()
      .start()
      .unwrap();
  });
}

/// Serialize tests that fork and own cgroup nodes
#[allow(unused)]
pub fn lock() -> MutexGuard<'static, ()> {
  LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
