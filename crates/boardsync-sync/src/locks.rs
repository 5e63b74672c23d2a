use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Advisory per-project locks. Walks over the same project run one at a
/// time; different projects do not wait on each other.
#[derive(Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, project_id: &str) -> OwnedMutexGuard<()> {
        self.lock_for(project_id).lock_owned().await
    }

    fn lock_for(&self, project_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // holders and waiters keep a clone; a lone entry is idle
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
impl ProjectLocks {
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
