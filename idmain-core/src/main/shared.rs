//! A database shared between threads.

use super::Main;
use parking_lot::{Mutex, MutexGuard};

/// A [`Main`] behind a single lock.
///
/// The lock covers list mutation, name map updates and sorted insertion
/// together, so every edit sees a consistent database. Loading into a
/// separate scratch database and merging it under the lock keeps the critical
/// section short.
#[derive(Debug, Default)]
pub struct SharedMain {
    inner: Mutex<Main>,
}

impl SharedMain {
    /// Wrap a database.
    pub fn new(main: Main) -> Self {
        Self {
            inner: Mutex::new(main),
        }
    }

    /// Lock the database for the lifetime of the guard.
    pub fn lock(&self) -> MutexGuard<'_, Main> {
        self.inner.lock()
    }

    /// Run `f` with the database locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut Main) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Unwrap the database.
    pub fn into_inner(self) -> Main {
        self.inner.into_inner()
    }
}

impl From<Main> for SharedMain {
    fn from(main: Main) -> Self {
        Self::new(main)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IdType;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_creation_keeps_names_unique() {
        let shared = Arc::new(SharedMain::new(Main::standalone()));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..25 {
                        shared.with(|main| main.new_id(IdType::Object, "Cube"));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let main = Arc::try_unwrap(shared).unwrap().into_inner();
        assert_eq!(main.count(IdType::Object), 100);
        assert!(main.namemap_validate());
        assert!(main.find_by_name(IdType::Object, "Cube.099").is_some());
    }

    #[test]
    fn guard_gives_mutable_access() {
        let shared = SharedMain::from(Main::standalone());
        let text = shared.lock().new_id(IdType::Text, "Notes");
        assert_eq!(shared.lock().get(text).unwrap().name(), "Notes");
    }
}
