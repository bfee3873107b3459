//! Process-wide handle to the active ledger.
//!
//! Components never keep a ledger across a swap; they call [Connection::current] for every
//! access.

use crate::ledger::Ledger;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

pub struct Connection<L: Ledger> {
    current: RwLock<Arc<L>>,
}

impl<L: Ledger> Connection<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            current: RwLock::new(Arc::new(ledger)),
        }
    }

    /// The ledger to use for the next operation.
    pub fn current(&self) -> Arc<L> {
        let current = match self.current.read() {
            Ok(current) => current,
            Err(poisoned) => {
                warn!("Connection lock poisoned; recovering");
                poisoned.into_inner()
            }
        };
        Arc::clone(&current)
    }

    /// Replace the ledger wholesale, returning the previous one.
    pub fn swap(&self, ledger: L) -> Arc<L> {
        let mut current = match self.current.write() {
            Ok(current) => current,
            Err(poisoned) => {
                warn!("Connection lock poisoned; recovering");
                poisoned.into_inner()
            }
        };
        let next = Arc::new(ledger);
        info!(
            chain_id = next.network().chain_id,
            identity = ?next.identity(),
            "swapped ledger connection"
        );
        std::mem::replace(&mut *current, next)
    }
}

/// Lock `mutex`, recovering the guard if a holder panicked.
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(lock = name, "lock poisoned; recovering");
            poisoned.into_inner()
        }
    }
}

/// A cached value tagged with the generation it belongs to.
///
/// [Memo::invalidate] starts a new generation. A lookup captures [Memo::generation] before it
/// reads the ledger and stores its result with [Memo::fill], which drops results of an older
/// generation.
#[derive(Debug)]
pub(crate) struct Memo<T> {
    generation: u64,
    value: Option<T>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            value: None,
        }
    }
}

impl<T> Memo<T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    /// Replace the value within the current generation.
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Store `value` read during `generation`. Returns false if it is stale.
    pub fn fill(&mut self, generation: u64, value: T) -> bool {
        if generation != self.generation {
            return false;
        }
        self.value = Some(value);
        true
    }

    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_drops_stale_fill() {
        let mut memo = Memo::default();
        let generation = memo.generation();
        memo.invalidate();
        assert!(!memo.fill(generation, 1u32));
        assert_eq!(memo.get(), None);

        assert!(memo.fill(memo.generation(), 2));
        assert_eq!(memo.get(), Some(&2));
        memo.set(3);
        assert_eq!(memo.get(), Some(&3));
        memo.invalidate();
        assert_eq!(memo.get(), None);
    }
}
