use dashmap::DashMap;
use std::time::Instant;

use super::window::QuotaWindow;
use crate::principal::Principal;

/// Storage for per-principal quota windows.
///
/// Implementations must make `update` atomic per key: the closure sees the
/// window exclusively, so a read-modify-write inside it cannot interleave
/// with another caller for the same principal. Unrelated keys must not
/// serialize on a single lock.
pub trait WindowStore: Send + Sync + 'static {
    /// Run `f` on the window for `key`, creating a fresh one at `now` if
    /// none is stored.
    fn update<R>(&self, key: &Principal, now: Instant, f: impl FnOnce(&mut QuotaWindow) -> R) -> R;

    fn peek(&self, key: &Principal) -> Option<QuotaWindow>;

    /// Keep only windows for which `keep` returns true. Returns how many
    /// were dropped.
    fn retain(&self, keep: impl FnMut(&Principal, &QuotaWindow) -> bool) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// In-process store, sharded locks via DashMap
#[derive(Debug, Default)]
pub struct MemoryWindowStore {
    windows: DashMap<Principal, QuotaWindow>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowStore for MemoryWindowStore {
    fn update<R>(&self, key: &Principal, now: Instant, f: impl FnOnce(&mut QuotaWindow) -> R) -> R {
        // fast path avoids cloning the key for known principals
        if let Some(mut window) = self.windows.get_mut(key) {
            return f(window.value_mut());
        }

        let mut window = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| QuotaWindow::new(now));
        f(window.value_mut())
    }

    fn peek(&self, key: &Principal) -> Option<QuotaWindow> {
        self.windows.get(key).map(|w| *w.value())
    }

    fn retain(&self, mut keep: impl FnMut(&Principal, &QuotaWindow) -> bool) -> usize {
        let mut dropped = 0;
        self.windows.retain(|key, window| {
            let kept = keep(key, window);
            if !kept {
                dropped += 1;
            }
            kept
        });
        dropped
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}
