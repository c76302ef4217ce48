//! Update Session
//!
//! Guard against re-entrant updates. Only one session per [`Main`] can be
//! alive at a time. An update started while another one runs (from a node
//! callback, say) does nothing.
//!
//! [`Main`]: crate::main_db::Main

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag the sessions are acquired from.
#[derive(Debug, Clone, Default)]
pub struct SessionFlag(Arc<AtomicBool>);

impl SessionFlag {
    /// A flag without an active session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session is currently alive.
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Start a session. `None` while another session is alive.
    pub fn try_begin(&self) -> Option<UpdateSession> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| UpdateSession {
                flag: Arc::clone(&self.0),
            })
    }
}

/// A running update. The flag is released on drop.
#[derive(Debug)]
pub struct UpdateSession {
    flag: Arc<AtomicBool>,
}

impl Drop for UpdateSession {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
