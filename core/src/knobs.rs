//! Runtime-adjustable manager settings.
//!
//! Every read is live: a wait that is already in progress sees a new
//! timeout on its next wake-up.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tether_config::ManagerConfig;

use crate::{Binding, InjectFn};

pub(crate) struct Knobs {
    timeout_nanos: AtomicU64,
    print: AtomicBool,
    warn: AtomicBool,
    inject: RwLock<Option<InjectFn>>,
}

impl Knobs {
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            timeout_nanos: AtomicU64::new(duration_nanos(config.timeout())),
            print: AtomicBool::new(config.debug.print),
            warn: AtomicBool::new(config.debug.warn),
            inject: RwLock::new(None),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_nanos(self.timeout_nanos.load(Ordering::Acquire))
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_nanos
            .store(duration_nanos(timeout), Ordering::Release);
    }

    pub fn print_enabled(&self) -> bool {
        self.print.load(Ordering::Relaxed)
    }

    pub fn warn_enabled(&self) -> bool {
        self.warn.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, print: bool, warn: bool) {
        self.print.store(print, Ordering::Relaxed);
        self.warn.store(warn, Ordering::Relaxed);
    }

    pub fn set_inject(&self, inject: Option<InjectFn>) {
        *self.inject.write().unwrap_or_else(PoisonError::into_inner) = inject;
    }

    /// Run the inject hook, if any. The lock is released before the call so
    /// the hook may itself replace the hook.
    pub fn inject(&self, binding: &Binding) {
        let hook = self
            .inject
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(binding);
        }
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
