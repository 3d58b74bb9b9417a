use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crate::ast::Value;
use crate::error::CloveError;

/// Host object monitors. Only acquisition is exposed here.
pub trait Monitors: Send + Sync {
    fn enter(&self, target: &Value) -> Result<(), CloveError>;
}

#[derive(Default)]
struct MonitorState {
    owner: Option<ThreadId>,
    depth: usize,
}

#[derive(Default)]
struct Monitor {
    state: Mutex<MonitorState>,
    cond: Condvar,
}

/// Reentrant per-object locks, created lazily on first enter.
///
/// Vars, functions and host objects are keyed by identity; the table keeps
/// its key alive, so a monitor never outlives the object it guards and is
/// never handed to a later object at the same address.
#[derive(Default)]
pub struct IntrinsicLocks {
    table: Mutex<HashMap<Value, Arc<Monitor>>>,
}

impl IntrinsicLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn monitor_for(&self, target: &Value) -> Arc<Monitor> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.entry(target.clone()).or_default().clone()
    }

    fn existing(&self, target: &Value) -> Option<Arc<Monitor>> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .cloned()
    }

    /// Whether the calling thread owns the monitor of `target`.
    pub fn held_by_current_thread(&self, target: &Value) -> bool {
        self.existing(target).is_some_and(|monitor| {
            let state = monitor.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.owner == Some(thread::current().id())
        })
    }

    /// How many times the owner has entered the monitor of `target`.
    pub fn entry_count(&self, target: &Value) -> usize {
        self.existing(target).map_or(0, |monitor| {
            monitor
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .depth
        })
    }
}

impl Monitors for IntrinsicLocks {
    fn enter(&self, target: &Value) -> Result<(), CloveError> {
        if matches!(target, Value::Nil) {
            return Err(CloveError::runtime("monitor-enter: target is nil"));
        }
        let monitor = self.monitor_for(target);
        let me = thread::current().id();
        let mut state = monitor
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while state.owner.is_some_and(|owner| owner != me) {
            state = monitor
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.owner = Some(me);
        state.depth += 1;
        log::trace!("monitor-enter on {} (depth {})", target, state.depth);
        Ok(())
    }
}
