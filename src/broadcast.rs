// src/broadcast.rs
//! Receiver registration seam between the SMS adapter and the platform.
//!
//! The platform delivers SMS events as ordered broadcasts: receivers run from
//! the highest priority down, and any of them may abort the broadcast so that
//! lower-priority receivers never see it.

use log::debug;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::sms::SmsIntent;

/// Highest priority an application receiver may request
pub const SYSTEM_HIGH_PRIORITY: i32 = 999;

/// What a receiver wants to happen to the broadcast after it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentFilter {
    pub action: String,
    pub priority: i32,
}

impl IntentFilter {
    pub fn new(action: &str) -> Self {
        IntentFilter {
            action: action.to_string(),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn matches(&self, intent: &SmsIntent) -> bool {
        self.action == intent.action()
    }
}

pub trait BroadcastReceiver: Send + Sync {
    fn on_receive(&self, intent: &SmsIntent) -> Propagation;
}

/// Where receivers are registered; the platform side of the seam
pub trait BroadcastRegistry: Send + Sync {
    fn register_receiver(&self, receiver: Arc<dyn BroadcastReceiver>, filter: IntentFilter);

    /// Remove every registration of `receiver`
    fn unregister_receiver(&self, receiver: &Arc<dyn BroadcastReceiver>);
}

fn same_receiver(a: &Arc<dyn BroadcastReceiver>, b: &Arc<dyn BroadcastReceiver>) -> bool {
    // Compare data pointers only; vtable pointers are not unique
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

struct Registration {
    receiver: Arc<dyn BroadcastReceiver>,
    filter: IntentFilter,
}

/// In-process registry delivering intents as ordered broadcasts
#[derive(Default)]
pub struct LocalBroadcaster {
    registrations: Mutex<Vec<Registration>>,
}

impl LocalBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.registrations.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn registration_count(&self) -> usize {
        self.lock().len()
    }

    /// Priorities registered for `action`, highest first
    pub fn priorities(&self, action: &str) -> Vec<i32> {
        let mut priorities: Vec<i32> = self
            .lock()
            .iter()
            .filter(|r| r.filter.action == action)
            .map(|r| r.filter.priority)
            .collect();
        priorities.sort_by(|a, b| b.cmp(a));
        priorities
    }

    /// Deliver `intent` to matching receivers, highest priority first.
    /// Returns how many receivers ran before the broadcast finished or was aborted.
    pub fn send_ordered_broadcast(&self, intent: &SmsIntent) -> usize {
        let mut targets: Vec<(i32, Arc<dyn BroadcastReceiver>)> = self
            .lock()
            .iter()
            .filter(|r| r.filter.matches(intent))
            .map(|r| (r.filter.priority, r.receiver.clone()))
            .collect();
        // Stable: equal priorities keep registration order
        targets.sort_by(|a, b| b.0.cmp(&a.0));

        // The lock is released here so receivers may (un)register
        let mut delivered = 0;
        for (_, receiver) in targets {
            delivered += 1;
            if receiver.on_receive(intent) == Propagation::Abort {
                debug!("Broadcast {} aborted after {} receiver(s)", intent.action(), delivered);
                break;
            }
        }
        delivered
    }
}

impl BroadcastRegistry for LocalBroadcaster {
    fn register_receiver(&self, receiver: Arc<dyn BroadcastReceiver>, filter: IntentFilter) {
        debug!("Registering receiver for {} (priority {})", filter.action, filter.priority);
        self.lock().push(Registration { receiver, filter });
    }

    fn unregister_receiver(&self, receiver: &Arc<dyn BroadcastReceiver>) {
        self.lock().retain(|r| !same_receiver(&r.receiver, receiver));
    }
}
