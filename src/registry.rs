//! Late-bound variable registration
//!
//! Some variables only appear in the header once a simulator-side condition holds, for
//! example while telemetry recording is active. Consumers may register interest in a
//! name before it exists; the registry remembers the request and reports activation at
//! the next explicit refresh point.
//!
//! Activation callbacks are never invoked from inside [`VariableRegistry::register`].
//! They run during [`VariableRegistry::refresh`], after every internal lock has been
//! released, so a callback may safely register further names (those are delivered at
//! the following refresh).

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::VariableInfo;
use crate::schema::ConnectionHeader;

type ActivationCallback = Box<dyn FnMut(&VariableInfo) + Send>;

struct PendingRegistration {
    name: String,
    callback: ActivationCallback,
}

/// Registry of variables awaiting or having reached activation.
#[derive(Default)]
pub struct VariableRegistry {
    pending: Mutex<Vec<PendingRegistration>>,
    active: Mutex<HashMap<String, VariableInfo>>,
}

impl std::fmt::Debug for VariableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableRegistry")
            .field("pending", &self.pending_count())
            .field("active", &self.active_names())
            .finish()
    }
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue interest in `name`.
    ///
    /// `on_active` runs once, during the first refresh at which the name is present.
    /// Registering an already active name still defers delivery to the next refresh.
    pub fn register<F>(&self, name: impl Into<String>, on_active: F)
    where
        F: FnMut(&VariableInfo) + Send + 'static,
    {
        let name = name.into();
        trace!(name = %name, "Queued variable registration");
        self.pending.lock().push(PendingRegistration { name, callback: Box::new(on_active) });
    }

    /// Number of registrations not yet delivered.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.lock().contains_key(name)
    }

    /// Activation record for `name`, if it has been activated.
    pub fn get(&self, name: &str) -> Option<VariableInfo> {
        self.active.lock().get(name).cloned()
    }

    /// Names activated so far, sorted.
    pub fn active_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.active.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Deliver every pending registration whose name is present in `header`.
    ///
    /// A name's activation tick is fixed the first time it is seen present. Names still
    /// absent stay queued. Returns the number of callbacks invoked.
    pub fn refresh(&self, header: &ConnectionHeader, tick: i32) -> usize {
        let drained = std::mem::take(&mut *self.pending.lock());
        if drained.is_empty() {
            return 0;
        }

        let mut ready = Vec::new();
        let mut still_pending = Vec::new();
        {
            let mut active = self.active.lock();
            for registration in drained {
                match header.descriptor(&registration.name) {
                    Some(descriptor) => {
                        let info = active
                            .entry(registration.name.clone())
                            .or_insert_with(|| {
                                debug!(name = %registration.name, tick, "Variable activated");
                                VariableInfo { descriptor: descriptor.clone(), activated_at_tick: tick }
                            })
                            .clone();
                        ready.push((registration, info));
                    }
                    None => still_pending.push(registration),
                }
            }
        }

        if !still_pending.is_empty() {
            let mut pending = self.pending.lock();
            // Keep the original order ahead of anything registered meanwhile.
            still_pending.append(&mut pending);
            *pending = still_pending;
        }

        let delivered = ready.len();
        for (mut registration, info) in ready {
            (registration.callback)(&info);
        }
        trace!(delivered, "Variable registry refreshed");
        delivered
    }
}
