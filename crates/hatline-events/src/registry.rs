//! Ordered callback registry.
//!
//! A [`CallbackRegistry`] fans one hardware event out to every registered
//! callback in registration order. It is shared between foreground code
//! (which adds and removes callbacks) and interrupt context (which
//! dispatches), so the entry list sits behind a short critical section:
//!
//! - `add` and `remove` hold the lock only for the structural change.
//! - `dispatch` holds it only long enough to clone the current entries, then
//!   runs callbacks with the lock released. A callback that adds or removes
//!   entries affects the next dispatch, never the one in progress.
//!
//! Entries live in a `Vec`, so teardown is an iterative drop and the order
//! of insertion is the order of dispatch.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use hatline_events::registry::CallbackRegistry;
//!
//! let registry = CallbackRegistry::new("example").unwrap();
//! let hits = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&hits);
//! let id = registry.add_fn(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! }).unwrap();
//!
//! assert_eq!(registry.dispatch().unwrap(), 1);
//! registry.remove(id).unwrap();
//! assert_eq!(registry.dispatch().unwrap(), 0);
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hatline_core::{Error, Result};
use parking_lot::Mutex;
use tracing::{trace, warn};

/// Entries reserved up front so the first few registrations do not allocate.
const INITIAL_CAPACITY: usize = 4;

/// Zero-argument callback shared between the registry and its owner.
pub type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Opaque token identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry {
    id: CallbackId,
    callback: Callback,
}

pub struct CallbackRegistry {
    name: String,
    /// `None` once destroyed (or before initialisation).
    entries: Mutex<Option<Vec<Entry>>>,
    next_id: AtomicU64,
}

impl CallbackRegistry {
    /// Create an empty, initialised registry.
    ///
    /// # Errors
    /// Returns `Error::AllocationFailure` if the initial storage cannot be reserved.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let registry = Self::uninitialized(name);
        registry.initialize()?;
        Ok(registry)
    }

    /// Create a registry handle with no list behind it. Every mutation fails
    /// with `RegistryNotInitialized` until [`initialize`](Self::initialize).
    #[must_use]
    pub fn uninitialized(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Give the handle an empty list. A no-op on an initialised registry.
    pub fn initialize(&self) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.is_none() {
            let mut list = Vec::new();
            list.try_reserve(INITIAL_CAPACITY)
                .map_err(|e| Error::AllocationFailure(format!("{} registry: {e}", self.name)))?;
            *entries = Some(list);
        }
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.entries.lock().is_some()
    }

    /// Number of registered callbacks. Zero when destroyed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().as_ref().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a callback at the tail.
    ///
    /// # Errors
    /// - `Error::RegistryNotInitialized` if the registry was destroyed.
    /// - `Error::AllocationFailure` if the list cannot grow.
    pub fn add(&self, callback: Callback) -> Result<CallbackId> {
        let mut guard = self.entries.lock();
        let entries = guard.as_mut().ok_or_else(|| self.not_initialized())?;

        entries
            .try_reserve(1)
            .map_err(|e| Error::AllocationFailure(format!("{} registry: {e}", self.name)))?;

        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entries.push(Entry { id, callback });
        trace!("Added callback {} to {} registry", id, self.name);
        Ok(id)
    }

    /// Convenience wrapper around [`add`](Self::add) for closures.
    pub fn add_fn<F>(&self, callback: F) -> Result<CallbackId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add(Arc::new(callback))
    }

    /// Remove the registration identified by `id`.
    ///
    /// # Errors
    /// - `Error::RegistryNotInitialized` if the registry was destroyed.
    /// - `Error::CallbackNotFound` if `id` is not registered.
    pub fn remove(&self, id: CallbackId) -> Result<()> {
        self.remove_where(|entry| entry.id == id)?
            .map(|_| ())
            .ok_or_else(|| Error::CallbackNotFound(id.to_string()))
    }

    /// Remove the first registration of this exact callback allocation.
    /// Later registrations of the same `Arc` stay in place.
    pub fn remove_callback(&self, callback: &Callback) -> Result<CallbackId> {
        self.remove_where(|entry| Arc::ptr_eq(&entry.callback, callback))?
            .ok_or_else(|| Error::CallbackNotFound("by identity".to_string()))
    }

    /// Remove the first entry matching `predicate`, returning its id.
    fn remove_where(&self, predicate: impl Fn(&Entry) -> bool) -> Result<Option<CallbackId>> {
        let mut guard = self.entries.lock();
        let entries = guard.as_mut().ok_or_else(|| self.not_initialized())?;

        let Some(index) = entries.iter().position(predicate) else {
            return Ok(None);
        };
        let entry = entries.remove(index);
        trace!("Removed callback {} from {} registry", entry.id, self.name);
        Ok(Some(entry.id))
    }

    /// Run every callback registered when the call starts, in order.
    ///
    /// A panicking callback is logged and skipped; the remaining callbacks
    /// still run. Returns the number of callbacks attempted.
    ///
    /// # Errors
    /// Returns `Error::RegistryNotInitialized` if the registry was destroyed.
    pub fn dispatch(&self) -> Result<usize> {
        let snapshot: Vec<(CallbackId, Callback)> = {
            let guard = self.entries.lock();
            let entries = guard.as_ref().ok_or_else(|| self.not_initialized())?;
            entries
                .iter()
                .map(|entry| (entry.id, Arc::clone(&entry.callback)))
                .collect()
        };

        for (id, callback) in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                warn!("Callback {} in {} registry panicked", id, self.name);
            }
        }

        Ok(snapshot.len())
    }

    /// Drop every entry and leave the handle uninitialised. Idempotent.
    pub fn destroy(&self) {
        let taken = self.entries.lock().take();
        // Callbacks are dropped outside the lock; their destructors may touch the registry.
        drop(taken);
    }

    fn not_initialized(&self) -> Error {
        Error::RegistryNotInitialized {
            registry: self.name.clone(),
        }
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> Callback {
            let sink = Arc::clone(&sink);
            Arc::new(move || sink.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_dispatch_order_is_registration_order() {
        let registry = CallbackRegistry::new("test").unwrap();
        let (log, make) = recorder();

        registry.add(make("a")).unwrap();
        registry.add(make("b")).unwrap();
        registry.add(make("c")).unwrap();

        assert_eq!(registry.dispatch().unwrap(), 3);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_add_then_remove_restores_dispatch() {
        let registry = CallbackRegistry::new("test").unwrap();
        let (log, make) = recorder();
        registry.add(make("a")).unwrap();

        let id = registry.add(make("b")).unwrap();
        registry.remove(id).unwrap();

        registry.dispatch().unwrap();
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[test]
    fn test_remove_middle_relinks() {
        let registry = CallbackRegistry::new("test").unwrap();
        let (log, make) = recorder();

        registry.add(make("a")).unwrap();
        let b = registry.add(make("b")).unwrap();
        registry.add(make("c")).unwrap();
        registry.remove(b).unwrap();

        registry.dispatch().unwrap();
        assert_eq!(*log.lock(), vec!["a", "c"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_head_and_tail() {
        let registry = CallbackRegistry::new("test").unwrap();
        let (log, make) = recorder();

        let a = registry.add(make("a")).unwrap();
        registry.add(make("b")).unwrap();
        let c = registry.add(make("c")).unwrap();
        registry.remove(a).unwrap();
        registry.remove(c).unwrap();

        registry.dispatch().unwrap();
        assert_eq!(*log.lock(), vec!["b"]);
    }

    #[test]
    fn test_remove_unknown_id() {
        let registry = CallbackRegistry::new("test").unwrap();
        let id = registry.add_fn(|| {}).unwrap();
        registry.remove(id).unwrap();

        assert!(matches!(
            registry.remove(id),
            Err(Error::CallbackNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_callback_takes_first_duplicate_only() {
        let registry = CallbackRegistry::new("test").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let shared: Callback = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let first = registry.add(Arc::clone(&shared)).unwrap();
        let second = registry.add(Arc::clone(&shared)).unwrap();

        assert_eq!(registry.remove_callback(&shared).unwrap(), first);
        assert_eq!(registry.len(), 1);

        registry.dispatch().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        registry.remove(second).unwrap();
        assert!(matches!(
            registry.remove_callback(&shared),
            Err(Error::CallbackNotFound { .. })
        ));
    }

    #[test]
    fn test_destroy_twice_is_noop() {
        let registry = CallbackRegistry::new("test").unwrap();
        registry.add_fn(|| {}).unwrap();

        registry.destroy();
        assert!(!registry.is_initialized());
        assert!(registry.is_empty());

        registry.destroy();
        assert!(!registry.is_initialized());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_operations_after_destroy() {
        let registry = CallbackRegistry::new("test").unwrap();
        let id = registry.add_fn(|| {}).unwrap();
        registry.destroy();

        assert!(matches!(
            registry.add_fn(|| {}),
            Err(Error::RegistryNotInitialized { .. })
        ));
        assert!(matches!(
            registry.remove(id),
            Err(Error::RegistryNotInitialized { .. })
        ));
        assert!(matches!(
            registry.dispatch(),
            Err(Error::RegistryNotInitialized { .. })
        ));
    }

    #[test]
    fn test_reinitialize_after_destroy() {
        let registry = CallbackRegistry::new("test").unwrap();
        registry.add_fn(|| {}).unwrap();
        registry.destroy();

        registry.initialize().unwrap();
        assert!(registry.is_initialized());
        assert_eq!(registry.dispatch().unwrap(), 0);
    }

    #[test]
    fn test_uninitialized_rejects_add() {
        let registry = CallbackRegistry::uninitialized("pending");
        let err = registry.add_fn(|| {}).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Callback registry 'pending' is not initialised"
        );
    }

    #[test]
    fn test_empty_dispatch() {
        let registry = CallbackRegistry::new("test").unwrap();
        assert_eq!(registry.dispatch().unwrap(), 0);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_dispatch() {
        let registry = CallbackRegistry::new("test").unwrap();
        let (log, make) = recorder();

        registry.add(make("before")).unwrap();
        registry.add_fn(|| panic!("callback failure")).unwrap();
        registry.add(make("after")).unwrap();

        assert_eq!(registry.dispatch().unwrap(), 3);
        assert_eq!(*log.lock(), vec!["before", "after"]);
    }

    #[test]
    fn test_callback_mutating_registry_uses_snapshot() {
        let registry = Arc::new(CallbackRegistry::new("test").unwrap());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_registry = Arc::clone(&registry);
        let inner_hits = Arc::clone(&hits);
        registry
            .add_fn(move || {
                let counter = Arc::clone(&inner_hits);
                inner_registry
                    .add_fn(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            })
            .unwrap();

        // The callback added during the first dispatch is not part of it.
        assert_eq!(registry.dispatch().unwrap(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(registry.dispatch().unwrap(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_removing_itself() {
        let registry = Arc::new(CallbackRegistry::new("test").unwrap());
        let slot: Arc<Mutex<Option<CallbackId>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_registry = Arc::clone(&registry);
        let inner_slot = Arc::clone(&slot);
        let counter = Arc::clone(&hits);
        let id = registry
            .add_fn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = inner_slot.lock().take() {
                    inner_registry.remove(id).unwrap();
                }
            })
            .unwrap();
        *slot.lock() = Some(id);

        registry.dispatch().unwrap();
        registry.dispatch().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = CallbackRegistry::new("test").unwrap();
        let a = registry.add_fn(|| {}).unwrap();
        let b = registry.add_fn(|| {}).unwrap();
        assert_ne!(a, b);
        assert!(a < b);
    }
}
