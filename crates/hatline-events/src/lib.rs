//! Event detection and dispatch for GPIO hats.
//!
//! [`HatContext`] is the entry point: it identifies the attached hat from
//! its detection lines, guards the GPIO header with a cross-process lock,
//! and fans hardware edges out to registered callbacks.
//!
//! The building blocks are public for reuse and testing:
//!
//! - [`registry`]: ordered callback lists with snapshot dispatch
//! - [`debounce`]: the level-confirmation state machine and its line driver
//! - [`detection`]: signature matching and attach/detach tracking
//! - [`lock`]: the `flock`-based exclusivity lock
//! - [`timer`] and [`cooldown`]: the two timing primitives

pub mod context;
pub mod cooldown;
pub mod debounce;
pub mod detection;
pub mod lock;
pub mod registry;
pub mod timer;

pub use context::{EventClass, HatContext};
pub use lock::{Acquired, LockError, ProcessLock};
pub use registry::{Callback, CallbackId, CallbackRegistry};
