use std::path::PathBuf;

use thiserror::Error;

use crate::types::{HatVariant, PinSample};

#[derive(Error, Debug)]
pub enum Error {
    // Detection errors
    #[error("{variant} hat is not attached")]
    HardwareNotAttached { variant: HatVariant },

    #[error("No supported hat is attached")]
    NoHatAttached,

    #[error("Signatures for {first} and {second} are both {sample}")]
    AmbiguousSignature {
        first: HatVariant,
        second: HatVariant,
        sample: PinSample,
    },

    #[error("Signature for {variant} matches the idle header pattern {sample}")]
    SignatureMatchesIdle { variant: HatVariant, sample: PinSample },

    // Lock errors
    #[error("Library is already in use by another process (lock {})", .path.display())]
    LibraryHeldElsewhere { path: PathBuf },

    #[error("Lock file {} is unusable: {source}", .path.display())]
    LockUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Registry errors
    #[error("Memory allocation failed: {0}")]
    AllocationFailure(String),

    #[error("Callback {0} not found")]
    CallbackNotFound(String),

    #[error("Callback registry '{registry}' is not initialised")]
    RegistryNotInitialized { registry: String },

    // Hardware errors
    #[error("Invalid pin: {0}")]
    InvalidPin(String),

    #[error("GPIO operation failed: {0}")]
    Gpio(String),

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
