//! Typed failure taxonomy for command construction and execution.

use std::io;

/// Everything that can go wrong building, starting, or monitoring a command.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Error {
    /// The OS refused to spawn the process.
    #[error("failed to start command: {cause}")]
    StartError {
        #[cfg_attr(feature = "serde", serde(skip))]
        #[source]
        cause: io::Error,
    },

    /// The monitor task could not classify a wait outcome.
    #[error("failed to monitor command: {cause}")]
    MonitorError {
        #[cfg_attr(feature = "serde", serde(skip))]
        #[source]
        cause: anyhow::Error,
    },

    /// A builder call received an argument of a kind it does not recognize.
    #[error("builder received an argument of unrecognized kind: {kind_name}")]
    IncomprehensibleModifier { kind_name: String },

    /// `Run()` observed an exit code outside the template's ok-exit set.
    #[error("command {name:?} exited with unexpected status {code}")]
    UnexpectedExitCode { name: String, code: i32 },

    /// The I/O adapter could not resolve a value to a byte stream.
    #[error("cannot adapt value of kind {kind_name} to a byte stream")]
    UnsupportedBinding { kind_name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
