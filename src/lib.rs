//! Spawn, monitor, and compose external OS processes from a fluent,
//! immutable command-template builder.
//!
//! ## Modules
//!
//! - [`template`] - Immutable, copy-on-bake command configuration
//! - [`env`] - Environment-mapping state and merge semantics
//! - [`options`] - The options record accepted by a `bake_opts` call
//! - [`modifier`] - Tagged-variant modifier dispatch
//! - [`builder`] - The fluent launcher (`Builder`) and its terminal operations
//! - [`io`] - Polymorphic input/output bindings resolved to byte streams
//! - [`process`] - The running-command lifecycle engine (spawn, monitor, FSM)
//! - [`error`] - The public error taxonomy
//!
//! ```no_run
//! # async fn example() -> shexec::Result<()> {
//! let out = shexec::sh("echo").bake_args(["hi"]).output().await?;
//! assert_eq!(out, "hi\n");
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod env;
pub mod error;
pub mod io;
pub mod modifier;
pub mod options;
pub mod process;
pub mod template;

pub use builder::{Builder, CallOutcome};
pub use error::{Error, Result};
pub use io::{InputSource, OutputSink};
pub use modifier::Modifier;
pub use options::CommandOptions;
pub use process::{ExitOutcome, RunningCommand, State};
pub use template::CommandTemplate;

/// Construct a new fluent launcher for `name`.
///
/// Equivalent to [`Builder::new`], exposed as a free function so the common
/// call site reads `shexec::sh("bash").bake_args(["-c", "..."]).run()`
/// without an extra import.
pub fn sh(name: impl Into<String>) -> Builder {
    Builder::new(name)
}
