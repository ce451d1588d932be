//! The fluent launcher: a `Builder` struct with named methods over a
//! forked-template value, rather than a runtime reflection-based callable.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::io::{InputSource, OutputSink};
use crate::modifier::{dispatch, Modifier};
use crate::options::CommandOptions;
use crate::process::{self, RunningCommand};
use crate::template::CommandTemplate;

/// Either a forked builder (one or more modifiers supplied) or a started
/// command (zero modifiers runs the accumulated template instead).
pub enum CallOutcome {
    Forked(Builder),
    Ran(RunningCommand),
}

/// The curried, call-through-call builder surface returned by [`crate::sh`].
#[derive(Clone)]
pub struct Builder {
    template: CommandTemplate,
}

impl Builder {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Builder {
            template: CommandTemplate::new(name),
        }
    }

    /// The general entry point: dispatch `modifiers` in order onto a fresh
    /// fork, or — with none supplied — run the accumulated template.
    pub async fn call(
        self,
        modifiers: impl IntoIterator<Item = Modifier>,
    ) -> Result<CallOutcome> {
        let mut iter = modifiers.into_iter().peekable();
        if iter.peek().is_none() {
            return Ok(CallOutcome::Ran(self.run().await?));
        }
        let template = dispatch(&self.template, iter)?;
        Ok(CallOutcome::Forked(Builder { template }))
    }

    /// Append arguments, returning a forked builder (side-effect-free on
    /// `self`).
    pub fn bake_args<I, S>(&self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Builder {
            template: self.template.bake_args(args),
        }
    }

    /// Merge an environment mapping into a forked builder.
    pub fn bake_env(&self, mapping: HashMap<String, String>) -> Self {
        Builder {
            template: self.template.bake_env(&mapping),
        }
    }

    /// Reset the environment to empty in a forked builder.
    pub fn clear_env(&self) -> Self {
        Builder {
            template: self.template.clear_env(),
        }
    }

    /// Merge an options record into a forked builder.
    pub fn bake_opts(&self, opts: CommandOptions) -> Self {
        Builder {
            template: self.template.bake_opts(opts),
        }
    }

    /// Materializes an I/O-bound OS command and hands it to the lifecycle
    /// engine.
    pub async fn start(self) -> Result<RunningCommand> {
        process::spawn(&self.template).await
    }

    /// `Start`, then `Wait`, then check the exit code against the ok-exit
    /// set.
    pub async fn run(self) -> Result<RunningCommand> {
        let name = self.template.name().to_string();
        let ok_exit_codes = self.template.ok_exit_codes().clone();
        let cmd = self.start().await?;
        let code = cmd.get_exit_code().await;
        if !ok_exit_codes.contains(&code) {
            return Err(Error::UnexpectedExitCode { name, code });
        }
        Ok(cmd)
    }

    /// `Start` with stdout bound to an internal buffer (stderr left as
    /// configured, or inherited), `Wait`, verify success, and return the
    /// buffer's contents as text.
    pub async fn output(self) -> Result<String> {
        let buffer = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let template = self
            .template
            .bake_opts(CommandOptions::new().stdout(OutputSink::Buffer(std::sync::Arc::clone(&buffer))));
        let builder = Builder { template };
        builder.run().await?;
        let bytes = buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Convenience constructor matching `InputSource`'s recognized kinds,
    /// exposed here so callers don't need to depend on the `io` module
    /// directly for the common cases.
    pub fn stdin_text(self, text: impl Into<String>) -> Self {
        self.bake_opts(CommandOptions::new().stdin(InputSource::Text(text.into())))
    }
}
