//! The immutable, copy-on-bake command descriptor.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::env::EnvState;
use crate::io::{InputSource, OutputSink};
use crate::options::CommandOptions;

/// A one-shot cell around a polymorphic I/O binding.
///
/// This is a deliberate, narrow exception to "forks share no mutable
/// state": a bound `InputSource`/`OutputSink` can hold a resource that
/// fundamentally cannot be duplicated (an open reader, the receiving half
/// of a queue) — there is no way to hand two independent owners a working
/// copy of the same in-flight stream. Rather than pretend otherwise, every
/// fork that shares an ancestor's I/O bake shares this one cell, and
/// whichever fork actually starts first claims the binding out of it
/// (`take_stdin`/`take_stdout`/`take_stderr` below); a fork that starts
/// afterward finds the cell empty and falls back to the platform default
/// for that stream (see `forked_io_binding_is_single_use_across_siblings` below for the
/// exact behavior this produces). Every other field on `CommandTemplate`
/// keeps the full by-value, no-shared-state semantics the rest of this
/// module documents.
type IoCell<T> = Arc<Mutex<Option<T>>>;

fn io_cell<T>(value: T) -> IoCell<T> {
    Arc::new(Mutex::new(Some(value)))
}

/// Immutable command configuration; every mutator in this module returns a
/// new value and leaves `self` untouched.
#[derive(Clone)]
pub struct CommandTemplate {
    pub(crate) name: String,
    pub(crate) args: Vec<String>,
    pub(crate) env: EnvState,
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) stdin_source: Option<IoCell<InputSource>>,
    pub(crate) stdout_sink: Option<IoCell<OutputSink>>,
    pub(crate) stderr_sink: Option<IoCell<OutputSink>>,
    pub(crate) ok_exit_codes: HashSet<i32>,
}

impl CommandTemplate {
    /// The default ok-exit set: success alone.
    fn default_ok_exit() -> HashSet<i32> {
        let mut set = HashSet::new();
        set.insert(0);
        set
    }

    pub fn new(name: impl Into<String>) -> Self {
        CommandTemplate {
            name: name.into(),
            args: Vec::new(),
            env: EnvState::Inherited,
            cwd: None,
            stdin_source: None,
            stdout_sink: None,
            stderr_sink: None,
            ok_exit_codes: Self::default_ok_exit(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ok_exit_codes(&self) -> &HashSet<i32> {
        &self.ok_exit_codes
    }

    /// Append arguments, preserving order.
    pub fn bake_args<I, S>(&self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.args.extend(args.into_iter().map(Into::into));
        next
    }

    /// Merge an environment mapping: empty value deletes, otherwise assigns.
    pub fn bake_env(&self, mapping: &std::collections::HashMap<String, String>) -> Self {
        let mut next = self.clone();
        next.env = self.env.merge(mapping);
        next
    }

    /// Reset the environment to an empty, explicit mapping.
    pub fn clear_env(&self) -> Self {
        let mut next = self.clone();
        next.env = EnvState::cleared();
        next
    }

    /// Merge an options record: only fields that are `Some` overwrite.
    pub fn bake_opts(&self, opts: CommandOptions) -> Self {
        let mut next = self.clone();
        if let Some(cwd) = opts.cwd {
            next.cwd = Some(cwd);
        }
        if let Some(stdin) = opts.stdin {
            next.stdin_source = Some(io_cell(stdin));
        }
        if let Some(stdout) = opts.stdout {
            next.stdout_sink = Some(io_cell(stdout));
        }
        if let Some(stderr) = opts.stderr {
            next.stderr_sink = Some(io_cell(stderr));
        }
        if let Some(codes) = opts.ok_exit_codes {
            if !codes.is_empty() {
                next.ok_exit_codes = codes;
            }
        }
        next
    }

    /// Take the stdin binding out of its cell, if one is set and not
    /// already taken by an earlier fork.
    pub(crate) fn take_stdin(&self) -> Option<InputSource> {
        self.stdin_source
            .as_ref()
            .and_then(|cell| cell.lock().unwrap_or_else(|e| e.into_inner()).take())
    }

    pub(crate) fn take_stdout(&self) -> Option<OutputSink> {
        self.stdout_sink
            .as_ref()
            .and_then(|cell| cell.lock().unwrap_or_else(|e| e.into_inner()).take())
    }

    pub(crate) fn take_stderr(&self) -> Option<OutputSink> {
        self.stderr_sink
            .as_ref()
            .and_then(|cell| cell.lock().unwrap_or_else(|e| e.into_inner()).take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bake_args_preserves_order_and_leaves_parent_untouched() {
        let base = CommandTemplate::new("echo");
        let child = base.bake_args(["-n", "hi"]);
        assert!(base.args.is_empty());
        assert_eq!(child.args, vec!["-n".to_string(), "hi".to_string()]);
    }

    #[test]
    fn forked_templates_share_no_mutable_state() {
        let base = CommandTemplate::new("sh").bake_args(["-c"]);
        let fork_a = base.bake_args(["echo a"]);
        let fork_b = base.bake_args(["echo b"]);
        assert_eq!(base.args, vec!["-c".to_string()]);
        assert_eq!(fork_a.args, vec!["-c".to_string(), "echo a".to_string()]);
        assert_eq!(fork_b.args, vec!["-c".to_string(), "echo b".to_string()]);
    }

    #[test]
    fn default_ok_exit_is_zero_only() {
        let base = CommandTemplate::new("true");
        assert_eq!(base.ok_exit_codes(), &[0].into_iter().collect());
    }

    #[test]
    fn explicit_ok_exit_does_not_implicitly_include_zero() {
        let base = CommandTemplate::new("bash").bake_opts(CommandOptions::new().ok_exit_codes([14]));
        assert_eq!(base.ok_exit_codes(), &[14].into_iter().collect());
        assert!(!base.ok_exit_codes().contains(&0));
    }

    #[test]
    fn empty_ok_exit_bake_is_not_provided() {
        let base = CommandTemplate::new("bash").bake_opts(CommandOptions::new().ok_exit_codes([14]));
        let rebaked = base.bake_opts(CommandOptions::new().ok_exit_codes(Vec::<i32>::new()));
        assert_eq!(rebaked.ok_exit_codes(), base.ok_exit_codes());
    }

    /// Two forks that both descend from the same I/O-bound ancestor share
    /// the underlying binding's one-shot cell — a documented, narrow
    /// exception to "forks share no mutable state" (see the `IoCell` doc
    /// comment above). The first fork to claim the binding gets it; the
    /// second observes an empty cell and would fall back to the platform
    /// default for that stream at spawn time.
    #[test]
    fn forked_io_binding_is_single_use_across_siblings() {
        use crate::io::InputSource;

        let parent = CommandTemplate::new("cat")
            .bake_opts(CommandOptions::new().stdin(InputSource::Text("hi".to_string())));
        let fork_a = parent.bake_args(["-"]);
        let fork_b = parent.bake_args(["-u"]);

        assert!(fork_a.take_stdin().is_some());
        assert!(
            fork_b.take_stdin().is_none(),
            "the second fork to start must observe the binding already claimed"
        );
    }
}
