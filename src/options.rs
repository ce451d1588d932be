//! The options record accepted by a `bake_opts` call.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::io::{InputSource, OutputSink};

/// Fields recognized by a single options bake. Every field is optional;
/// only fields that are `Some` overwrite the template's existing value.
#[derive(Default)]
pub struct CommandOptions {
    pub cwd: Option<PathBuf>,
    pub stdin: Option<InputSource>,
    pub stdout: Option<OutputSink>,
    pub stderr: Option<OutputSink>,
    pub ok_exit_codes: Option<HashSet<i32>>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.cwd = Some(path.into());
        self
    }

    pub fn stdin(mut self, source: InputSource) -> Self {
        self.stdin = Some(source);
        self
    }

    pub fn stdout(mut self, sink: OutputSink) -> Self {
        self.stdout = Some(sink);
        self
    }

    pub fn stderr(mut self, sink: OutputSink) -> Self {
        self.stderr = Some(sink);
        self
    }

    /// Replace the ok-exit set. An empty set is treated as "not provided":
    /// a non-empty set always replaces the prior one outright rather than
    /// being unioned into it.
    pub fn ok_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        let codes: HashSet<i32> = codes.into_iter().collect();
        if !codes.is_empty() {
            self.ok_exit_codes = Some(codes);
        }
        self
    }
}
