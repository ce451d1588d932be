//! Resolves polymorphic input/output bindings to a uniform byte-stream view.

mod input;
mod output;

pub use input::InputSource;
pub use output::OutputSink;
