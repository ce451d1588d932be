//! Tagged-variant modifier dispatch: each builder-call argument is
//! classified by a closed enum rather than runtime reflection.

use std::collections::HashMap;

use crate::options::CommandOptions;
use crate::template::CommandTemplate;

/// A single builder-call argument, classified by kind.
pub enum Modifier {
    Arg(String),
    Args(Vec<String>),
    Env(HashMap<String, String>),
    ClearEnv,
    Opts(CommandOptions),
}

impl Modifier {
    /// Apply this modifier to a template, producing a forked copy.
    pub fn apply(self, template: &CommandTemplate) -> CommandTemplate {
        match self {
            Modifier::Arg(arg) => template.bake_args([arg]),
            Modifier::Args(args) => template.bake_args(args),
            Modifier::Env(mapping) => template.bake_env(&mapping),
            Modifier::ClearEnv => template.clear_env(),
            Modifier::Opts(opts) => template.bake_opts(opts),
        }
    }
}

impl From<&str> for Modifier {
    fn from(value: &str) -> Self {
        Modifier::Arg(value.to_string())
    }
}

impl From<String> for Modifier {
    fn from(value: String) -> Self {
        Modifier::Arg(value)
    }
}

impl From<CommandOptions> for Modifier {
    fn from(value: CommandOptions) -> Self {
        Modifier::Opts(value)
    }
}

/// Dispatch a sequence of modifiers onto a template in order. Any failure
/// aborts before a new template is materialized; a closed `Modifier` enum
/// has no failure case today, but the signature is kept fallible for parity
/// with the dynamic parser below.
pub fn dispatch(
    template: &CommandTemplate,
    modifiers: impl IntoIterator<Item = Modifier>,
) -> crate::error::Result<CommandTemplate> {
    let mut current = template.clone();
    for modifier in modifiers {
        current = modifier.apply(&current);
    }
    Ok(current)
}

/// Parses a loosely-typed modifier description (e.g. a pipeline step read
/// from configuration) into a `Modifier`, preserving the one place the
/// original runtime-kind-switch genuinely survives: a value whose tag is
/// not one of the recognized kinds fails with `IncomprehensibleModifier`.
#[cfg(feature = "serde")]
pub fn from_json(value: &serde_json::Value) -> crate::error::Result<Modifier> {
    use crate::error::Error;

    let Some(obj) = value.as_object() else {
        return Err(Error::IncomprehensibleModifier {
            kind_name: json_kind_name(value).to_string(),
        });
    };

    match obj.get("kind").and_then(|v| v.as_str()) {
        Some("arg") => match obj.get("value").and_then(|v| v.as_str()) {
            Some(s) => Ok(Modifier::Arg(s.to_string())),
            None => Err(Error::IncomprehensibleModifier {
                kind_name: "arg (missing string value)".to_string(),
            }),
        },
        Some("args") => match obj.get("value").and_then(|v| v.as_array()) {
            Some(items) => {
                let mut strings = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) => strings.push(s.to_string()),
                        None => {
                            return Err(Error::IncomprehensibleModifier {
                                kind_name: "args (non-string element)".to_string(),
                            });
                        }
                    }
                }
                Ok(Modifier::Args(strings))
            }
            None => Err(Error::IncomprehensibleModifier {
                kind_name: "args (missing array value)".to_string(),
            }),
        },
        Some("env") => match obj.get("value").and_then(|v| v.as_object()) {
            Some(map) => {
                let mut mapping = HashMap::with_capacity(map.len());
                for (k, v) in map {
                    match v.as_str() {
                        Some(s) => {
                            mapping.insert(k.clone(), s.to_string());
                        }
                        None => {
                            return Err(Error::IncomprehensibleModifier {
                                kind_name: "env (non-string value)".to_string(),
                            });
                        }
                    }
                }
                Ok(Modifier::Env(mapping))
            }
            None => Err(Error::IncomprehensibleModifier {
                kind_name: "env (missing object value)".to_string(),
            }),
        },
        Some("clear_env") => Ok(Modifier::ClearEnv),
        Some("opts") => opts_from_json(obj.get("value")),
        Some(other) => Err(Error::IncomprehensibleModifier {
            kind_name: other.to_string(),
        }),
        None => Err(Error::IncomprehensibleModifier {
            kind_name: json_kind_name(value).to_string(),
        }),
    }
}

/// Parses the JSON-representable subset of an options record: `cwd`,
/// `stdin` (delegated to [`crate::io::InputSource::from_json`]), and
/// `ok_exit`. `stdout`/`stderr` have no JSON representation (a writer/queue
/// is a live Rust value) and are simply not recognized fields here — they
/// are set via [`crate::options::CommandOptions::stdout`]/`stderr` from Rust
/// call sites instead.
#[cfg(feature = "serde")]
fn opts_from_json(value: Option<&serde_json::Value>) -> crate::error::Result<Modifier> {
    use crate::error::Error;
    use crate::io::InputSource;

    let Some(obj) = value.and_then(|v| v.as_object()) else {
        return Err(Error::IncomprehensibleModifier {
            kind_name: "opts (missing object value)".to_string(),
        });
    };

    let mut opts = CommandOptions::new();

    if let Some(cwd) = obj.get("cwd") {
        match cwd.as_str() {
            Some(s) => opts = opts.cwd(s),
            None => {
                return Err(Error::IncomprehensibleModifier {
                    kind_name: "opts.cwd (non-string value)".to_string(),
                })
            }
        }
    }

    if let Some(stdin) = obj.get("stdin") {
        opts = opts.stdin(InputSource::from_json(stdin)?);
    }

    if let Some(ok_exit) = obj.get("ok_exit") {
        match ok_exit.as_array() {
            Some(items) => {
                let mut codes = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_i64() {
                        Some(n) => codes.push(n as i32),
                        None => {
                            return Err(Error::IncomprehensibleModifier {
                                kind_name: "opts.ok_exit (non-integer element)".to_string(),
                            })
                        }
                    }
                }
                opts = opts.ok_exit_codes(codes);
            }
            None => {
                return Err(Error::IncomprehensibleModifier {
                    kind_name: "opts.ok_exit (non-array value)".to_string(),
                })
            }
        }
    }

    Ok(Modifier::Opts(opts))
}

#[cfg(feature = "serde")]
fn json_kind_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object without a recognized \"kind\" tag",
    }
}
