//! Rendering of log arguments and captured bodies.
//!
//! Strings are kept verbatim. Everything else goes through `serde_json` and
//! falls back to its `Debug` form when serialization fails, so rendering
//! never errors and never yields an empty string for a non-empty value.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Render one argument the way it appears in a log message.
pub fn render_arg<T>(arg: &T) -> String
where
    T: Serialize + fmt::Debug + ?Sized,
{
    match serde_json::to_value(arg) {
        Ok(Value::String(s)) => s,
        Ok(value) => value.to_string(),
        Err(_) => format!("{:?}", arg),
    }
}

/// Space-join already rendered arguments.
pub fn join_args<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut message = String::new();
    for part in parts {
        if !message.is_empty() {
            message.push(' ');
        }
        message.push_str(part.as_ref());
    }
    message
}

/// Log a value as JSON: `tracing::info!(payload = ?Json(&order), "created")`.
///
/// Falls back to the value's own `Debug` output when it cannot be serialized.
pub struct Json<'a, T: ?Sized>(pub &'a T);

impl<T> fmt::Debug for Json<'_, T>
where
    T: Serialize + fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_arg(self.0))
    }
}

/// Turn captured body bytes into a record value.
///
/// JSON bodies are kept structured, anything else becomes lossy UTF-8 text.
/// Bodies over `limit` are cut and kept as text.
pub fn body_value(bytes: &[u8], limit: usize) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    if bytes.len() > limit {
        let cut = &bytes[..limit];
        return Some(Value::String(String::from_utf8_lossy(cut).into_owned()));
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}
