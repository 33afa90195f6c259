//! Application descriptor emission.

use pwa_common::{PwaError, Result};
use serde_json::Value;
use tracing::info;

/// Output path of the descriptor, relative to the build root.
pub const MANIFEST_FILE: &str = "manifest.webmanifest";

const STRING_FIELDS: [&str; 9] = [
    "name",
    "short_name",
    "description",
    "start_url",
    "scope",
    "display",
    "theme_color",
    "background_color",
    "orientation",
];

/// Reject descriptors a browser would not accept as a manifest.
///
/// Only the shape of well-known members is checked; unknown members pass
/// through untouched.
pub fn validate_manifest(descriptor: &Value) -> Result<()> {
    let Some(members) = descriptor.as_object() else {
        return Err(PwaError::manifest(format!(
            "descriptor must be a JSON object, got {}",
            kind(descriptor)
        )));
    };

    for field in STRING_FIELDS {
        if let Some(value) = members.get(field) {
            if !value.is_string() {
                return Err(PwaError::manifest(format!(
                    "`{field}` must be a string, got {}",
                    kind(value)
                )));
            }
        }
    }

    if let Some(icons) = members.get("icons") {
        let Some(icons) = icons.as_array() else {
            return Err(PwaError::manifest(format!(
                "`icons` must be an array, got {}",
                kind(icons)
            )));
        };
        for (index, icon) in icons.iter().enumerate() {
            if !icon.get("src").is_some_and(Value::is_string) {
                return Err(PwaError::manifest(format!(
                    "`icons[{index}]` must be an object with a string `src`"
                )));
            }
        }
    }

    Ok(())
}

/// Serialize the descriptor as 2-space indented JSON. A missing descriptor
/// is emitted as an empty object.
pub fn emit_manifest(descriptor: Option<&Value>) -> Result<String> {
    let Some(descriptor) = descriptor else {
        return Ok("{}".to_string());
    };
    validate_manifest(descriptor)?;

    let source = serde_json::to_string_pretty(descriptor)?;
    info!(file = MANIFEST_FILE, bytes = source.len(), "Emitted manifest");
    Ok(source)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
