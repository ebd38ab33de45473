//! Prompt templates for oracle interactions.

use indexmap::IndexMap;

/// Build the normalization prompt for one chunk.
///
/// The chunk is embedded as a JSON-like object literal and the vocabulary as
/// a comma-separated list.
pub fn normalization_prompt(
    subject: &str,
    entries: &IndexMap<String, String>,
    vocabulary: &[String],
) -> String {
    let pairs = entries
        .iter()
        .map(|(key, value)| format!("{}: {}", quote(key), quote(value)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Convert each of the provided {subject} in the JSON object to one of the valid \
         {subject}: {}.\n\
         Return ONLY a JSON object where the keys match the input keys and each value is \
         the normalized value, with no additional formatting or explanation.\n\n\
         Input: {{{pairs}}}\n\
         Output:",
        vocabulary.join(", ")
    )
}

/// JSON string literal, so quotes inside OCR text cannot break the object.
fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
