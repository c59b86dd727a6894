//! Secrets spec decoding.
//!
//! A secrets spec is a YAML sequence of single-entry maps from the file path
//! to write to the Conjur variable id to read:
//!
//! ```yaml
//! - "file/path/A": "conjur/path/A"
//! - "file/path/B": "conjur/path/B"
//! ```

use std::collections::HashMap;

/// Decode a secrets spec into `variable id -> file path`.
///
/// Blank input and `[]` decode to an empty map; callers decide whether that
/// is acceptable. When an id appears twice the later entry wins.
pub fn parse_secrets_spec(spec: &str) -> Result<HashMap<String, String>, serde_yaml::Error> {
    if spec.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let entries: Option<Vec<HashMap<String, String>>> = serde_yaml::from_str(spec)?;

    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .flat_map(|entry| entry.into_iter())
        .map(|(path, id)| (id, path))
        .collect())
}
