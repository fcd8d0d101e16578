//! Canonical JSON serialization helpers.
//!
//! Every persisted artifact (model, schema, metrics, version descriptor,
//! manifest) goes through these helpers so object keys are sorted and the
//! byte output is stable. Artifact hashes are taken over these bytes.

use serde::{ser::Error as SerdeSerError, Serialize};
use serde_json::{self, map::Map, ser::PrettyFormatter, Serializer, Value};
use std::io::Write;

/// Recursively sort JSON object keys to obtain a canonical representation.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }

            Value::Object(sorted)
        }
        Value::Array(elements) => Value::Array(elements.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize a value into canonical JSON and write it to the provided writer.
pub fn write_canonical_json<T, W>(mut writer: W, value: &T) -> Result<(), serde_json::Error>
where
    T: Serialize,
    W: Write,
{
    let canonical_value = canonicalize(serde_json::to_value(value)?);
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    canonical_value.serialize(&mut serializer)?;
    Ok(())
}

/// Serialize a value into canonical JSON and return it as a String.
pub fn canonical_json_string<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: Serialize,
{
    let mut buffer = Vec::new();
    write_canonical_json(&mut buffer, value)?;
    String::from_utf8(buffer).map_err(|err| SerdeSerError::custom(err.to_string()))
}

/// BLAKE3 digest (hex) of raw artifact bytes
pub fn blake3_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// BLAKE3 digest (hex) of a value's canonical JSON form
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(blake3_hex(canonical_json_string(value)?.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_keys_are_sorted() {
        let mut map = HashMap::new();
        map.insert("zeta", 1);
        map.insert("alpha", 2);
        map.insert("mid", 3);

        let json = canonical_json_string(&map).unwrap();
        let alpha = json.find("alpha").unwrap();
        let mid = json.find("mid").unwrap();
        let zeta = json.find("zeta").unwrap();
        assert!(alpha < mid && mid < zeta);
    }

    #[test]
    fn test_hash_is_stable_across_insertion_order() {
        let mut a = HashMap::new();
        a.insert("x", 1);
        a.insert("y", 2);
        let mut b = HashMap::new();
        b.insert("y", 2);
        b.insert("x", 1);

        let ha = hash_canonical_hex(&a).unwrap();
        assert_eq!(ha, hash_canonical_hex(&b).unwrap());
        assert_eq!(ha.len(), 64);
    }
}
