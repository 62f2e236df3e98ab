//! Structural validation of produced document batches.
//!
//! Two shapes exist: insert batches (plain-valued documents) and update
//! batches (operator-valued documents scoped to a field whitelist). Nothing
//! here looks at domain semantics; only key presence and value shape.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use crate::error::JobError;

/// Solr atomic-update operators a field value may carry.
pub const UPDATE_OPERATORS: [&str; 4] = ["set", "add", "remove", "inc"];

fn holds_operator(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| UPDATE_OPERATORS.iter().any(|op| m.contains_key(*op)))
}

/// Parse a produced artifact as a JSON array of objects.
pub fn load_doc_array(path: &Path) -> Result<Vec<Map<String, Value>>, JobError> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw).map_err(|e| JobError::InvalidFormat {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let Value::Array(elements) = value else {
        return Err(JobError::InvalidFormat {
            path: path.to_path_buf(),
            detail: "top-level value is not an array".to_string(),
        });
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| match element {
            Value::Object(doc) => Ok(doc),
            other => Err(JobError::InvalidFormat {
                path: path.to_path_buf(),
                detail: format!("element {index} is not an object: {other}"),
            }),
        })
        .collect()
}

/// Validate an insert batch: every document carries the unique key and no
/// field value is operator-shaped (that would be an update in disguise).
pub fn validate_insert(path: &Path, unique_key: &str) -> Result<usize, JobError> {
    let docs = load_doc_array(path)?;

    for (index, doc) in docs.iter().enumerate() {
        if !doc.contains_key(unique_key) {
            return Err(JobError::MissingKey {
                path: path.to_path_buf(),
                index,
                key: unique_key.to_string(),
            });
        }
        for (field, value) in doc {
            if holds_operator(value) {
                return Err(JobError::InvalidInsertShape {
                    path: path.to_path_buf(),
                    index,
                    field: field.clone(),
                });
            }
        }
    }

    info!(path = %path.display(), docs = docs.len(), "Insert file passed validation");
    Ok(docs.len())
}

/// Validate an update batch: every document carries the unique key; every
/// other field is whitelisted and operator-shaped. Returns the documents so
/// the caller can extract the id set for backup.
pub fn validate_update(
    path: &Path,
    unique_key: &str,
    allowed_fields: &[String],
) -> Result<Vec<Map<String, Value>>, JobError> {
    let docs = load_doc_array(path)?;

    for (index, doc) in docs.iter().enumerate() {
        if !doc.contains_key(unique_key) {
            return Err(JobError::MissingKey {
                path: path.to_path_buf(),
                index,
                key: unique_key.to_string(),
            });
        }
        for (field, value) in doc {
            if field == unique_key {
                continue;
            }
            if !allowed_fields.iter().any(|f| f == field) {
                return Err(JobError::UnexpectedField {
                    path: path.to_path_buf(),
                    index,
                    field: field.clone(),
                    allowed: allowed_fields.to_vec(),
                });
            }
            if !holds_operator(value) {
                return Err(JobError::InvalidUpdateShape {
                    path: path.to_path_buf(),
                    index,
                    field: field.clone(),
                });
            }
        }
    }

    info!(
        path = %path.display(),
        docs = docs.len(),
        fields = ?allowed_fields,
        "Update file passed validation"
    );
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("batch.json");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rejects_non_array_payload() {
        let (_tmp, path) = write(r#"{"id": "1"}"#);
        let err = validate_insert(&path, "id").unwrap_err();
        assert!(matches!(err, JobError::InvalidFormat { .. }));
    }

    #[test]
    fn test_rejects_non_object_element() {
        let (_tmp, path) = write(r#"["just a string"]"#);
        let err = validate_insert(&path, "id").unwrap_err();
        assert!(matches!(err, JobError::InvalidFormat { .. }));
    }

    #[test]
    fn test_insert_requires_unique_key() {
        let (_tmp, path) = write(r#"[{"name": "x"}]"#);
        let err = validate_insert(&path, "id").unwrap_err();
        assert!(matches!(err, JobError::MissingKey { index: 0, .. }));
    }

    #[test]
    fn test_insert_rejects_operator_shaped_value() {
        let (_tmp, path) = write(r#"[{"id": "1", "count": {"inc": 5}}]"#);
        let err = validate_insert(&path, "id").unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidInsertShape { ref field, .. } if field == "count"
        ));
    }

    #[test]
    fn test_insert_allows_plain_object_values() {
        // An object value without any operator key is a plain nested value.
        let (_tmp, path) = write(r#"[{"id": "1", "meta": {"source": "lab"}}]"#);
        assert_eq!(validate_insert(&path, "id").unwrap(), 1);
    }

    #[test]
    fn test_insert_accepts_plain_documents() {
        let (_tmp, path) = write(r#"[{"id": "1", "name": "x"}, {"id": "2", "name": "y"}]"#);
        assert_eq!(validate_insert(&path, "id").unwrap(), 2);
    }

    #[test]
    fn test_update_accepts_whitelisted_operator_field() {
        let (_tmp, path) = write(r#"[{"id": "1", "count": {"set": 5}}]"#);
        let docs = validate_update(&path, "id", &fields(&["count"])).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], "1");
    }

    #[test]
    fn test_update_rejects_field_outside_whitelist() {
        let (_tmp, path) = write(r#"[{"id": "1", "other": {"set": 1}}]"#);
        let err = validate_update(&path, "id", &fields(&["count"])).unwrap_err();
        assert!(matches!(
            err,
            JobError::UnexpectedField { ref field, .. } if field == "other"
        ));
    }

    #[test]
    fn test_update_rejects_plain_value() {
        let (_tmp, path) = write(r#"[{"id": "1", "count": 5}]"#);
        let err = validate_update(&path, "id", &fields(&["count"])).unwrap_err();
        assert!(matches!(err, JobError::InvalidUpdateShape { .. }));
    }

    #[test]
    fn test_update_requires_unique_key() {
        let (_tmp, path) = write(r#"[{"count": {"set": 5}}]"#);
        let err = validate_update(&path, "id", &fields(&["count"])).unwrap_err();
        assert!(matches!(err, JobError::MissingKey { .. }));
    }
}
