//! Pre-update backup of affected documents.
//!
//! Before an update batch is committed, the current state of every affected
//! document is fetched from the store in a single query and persisted
//! verbatim. The snapshot is taken at backup time, so it can race another
//! writer; the deployment assumes a single writer per core.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use crate::error::JobError;

/// Extract unique-key values from validated update documents. Validation
/// guarantees the key is present; non-string ids (numbers) are rendered in
/// their JSON form.
pub fn extract_ids(docs: &[Map<String, Value>], unique_key: &str) -> Vec<String> {
    docs.iter()
        .filter_map(|doc| doc.get(unique_key))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// Build the selection query: `key:(id1 OR id2 OR ...)`.
pub fn build_query(unique_key: &str, ids: &[String]) -> String {
    format!("{}:({})", unique_key, ids.join(" OR "))
}

/// Fetch the pre-update state of the given ids from `<base_url>/<core>` and
/// write the returned document array to `backup_file`. One POST for the
/// whole id set, with `rows` sized to it.
pub async fn backup_documents(
    client: &reqwest::Client,
    base_url: &str,
    core_name: &str,
    unique_key: &str,
    ids: &[String],
    backup_file: &Path,
) -> Result<usize, JobError> {
    let failed = |detail: String| JobError::BackupFailed {
        core: core_name.to_string(),
        detail,
    };

    if ids.is_empty() {
        // Nothing to snapshot; leave an empty array so the backup file
        // always exists alongside a committed update.
        std::fs::write(backup_file, "[]")?;
        return Ok(0);
    }

    let url = format!("{}/{}", base_url.trim_end_matches('/'), core_name);
    let form = [
        ("q", build_query(unique_key, ids)),
        ("wt", "json".to_string()),
        ("rows", ids.len().to_string()),
    ];

    let resp = client
        .post(&url)
        .form(&form)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(failed(format!("store returned {status}")));
    }

    let body: Value = resp
        .json()
        .await
        .map_err(|e| failed(format!("unreadable response body: {e}")))?;
    let docs = body
        .get("response")
        .and_then(|r| r.get("docs"))
        .and_then(Value::as_array)
        .ok_or_else(|| failed("response body is missing response.docs".to_string()))?;

    let payload = serde_json::to_string_pretty(docs).map_err(|e| failed(e.to_string()))?;
    std::fs::write(backup_file, payload)?;

    info!(
        core = core_name,
        docs = docs.len(),
        file = %backup_file.display(),
        "Backed up documents before update"
    );
    Ok(docs.len())
}
