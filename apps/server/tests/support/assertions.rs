use anyhow::Context as _;
use axum::http::StatusCode;
use serde_json::Value;
use std::io::{Cursor, Read};

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "{context}: unexpected status");
}

pub fn json_body(body: &[u8]) -> anyhow::Result<Value> {
    serde_json::from_slice(body).context("parse JSON response body")
}

/// Error bodies carry a single user-facing `message`.
pub fn assert_error_message(body: &[u8], expected: &str) -> anyhow::Result<()> {
    let value = json_body(body)?;
    assert_eq!(
        value.get("message").and_then(|m| m.as_str()),
        Some(expected),
        "unexpected error body: {value}"
    );
    Ok(())
}

/// Entry names and contents of a zip archive, in archive order.
pub fn zip_entries(bytes: &[u8]) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("open zip archive")?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).context("read zip entry")?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .context("read zip entry content")?;
        entries.push((file.name().to_string(), content));
    }
    Ok(entries)
}
