use anyhow::Context as _;
use axum::body::Bytes;
use records_server::db::InMemoryDocumentStore;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

/// Patient with documents in two collections that both reference `scan1.pdf`.
pub const PATIENT_ID: &str = "12345";

/// Export tree contents, relative path and bytes.
pub const EXPORT_FILES: &[(&str, &[u8])] = &[
    ("demographic_files/scan1.pdf", b"%PDF-1.4 demographic scan"),
    ("notes_files/note2.txt", b"follow-up in two weeks"),
    ("labs/report.pdf", b"%PDF-1.4 lab report"),
    ("imaging/report.pdf", b"%PDF-1.4 imaging report"),
];

pub fn write_export_tree(root: &Path) -> anyhow::Result<()> {
    for (relative, content) in EXPORT_FILES {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create export subdirectory")?;
        }
        fs::write(&path, content).with_context(|| format!("write {relative}"))?;
    }
    Ok(())
}

pub fn export_file(relative: &str) -> &'static [u8] {
    EXPORT_FILES
        .iter()
        .find(|(path, _)| *path == relative)
        .map(|(_, content)| *content)
        .unwrap_or_default()
}

pub fn seeded_store() -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new();
    store.insert(
        "demographic",
        json!({
            "patientdetails": {
                "athenapatientid": PATIENT_ID,
                "firstname": "Ada",
                "lastname": "Lovelace"
            },
            "reference": "scan1.pdf"
        }),
    );
    store.insert(
        "notes",
        json!({
            "patientdetails": {"athenapatientid": PATIENT_ID},
            "attachments": [
                {"reference": "scan1.pdf"},
                {"reference": "note2.txt"}
            ]
        }),
    );
    store.insert(
        "demographic",
        json!({
            "patientdetails": {
                "athenapatientid": "777",
                "firstname": "Grace",
                "lastname": "Hopper"
            }
        }),
    );
    store
}

pub fn to_json_body(value: &Value) -> anyhow::Result<Bytes> {
    Ok(Bytes::from(
        serde_json::to_vec(value).context("serialize JSON body")?,
    ))
}
