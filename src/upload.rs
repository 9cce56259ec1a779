//! Upload persistence: filename hygiene and writing attachment bytes under
//! the configured upload directory.

use std::path::Path;

use tokio::fs;
use uuid::Uuid;

use crate::error::{Result, SoapError};

const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_id: String,
    pub file_name: String,
    pub size: u64,
    /// Public path reported to the client, always `/uploads/<stored-name>`.
    pub path: String,
}

/// Strip path separators, traversal sequences, and NUL bytes; cap length.
pub fn sanitize_file_name(name: &str) -> String {
    let mut cleaned = name
        .replace("..", "")
        .replace(['/', '\\', '\0'], "");
    if cleaned.len() > MAX_FILE_NAME_LEN {
        let mut cut = MAX_FILE_NAME_LEN;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
    }
    cleaned
}

/// Write the payload as `<uuid>_<sanitized-name>` inside `upload_dir`,
/// creating the directory on demand. Filesystem failures surface as
/// server-classified errors; nothing is written before the caller's
/// validation has passed.
pub async fn store_file(upload_dir: &Path, file_name: &str, data: &[u8]) -> Result<StoredFile> {
    let file_id = Uuid::new_v4().to_string();
    fs::create_dir_all(upload_dir).await.map_err(|err| {
        SoapError::Storage(format!("failed to create upload directory: {err}"))
    })?;

    let stored_name = format!("{file_id}_{}", sanitize_file_name(file_name));
    let target = upload_dir.join(&stored_name);
    fs::write(&target, data)
        .await
        .map_err(|err| SoapError::Storage(format!("failed to save file: {err}")))?;

    Ok(StoredFile {
        file_id,
        file_name: file_name.to_string(),
        size: data.len() as u64,
        path: format!("/uploads/{stored_name}"),
    })
}
