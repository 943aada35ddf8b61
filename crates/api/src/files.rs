use anyhow::Context;
use chrono::Utc;
use rand::Rng;
use std::path::{Path, PathBuf};

// Disk-backed store for submission and material uploads. Stored names are
// prefixed with a timestamp and a random suffix so two uploads of the same
// file never collide; the client's original name is kept separately.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub original_name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size: i64,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save(
        &self,
        original_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredFile> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating upload dir {}", self.root.display()))?;

        let safe = sanitize_file_name(original_name);
        let unique = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            rand::thread_rng().gen_range(0..1_000_000_000u32),
            safe
        );
        let path = self.root.join(&unique);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing upload {}", path.display()))?;

        Ok(StoredFile {
            file_name: unique.clone(),
            original_name: original_name.to_string(),
            storage_path: format!("/uploads/{unique}"),
            mime_type: mime_type.to_string(),
            size: bytes.len() as i64,
        })
    }
}

// Client-supplied names are untrusted; keep a path-safe basename only.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        cleaned
    }
}
