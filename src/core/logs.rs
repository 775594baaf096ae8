//! Optional per-unit translation log

use std::path::Path;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::core::backend::Backend;

const LOG_FILE: &str = "translations.log";
const PREVIEW_CHARS: usize = 80;

/// Append one entry to `translations.log` under `directory`.
///
/// Log failures are warned and swallowed; a broken log directory must never
/// fail the translation itself.
pub(crate) async fn append_entry(directory: &Path, backend: Backend, status: &str, text: &str) {
    if let Err(e) = try_append(directory, backend, status, text).await {
        warn!("failed to write translation log: {}", e);
    }
}

async fn try_append(
    directory: &Path,
    backend: Backend,
    status: &str,
    text: &str,
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(directory).await?;
    let line = format!(
        "{} | {} | {} | {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        backend,
        status,
        preview(text)
    );
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(directory.join(LOG_FILE))
        .await?;
    file.write_all(line.as_bytes()).await
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_and_flattens() {
        assert_eq!(preview("short\ntext"), "short text");
        let long = "x".repeat(200);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
        assert!(cut.ends_with("..."));
    }

    #[tokio::test]
    async fn test_entries_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        append_entry(dir.path(), Backend::DeepL, "ok", "hello world").await;
        append_entry(dir.path(), Backend::DeepL, "error: timed out", "second").await;

        let content = tokio::fs::read_to_string(dir.path().join(LOG_FILE))
            .await
            .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("deepl"));
        assert!(lines[0].contains("ok"));
        assert!(lines[0].ends_with("hello world"));
        assert!(lines[1].contains("error: timed out"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("mt");
        append_entry(&nested, Backend::OpenAi, "ok", "hi").await;
        assert!(nested.join(LOG_FILE).exists());
    }
}
