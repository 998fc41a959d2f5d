//! Output file helpers.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

fn temp_path_for(path: &Path) -> PathBuf {
    let mut temp = path.to_path_buf();
    match path.file_name() {
        Some(name) => temp.set_file_name(format!(".{}.tmp", name.to_string_lossy())),
        None => temp.push(".tmp"),
    }
    temp
}

/// Whether `output` names the same file as the existing `source`.
///
/// `output` need not exist; its parent is resolved instead.
pub fn is_same_file(source: &Path, output: &Path) -> bool {
    let Ok(source) = source.canonicalize() else {
        return false;
    };
    let output = match output.canonicalize() {
        Ok(path) => path,
        Err(_) => {
            let parent = output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            match (parent.canonicalize(), output.file_name()) {
                (Ok(parent), Some(name)) => parent.join(name),
                _ => return false,
            }
        }
    };
    source == output
}

/// Write `contents` to `path` atomically.
///
/// Missing parent directories are created. The data goes to a hidden sibling
/// first and is renamed into place, so readers never see a partial file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let temp = temp_path_for(path);
    let written = async {
        let mut file = fs::File::create(&temp).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        fs::rename(&temp, path).await
    }
    .await;

    if written.is_err() {
        let _ = fs::remove_file(&temp).await;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/out.md");

        write_atomic(&path, b"hello").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        assert!(!dir.path().join("a/b/.out.md.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.md");
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_is_same_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("doc.tmpl.md");
        std::fs::write(&source, "x").unwrap();

        assert!(is_same_file(&source, &dir.path().join("./doc.tmpl.md")));
        assert!(!is_same_file(&source, &dir.path().join("out/doc.tmpl.md")));
        assert!(!is_same_file(&source, &dir.path().join("other.md")));
        assert!(!is_same_file(&dir.path().join("missing.md"), &source));
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path_for(Path::new("/x/doc.md")),
            PathBuf::from("/x/.doc.md.tmp")
        );
    }
}
