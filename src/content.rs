//! Content file discovery shared by the event catalog and dialogue loaders.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::LoadError;

/// Every `*.json` file under `dir`, recursively, in path order
pub(crate) fn json_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut paths = Vec::new();
    collect_json_files(dir, &mut paths)?;
    paths.sort();
    Ok(paths)
}

/// Read and parse one JSON document
pub(crate) fn read_json(path: &Path) -> Result<Value, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn collect_json_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    let io_error = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();

        if path.is_dir() {
            collect_json_files(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_files_recursive_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("b/nested")).unwrap();
        std::fs::write(root.join("b/nested/z.json"), "{}").unwrap();
        std::fs::write(root.join("c.json"), "{}").unwrap();
        std::fs::write(root.join("a.json"), "{}").unwrap();
        std::fs::write(root.join("readme.txt"), "skip").unwrap();

        let found: Vec<PathBuf> = json_files(root)
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            found,
            vec![
                PathBuf::from("a.json"),
                PathBuf::from("b/nested/z.json"),
                PathBuf::from("c.json"),
            ]
        );
    }

    #[test]
    fn test_read_json_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();

        match read_json(&path) {
            Err(LoadError::Json { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }
}
