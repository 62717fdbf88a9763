use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use log::debug;

use crate::error::{Result, TestLensError};

use super::{ObjectStore, StoredObject};

const METADATA_SUFFIX: &str = ".meta.json";

/// Object store rooted at a local directory, laid out as `{root}/{bucket}/{path}`.
///
/// User metadata lives in a `{path}.meta.json` sidecar holding a flat
/// string map.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        for part in [bucket, path] {
            let relative = Path::new(part);
            if !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
            {
                return Err(TestLensError::Storage(format!(
                    "refusing to read outside the storage root: {bucket}/{path}"
                )));
            }
        }
        Ok(self.root.join(bucket).join(path))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn read_file(&self, bucket: &str, path: &str) -> Result<StoredObject> {
        let object_path = self.object_path(bucket, path)?;
        debug!("Reading {}", object_path.display());

        let data = match tokio::fs::read(&object_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TestLensError::NotFound {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut sidecar = object_path.into_os_string();
        sidecar.push(METADATA_SUFFIX);
        let metadata = match tokio::fs::read_to_string(&sidecar).await {
            Ok(content) => serde_json::from_str::<HashMap<String, String>>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(StoredObject { data, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn reads_object_and_sidecar_metadata() {
        let dir = TempDir::new().unwrap();
        let key = "test_analytics/repo_rollups/42.arrow";
        write(dir.path(), &format!("archive/{key}"), "payload");
        write(
            dir.path(),
            &format!("archive/{key}.meta.json"),
            r#"{"version": "1"}"#,
        );

        let object = LocalObjectStore::new(dir.path().to_path_buf())
            .read_file("archive", key)
            .await
            .unwrap();

        assert_eq!(object.data, b"payload");
        assert_eq!(object.metadata.get("version").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn metadata_is_optional() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "archive/test_results/rollups/1/main/7", "{}");

        let object = LocalObjectStore::new(dir.path().to_path_buf())
            .read_file("archive", "test_results/rollups/1/main/7")
            .await
            .unwrap();

        assert!(object.metadata.is_empty());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let error = LocalObjectStore::new(dir.path().to_path_buf())
            .read_file("archive", "absent")
            .await
            .unwrap_err();

        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn rejects_paths_escaping_the_root() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path().join("root"));

        for (bucket, path) in [("archive", "../secret"), ("..", "x"), ("archive", "/etc/passwd")] {
            let error = store.read_file(bucket, path).await.unwrap_err();
            assert!(matches!(error, TestLensError::Storage(_)), "{bucket}/{path}");
        }
    }
}
