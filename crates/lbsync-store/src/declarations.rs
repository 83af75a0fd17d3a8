//! Frontend declaration store

use lbsync_core::{FrontendDeclaration, LbsyncError, LbsyncResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// JSON file holding the operator's frontend declarations
pub struct DeclarationStore {
    path: PathBuf,
}

impl DeclarationStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with an empty list if it does not exist yet
    pub async fn init(&self) -> LbsyncResult<()> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, "[]").await?;
        info!(path = %self.path.display(), "Wrote initial declaration file");

        Ok(())
    }

    pub async fn load(&self) -> LbsyncResult<Vec<FrontendDeclaration>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            LbsyncError::Storage(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let declarations: Vec<FrontendDeclaration> =
            serde_json::from_str(&content).map_err(|e| {
                LbsyncError::Storage(format!("Failed to parse {}: {}", self.path.display(), e))
            })?;

        debug!(
            path = %self.path.display(),
            frontends = declarations.len(),
            "Loaded frontend declarations"
        );

        Ok(declarations)
    }

    /// Replace the stored declarations
    ///
    /// The new content is written next to the file and renamed over it, so readers never
    /// see a partial list.
    pub async fn save(&self, declarations: &[FrontendDeclaration]) -> LbsyncResult<()> {
        let content = serde_json::to_vec_pretty(declarations)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(
            path = %self.path.display(),
            frontends = declarations.len(),
            "Saved frontend declarations"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeclarationStore::new(dir.path().join("state/config.json"));

        store.init().await.unwrap();

        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "[]");
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"[{"service": {"id": "web", "port": 80}, "frontend": {"domain": "x.com"}}]"#,
        )
        .unwrap();
        let store = DeclarationStore::new(path);

        store.init().await.unwrap();

        let declarations = store.load().await.unwrap();
        assert_eq!(declarations, vec![FrontendDeclaration::new("web", "80", "x.com")]);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeclarationStore::new(dir.path().join("config.json"));
        store.init().await.unwrap();

        let declarations = vec![
            FrontendDeclaration::new("web", "80", "x.com"),
            FrontendDeclaration::new("api", "3000", "api.x.com"),
        ];
        store.save(&declarations).await.unwrap();

        assert_eq!(store.load().await.unwrap(), declarations);
        assert!(!dir.path().join("config.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_invalid_content_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"not": "a list"}"#).unwrap();

        let err = DeclarationStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, LbsyncError::Storage(_)));
    }
}
