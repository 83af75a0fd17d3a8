//! Committed configuration hand-off
//!
//! The snapshot is the JSON array the load balancer template consumes: one object per
//! resolved frontend, `null` where the declared service port is not discovered.

use lbsync_core::{FrontendEntry, LbsyncError, LbsyncResult, OutputConfig};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Subscriber writing committed configurations to disk and triggering a reload
pub struct SnapshotWriter {
    path: PathBuf,
    reload_command: Vec<String>,
}

impl SnapshotWriter {
    pub fn new(path: PathBuf, reload_command: Vec<String>) -> Self {
        Self {
            path,
            reload_command,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.snapshot_path.clone(), config.reload_command.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot, then start the reload command if one is configured
    ///
    /// The reload command is not waited for. Spawning it needs a tokio runtime.
    pub fn write(&self, entries: &[FrontendEntry]) -> LbsyncResult<()> {
        let content = serde_json::to_vec_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| self.storage_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.storage_error(e))?;

        info!(
            path = %self.path.display(),
            frontends = entries.len(),
            "Wrote configuration snapshot"
        );

        self.reload()
    }

    fn reload(&self) -> LbsyncResult<()> {
        let Some((program, args)) = self.reload_command.split_first() else {
            return Ok(());
        };

        let child = Command::new(program).args(args).spawn().map_err(|e| {
            LbsyncError::Subscriber(format!("Failed to run reload command {}: {}", program, e))
        })?;
        debug!(program = %program, pid = ?child.id(), "Started reload command");

        Ok(())
    }

    fn storage_error(&self, err: std::io::Error) -> LbsyncError {
        LbsyncError::Storage(format!("Failed to write {}: {}", self.path.display(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbsync_core::{Fingerprint, ResolvedFrontend, Server};

    fn entries() -> Vec<FrontendEntry> {
        vec![
            FrontendEntry::Resolved(ResolvedFrontend {
                id: Fingerprint::digest(b"web"),
                domain: "x.com".to_string(),
                healthcheck: serde_json::json!({"path": "/"}),
                servers: vec![Server {
                    id: "1".to_string(),
                    host: "10.0.0.1".to_string(),
                    port: 8080,
                }],
            }),
            FrontendEntry::Unresolved,
        ]
    }

    #[test]
    fn test_write_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("out/frontends.json"), Vec::new());

        writer.write(&entries()).unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(writer.path()).unwrap()).unwrap();
        assert_eq!(written[0]["domain"], "x.com");
        assert_eq!(written[0]["servers"][0]["port"], 8080);
        assert!(written[1].is_null());
    }

    #[test]
    fn test_write_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("frontends.json"), Vec::new());

        writer.write(&entries()).unwrap();
        writer.write(&[]).unwrap();

        assert_eq!(std::fs::read_to_string(writer.path()).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_reload_command_runs_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("reloaded");
        let writer = SnapshotWriter::new(
            dir.path().join("frontends.json"),
            vec!["touch".to_string(), marker.display().to_string()],
        );

        writer.write(&entries()).unwrap();
        assert!(writer.path().exists());

        // the command is not waited for
        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_missing_reload_program_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(
            dir.path().join("frontends.json"),
            vec!["/nonexistent/haproxy-reload".to_string()],
        );

        let err = writer.write(&entries()).unwrap_err();
        assert!(matches!(err, LbsyncError::Subscriber(_)));
        // the snapshot itself is still in place
        assert!(writer.path().exists());
    }
}
