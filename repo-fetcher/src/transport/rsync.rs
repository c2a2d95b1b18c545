//! rsync transport
//!
//! Spawns the configured `rsync` binary to copy remote content into a local
//! mirror directory laid out as `<mirror>/<host>/<path>`.

use crate::error::{FetchError, FetchResult};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use url::Url;

#[derive(Debug, Clone)]
pub struct RsyncTransport {
    binary: String,
    mirror_directory: PathBuf,
    timeout: Duration,
}

impl RsyncTransport {
    pub fn new(binary: impl Into<String>, mirror_directory: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            mirror_directory: mirror_directory.into(),
            timeout,
        }
    }

    /// Local mirror path of an rsync URI
    pub fn local_path(&self, uri: &Url) -> FetchResult<PathBuf> {
        if uri.scheme() != "rsync" {
            return Err(FetchError::new(uri.as_str(), "not an rsync URI"));
        }
        let host = uri
            .host_str()
            .ok_or_else(|| FetchError::new(uri.as_str(), "rsync URI has no host"))?;

        let relative = Path::new(uri.path().trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(FetchError::new(uri.as_str(), "rsync URI path escapes the mirror"));
        }

        Ok(self.mirror_directory.join(host).join(relative))
    }

    /// Copy a single object and return its content
    pub async fn fetch_file(&self, uri: &Url) -> FetchResult<Vec<u8>> {
        let destination = self.local_path(uri)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::new(uri.as_str(), format!("cannot create mirror directory: {}", e)))?;
        }

        self.run(uri, &["--times", "--compress"], &destination).await?;

        tokio::fs::read(&destination)
            .await
            .map_err(|e| FetchError::new(uri.as_str(), format!("cannot read mirrored file: {}", e)))
    }

    /// Synchronize a repository directory and list everything under it as
    /// `(uri, content)` pairs
    pub async fn fetch_directory(&self, uri: &Url) -> FetchResult<Vec<(String, Vec<u8>)>> {
        let destination = self.local_path(uri)?;
        tokio::fs::create_dir_all(&destination)
            .await
            .map_err(|e| FetchError::new(uri.as_str(), format!("cannot create mirror directory: {}", e)))?;

        self.run(uri, &["--recursive", "--delete", "--times", "--compress"], &destination)
            .await?;

        let base = uri.as_str().trim_end_matches('/');
        let mut objects = Vec::new();
        let mut pending = vec![destination.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| FetchError::new(uri.as_str(), format!("cannot list mirror: {}", e)))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| FetchError::new(uri.as_str(), format!("cannot list mirror: {}", e)))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| FetchError::new(uri.as_str(), e.to_string()))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let Ok(relative) = path.strip_prefix(&destination) else {
                        continue;
                    };
                    let relative: Vec<_> = relative
                        .components()
                        .filter_map(|c| c.as_os_str().to_str())
                        .collect();
                    let content = tokio::fs::read(&path)
                        .await
                        .map_err(|e| FetchError::new(uri.as_str(), format!("cannot read mirrored file: {}", e)))?;
                    objects.push((format!("{}/{}", base, relative.join("/")), content));
                }
            }
        }

        objects.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(objects)
    }

    async fn run(&self, uri: &Url, flags: &[&str], destination: &Path) -> FetchResult<()> {
        let source = if flags.contains(&"--recursive") && !uri.as_str().ends_with('/') {
            format!("{}/", uri)
        } else {
            uri.to_string()
        };
        let target = if flags.contains(&"--recursive") {
            format!("{}/", destination.display())
        } else {
            destination.display().to_string()
        };

        tracing::debug!(uri = %uri, destination = %target, "Running rsync");

        let mut command = Command::new(&self.binary);
        command.args(flags).arg(&source).arg(&target).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| FetchError::new(uri.as_str(), format!("rsync timed out after {:?}", self.timeout)))?
            .map_err(|e| FetchError::new(uri.as_str(), format!("cannot run {}: {}", self.binary, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(FetchError::new(
                uri.as_str(),
                format!("rsync exited with {}: {}", output.status, stderr.trim()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(mirror: &Path, binary: &str) -> RsyncTransport {
        RsyncTransport::new(binary, mirror, Duration::from_secs(5))
    }

    #[test]
    fn test_local_path_layout() {
        let rsync = transport(Path::new("/var/lib/rpki"), "rsync");
        let uri = Url::parse("rsync://rpki.example.net/repository/ta/ta.cer").unwrap();
        assert_eq!(
            rsync.local_path(&uri).unwrap(),
            PathBuf::from("/var/lib/rpki/rpki.example.net/repository/ta/ta.cer")
        );
    }

    #[test]
    fn test_local_path_rejects_other_schemes() {
        let rsync = transport(Path::new("/var/lib/rpki"), "rsync");
        let uri = Url::parse("https://rpki.example.net/ta.cer").unwrap();
        assert!(rsync.local_path(&uri).is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let rsync = transport(dir.path(), "/nonexistent/rsync");
        let uri = Url::parse("rsync://rpki.example.net/ta/ta.cer").unwrap();

        let err = rsync.fetch_file(&uri).await.unwrap_err();
        assert_eq!(err.uri, uri.as_str());
        assert!(err.message.contains("cannot run"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_rsync_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let rsync = transport(dir.path(), "false");
        let uri = Url::parse("rsync://rpki.example.net/ta/ta.cer").unwrap();

        let err = rsync.fetch_file(&uri).await.unwrap_err();
        assert!(err.message.starts_with("rsync exited with"));
    }
}
