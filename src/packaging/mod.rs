//! Packaging pipeline: uploaded source file → standalone executable.
//!
//! ## Flow
//!
//! 1. Create a job directory `<work_root>/<unix millis>`.
//! 2. Write the uploaded bytes there and mark the file executable.
//! 3. Run the packaging tool in the job directory, bounded by a timeout,
//!    capturing stdout/stderr incrementally so a timeout still yields logs.
//! 4. Check for `<dist_dir>/<stem>[.<ext>]`. Its presence is the success
//!    criterion; the exit code is recorded but not interpreted.
//! 5. Optionally write the Android/Kivy companion project.
//!
//! Job directories are left in place after the request.

pub mod skeleton;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::PackagingConfig;
use crate::errors::{BuildError, ValidationError};

pub use skeleton::AndroidSkeleton;

/// Name of the companion project directory inside a job directory.
pub const ANDROID_PROJECT_DIR: &str = "android_project";

/// Check that `name` is a single, ordinary path component.
fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// An uploaded source file, validated for use as a file name on disk.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Missing("fileName"));
        }
        if !is_plain_component(trimmed) || trimmed.starts_with('-') {
            return Err(ValidationError::InvalidFileName(name));
        }
        Ok(Self {
            name: trimmed.to_string(),
            bytes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Result of a successful build.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArtifact {
    /// Job directory name, used to address the artifact for download.
    pub job_id: String,
    pub work_dir: PathBuf,
    pub executable_path: PathBuf,
    pub project_dir: Option<PathBuf>,
    pub logs: String,
    pub exit_code: Option<i32>,
}

impl BuildArtifact {
    /// File name of the executable, as addressed by the download route.
    pub fn executable_name(&self) -> String {
        self.executable_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Runs the packaging tool for uploaded source files.
#[derive(Debug, Clone)]
pub struct Packager {
    config: PackagingConfig,
}

impl Packager {
    pub fn new(config: PackagingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PackagingConfig {
        &self.config
    }

    /// Expected executable path for `source` inside `work_dir`.
    pub fn expected_artifact(&self, work_dir: &Path, source: &SourceFile) -> PathBuf {
        let mut name = source.stem().to_string();
        let ext = self.config.artifact_extension.trim_start_matches('.');
        if !ext.is_empty() {
            name.push('.');
            name.push_str(ext);
        }
        work_dir.join(&self.config.dist_dir).join(name)
    }

    /// Tool arguments with `{file}` and `{stem}` substituted.
    fn tool_args(&self, source: &SourceFile) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|a| a.replace("{file}", source.name()).replace("{stem}", source.stem()))
            .collect()
    }

    /// Package `source` into an executable.
    pub async fn build(&self, source: &SourceFile) -> Result<BuildArtifact, BuildError> {
        let job_id = chrono::Utc::now().timestamp_millis().to_string();
        let work_dir = self.config.work_root.join(&job_id);
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|source| BuildError::Workspace {
                path: work_dir.clone(),
                source,
            })?;

        let source_path = work_dir.join(source.name());
        tokio::fs::write(&source_path, source.bytes())
            .await
            .map_err(|e| BuildError::Workspace {
                path: source_path.clone(),
                source: e,
            })?;
        mark_executable(&source_path)
            .await
            .map_err(|e| BuildError::Workspace {
                path: source_path.clone(),
                source: e,
            })?;

        tracing::info!(
            job = %job_id,
            file = source.name(),
            bytes = source.bytes().len(),
            "Starting packaging job"
        );

        let (logs, exit_code) = self.run_tool(&work_dir, source).await?;

        let executable_path = self.expected_artifact(&work_dir, source);
        if !executable_path.exists() {
            tracing::warn!(job = %job_id, path = %executable_path.display(), ?exit_code, "Artifact not produced");
            return Err(BuildError::ArtifactMissing {
                path: executable_path,
                logs,
            });
        }

        let project_dir = if self.config.android_skeleton {
            let dir = work_dir.join(ANDROID_PROJECT_DIR);
            AndroidSkeleton::for_file(source.name())
                .write(&dir)
                .await
                .map_err(|e| BuildError::Skeleton {
                    path: dir.clone(),
                    source: e,
                })?;
            Some(dir)
        } else {
            None
        };

        tracing::info!(job = %job_id, path = %executable_path.display(), "Packaging job finished");
        Ok(BuildArtifact {
            job_id,
            work_dir,
            executable_path,
            project_dir,
            logs,
            exit_code,
        })
    }

    /// Spawn the tool and wait for it within the configured timeout.
    /// Returns combined stdout/stderr and the exit code.
    async fn run_tool(
        &self,
        work_dir: &Path,
        source: &SourceFile,
    ) -> Result<(String, Option<i32>), BuildError> {
        let args = self.tool_args(source);
        tracing::debug!(program = %self.config.program, ?args, "Spawning packaging tool");

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BuildError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let readers = [
            child.stdout.take().map(|s| spawn_capture(s, Arc::clone(&stdout_buf))),
            child.stderr.take().map(|s| spawn_capture(s, Arc::clone(&stderr_buf))),
        ];

        let secs = self.config.timeout_secs;
        let waited = timeout(Duration::from_secs(secs), child.wait()).await;

        let exit_code = match waited {
            Ok(Ok(status)) => {
                // Let the readers drain what the tool wrote before exiting.
                for reader in readers.into_iter().flatten() {
                    let _ = timeout(Duration::from_secs(5), reader).await;
                }
                status.code()
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to wait for packaging tool: {}", e);
                abort_all(readers);
                None
            }
            Err(_) => {
                let _ = child.kill().await;
                abort_all(readers);
                let logs = combine_logs(&stdout_buf, &stderr_buf);
                tracing::warn!(timeout_secs = secs, "Packaging tool timed out");
                return Err(BuildError::TimedOut { secs, logs });
            }
        };

        let logs = combine_logs(&stdout_buf, &stderr_buf);
        tracing::info!(?exit_code, log_bytes = logs.len(), "Packaging tool exited");
        Ok((logs, exit_code))
    }

    /// Resolve a previously built artifact for download. Both components must
    /// be plain file names.
    pub fn artifact_path(&self, job_id: &str, file_name: &str) -> Result<PathBuf, ValidationError> {
        if !is_plain_component(job_id) || !job_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFileName(job_id.to_string()));
        }
        if !is_plain_component(file_name) {
            return Err(ValidationError::InvalidFileName(file_name.to_string()));
        }
        Ok(self
            .config
            .work_root
            .join(job_id)
            .join(&self.config.dist_dir)
            .join(file_name))
    }
}

fn spawn_capture<R>(mut reader: R, buf: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut guard) = buf.lock() {
                        guard.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    })
}

fn abort_all(readers: [Option<JoinHandle<()>>; 2]) {
    for reader in readers.into_iter().flatten() {
        reader.abort();
    }
}

fn combine_logs(stdout: &Mutex<Vec<u8>>, stderr: &Mutex<Vec<u8>>) -> String {
    let out = stdout
        .lock()
        .map(|b| String::from_utf8_lossy(&b).to_string())
        .unwrap_or_default();
    let err = stderr
        .lock()
        .map(|b| String::from_utf8_lossy(&b).to_string())
        .unwrap_or_default();
    match (out.trim().is_empty(), err.trim().is_empty()) {
        (_, true) => out,
        (true, false) => err,
        (false, false) => format!("{}\n{}", out.trim_end(), err),
    }
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
