use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use async_trait::async_trait;
use tokio::process::Command as TokioCommand;

use crate::types::{PostHandle, RequestError};

/// Seam to the external fetch library. Everything that touches the
/// network lives behind this trait so the request flow can be driven
/// with a stub in tests.
#[async_trait]
pub trait PostFetcher: Send + Sync + 'static {
    /// Authenticate. Two-factor accounts and bad credentials surface as
    /// their own error kinds, anything else as a generic failure.
    async fn login(&self, username: &str, password: &str) -> Result<(), RequestError>;

    /// Fetch the post object for a shortcode without downloading media.
    async fn resolve_post(&self, shortcode: &str) -> Result<PostHandle, RequestError>;

    /// Save all media of `post` into `into_dir/<target_name>/`.
    async fn download(
        &self,
        post: &PostHandle,
        into_dir: &Path,
        target_name: &str,
    ) -> Result<(), RequestError>;
}

/// Production fetcher: shells out to the `instaloader` CLI. A successful
/// login writes a session file under the OS temp dir; later invocations
/// in the same run reuse it, so the tool is never asked to log in twice.
#[derive(Debug, Clone)]
pub struct InstaloaderCli {
    program: PathBuf,
    session_file: PathBuf,
    scratch_dir: PathBuf,
    login_user: Arc<OnceLock<String>>,
}

impl InstaloaderCli {
    pub fn new() -> Self {
        let pid = std::process::id();
        InstaloaderCli {
            program: PathBuf::from("instaloader"),
            session_file: std::env::temp_dir().join(format!("instagrab-{pid}.session")),
            scratch_dir: std::env::temp_dir().join(format!("instagrab-scratch-{pid}")),
            login_user: Arc::new(OnceLock::new()),
        }
    }

    fn base_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.arg("--quiet");
        if let Some(user) = self.login_user.get() {
            cmd.arg("--login").arg(user).arg("--sessionfile").arg(&self.session_file);
        }
        #[cfg(windows)]
        cmd.creation_flags(0x08000000);
        cmd
    }

    // Mirrors the collaborator configuration of the GUI: pictures and
    // videos on, every sidecar artifact off.
    fn suppress_sidecars(cmd: &mut TokioCommand) {
        cmd.arg("--no-video-thumbnails")
            .arg("--no-geotags")
            .arg("--no-comments")
            .arg("--no-captions")
            .arg("--no-metadata-json")
            .arg("--no-compress-json");
    }
}

#[async_trait]
impl PostFetcher for InstaloaderCli {
    async fn login(&self, username: &str, password: &str) -> Result<(), RequestError> {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.arg("--login")
            .arg(username)
            .arg("--password")
            .arg(password)
            .arg("--sessionfile")
            .arg(&self.session_file)
            .arg("--quiet");
        #[cfg(windows)]
        cmd.creation_flags(0x08000000);

        let output = cmd.output().await.map_err(spawn_failure)?;
        if !output.status.success() {
            return Err(map_login_failure(&String::from_utf8_lossy(&output.stderr)));
        }
        let _ = self.login_user.set(username.to_string());
        tracing::info!(username, "logged in");
        Ok(())
    }

    async fn resolve_post(&self, shortcode: &str) -> Result<PostHandle, RequestError> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| RequestError::Download(e.to_string()))?;

        // Metadata-only probe: no media, run in a scratch dir so the
        // tool leaves nothing behind next to the real downloads.
        let mut cmd = self.base_command();
        cmd.arg("--no-pictures").arg("--no-videos");
        Self::suppress_sidecars(&mut cmd);
        cmd.arg("--").arg(format!("-{shortcode}"));
        cmd.current_dir(&self.scratch_dir);

        let output = cmd.output().await.map_err(spawn_failure)?;
        if !output.status.success() {
            return Err(map_fetch_failure(&String::from_utf8_lossy(&output.stderr)));
        }
        tracing::info!(shortcode, "post resolved");
        Ok(PostHandle::new(shortcode))
    }

    async fn download(
        &self,
        post: &PostHandle,
        into_dir: &Path,
        target_name: &str,
    ) -> Result<(), RequestError> {
        let mut cmd = self.base_command();
        cmd.arg("--dirname-pattern").arg(target_name);
        Self::suppress_sidecars(&mut cmd);
        cmd.arg("--").arg(format!("-{}", post.shortcode()));
        // Explicit target dir for the child process; our own working
        // directory stays untouched.
        cmd.current_dir(into_dir);

        let output = cmd.output().await.map_err(spawn_failure)?;
        if !output.status.success() {
            return Err(map_fetch_failure(&String::from_utf8_lossy(&output.stderr)));
        }
        tracing::info!(shortcode = post.shortcode(), "media saved");
        Ok(())
    }
}

fn spawn_failure(e: std::io::Error) -> RequestError {
    RequestError::Download(format!(
        "could not run instaloader: {e} (is it installed and on PATH?)"
    ))
}

fn map_login_failure(stderr: &str) -> RequestError {
    let lower = stderr.to_lowercase();
    if lower.contains("two-factor") {
        RequestError::UnsupportedAuth
    } else if lower.contains("wrong password") || lower.contains("bad credentials") {
        RequestError::Auth
    } else {
        RequestError::Download(stderr_tail(stderr))
    }
}

// instaloader reports HTTP failures inside free-form messages, so the
// status code substring is the only reliable indicator.
fn map_fetch_failure(stderr: &str) -> RequestError {
    if stderr.contains("401") {
        RequestError::Access
    } else if stderr.contains("404") {
        RequestError::NotFound
    } else {
        RequestError::Download(stderr_tail(stderr))
    }
}

fn stderr_tail(stderr: &str) -> String {
    let tail = stderr.lines().rev().find(|l| !l.trim().is_empty());
    match tail {
        Some(line) => line.trim().to_string(),
        None => "unknown error (non-zero exit)".to_string(),
    }
}
