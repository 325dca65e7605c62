use std::path::Path;
use std::process::Command;
use tokio::process::Command as TokioCommand;

use crate::types::GitHubRelease;

/// Startup probe: is instaloader installed, and is a newer release out?
/// The release lookup is best effort, offline just means we only show
/// the local version.
pub async fn check_tool_task() -> Result<String, String> {
    let mut cmd = TokioCommand::new("instaloader");
    cmd.arg("--version");
    #[cfg(windows)]
    cmd.creation_flags(0x08000000);

    let local = match cmd.output().await {
        Ok(o) if o.status.success() => String::from_utf8_lossy(&o.stdout).trim().to_string(),
        _ => {
            return Err("instaloader not found, install it with 'pip install instaloader'".into())
        }
    };

    Ok(describe(&local, latest_release_tag().await.ok().as_deref()))
}

async fn latest_release_tag() -> Result<String, String> {
    let client = reqwest::Client::new();
    let resp = client
        .get("https://api.github.com/repos/instaloader/instaloader/releases/latest")
        .header("User-Agent", "instagrab")
        .send().await.map_err(|e| e.to_string())?
        .json::<GitHubRelease>().await.map_err(|e| e.to_string())?;
    Ok(resp.tag_name.trim_start_matches('v').to_string())
}

fn describe(local: &str, latest: Option<&str>) -> String {
    match latest {
        Some(tag) if tag == local => format!("instaloader {local} (up to date)"),
        Some(tag) => format!("instaloader {local} (latest is {tag})"),
        None => format!("instaloader {local}"),
    }
}

/// Opens `path` in the platform file browser.
pub fn reveal_in_file_browser(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    {
        Command::new("explorer").arg(path).spawn()?;
    }
    #[cfg(target_os = "macos")]
    {
        Command::new("open").arg(path).spawn()?;
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Command::new("xdg-open").arg(path).spawn()?;
    }
    Ok(())
}
