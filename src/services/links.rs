//! Opening citation links in the user's browser.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use url::Url;

/// Only http(s) links are ever handed to the system opener.
pub fn validate_link(link: &str) -> Result<Url> {
    let url = Url::parse(link.trim()).with_context(|| format!("Not a valid URL: {}", link))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!(
            "Unsupported URL scheme {:?}. Only http:// and https:// are allowed",
            other
        ),
    }
}

fn opener_command(url: &Url) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(url.as_str());
        cmd
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url.as_str()]);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url.as_str());
        cmd
    }
}

/// Hand the link to the platform opener as a detached process. The
/// browser gets no handle back to this program.
pub fn open_link(link: &str) -> Result<()> {
    let url = validate_link(link)?;
    let child = opener_command(&url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to launch the system browser")?;
    tracing::info!(url = %url, pid = child.id(), "Opened citation link");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert!(validate_link("https://nedrug.mfds.go.kr/pbp/CCBBB01").is_ok());
        assert!(validate_link(" http://example.com/label ").is_ok());
    }

    #[test]
    fn test_rejects_other_schemes() {
        for link in ["javascript:alert(1)", "file:///etc/passwd", "data:text/html,hi"] {
            let err = validate_link(link).unwrap_err();
            assert!(err.to_string().contains("Unsupported URL scheme"), "{}", link);
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(validate_link("").is_err());
        assert!(validate_link("not a link").is_err());
    }
}
