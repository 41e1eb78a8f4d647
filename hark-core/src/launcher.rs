//! Opening URLs, files and applications through the OS

use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// OS launch capabilities used by the open/search/create-file handlers
pub trait Launcher: Send + Sync {
    /// Open a URL in the default browser; fire-and-forget
    fn open_url(&self, url: &str);

    /// Start an executable at an explicit path
    fn launch_app(&self, path: &str) -> Result<()>;

    /// Open a file with its associated handler, or an app by bare name
    fn open_by_name(&self, target: &str) -> Result<()>;
}

/// Launcher backed by the platform opener (`open`, `xdg-open`, `start`)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open_url(&self, url: &str) {
        debug!("Opening URL {}", url);
        match opener(url).spawn() {
            Ok(child) => reap(child),
            Err(e) => warn!("Failed to open {}: {}", url, e),
        }
    }

    fn launch_app(&self, path: &str) -> Result<()> {
        debug!("Launching {}", path);
        let child = Command::new(path).spawn().map_err(|e| Error::Launch {
            target: path.to_string(),
            reason: e.to_string(),
        })?;
        reap(child);
        Ok(())
    }

    fn open_by_name(&self, target: &str) -> Result<()> {
        let launch_err = |reason: String| Error::Launch {
            target: target.to_string(),
            reason,
        };

        if Path::new(target).exists() {
            let status = opener(target)
                .status()
                .map_err(|e| launch_err(e.to_string()))?;
            return if status.success() {
                Ok(())
            } else {
                Err(launch_err(format!("opener exited with {status}")))
            };
        }

        open_app_by_name(target).map_err(launch_err)
    }
}

#[cfg(target_os = "macos")]
fn opener(target: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(target);
    cmd
}

#[cfg(target_os = "windows")]
fn opener(target: &str) -> Command {
    let mut cmd = Command::new("cmd");
    // the empty string is the window title `start` expects first
    cmd.args(["/C", "start", ""]).arg(target);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener(target: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(target);
    cmd
}

#[cfg(target_os = "macos")]
fn open_app_by_name(name: &str) -> std::result::Result<(), String> {
    let status = Command::new("open")
        .arg("-a")
        .arg(name)
        .status()
        .map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("no application named {name}"))
    }
}

#[cfg(target_os = "windows")]
fn open_app_by_name(name: &str) -> std::result::Result<(), String> {
    let status = opener(name).status().map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("no application named {name}"))
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn open_app_by_name(name: &str) -> std::result::Result<(), String> {
    // only installed desktop applications, never arbitrary binaries on PATH
    let id = find_desktop_entry(name, &application_dirs())
        .ok_or_else(|| format!("no desktop entry for {name}"))?;
    let status = Command::new("gtk-launch")
        .arg(&id)
        .status()
        .map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("gtk-launch exited with {status}"))
    }
}

/// Wait for a launched child on a detached thread so it never lingers as a zombie
fn reap(mut child: Child) {
    std::thread::spawn(move || {
        if let Err(e) = child.wait() {
            debug!("Could not reap child process: {}", e);
        }
    });
}

/// XDG application directories, user entries first
#[cfg_attr(any(target_os = "macos", target_os = "windows"), allow(dead_code))]
fn application_dirs() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = dirs::data_dir().into_iter().collect();
    let system = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    roots.extend(std::env::split_paths(&system));
    roots.into_iter().map(|root| root.join("applications")).collect()
}

/// Desktop entry id for a spoken app name, if one is installed in `dirs`
#[cfg_attr(any(target_os = "macos", target_os = "windows"), allow(dead_code))]
fn find_desktop_entry(name: &str, dirs: &[PathBuf]) -> Option<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() || name.contains('/') {
        return None;
    }
    let candidates = [name.replace(' ', "-"), name.replace(' ', "")];
    dirs.iter().find_map(|dir| {
        candidates
            .iter()
            .find(|id| dir.join(format!("{id}.desktop")).is_file())
            .cloned()
    })
}
