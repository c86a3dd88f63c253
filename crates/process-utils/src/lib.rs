//! Process helpers for spawning the external streaming tool.
//!
//! - Command constructors that never pop a console window on Windows.
//! - Discovery of an external executable (env override, bundled copy, `PATH`).

mod locate;

pub use locate::{BinaryLocation, BinarySpec, locate_binary};

use std::ffi::OsStr;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Suppress the console window a child process would otherwise open on Windows.
///
/// No-op elsewhere.
pub trait NoWindowExt {
    fn no_window(&mut self) -> &mut Self;
}

impl NoWindowExt for std::process::Command {
    fn no_window(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
        self
    }
}

/// Blocking `Command` for short probes such as `-version`.
pub fn std_command(program: impl AsRef<OsStr>) -> std::process::Command {
    let mut cmd = std::process::Command::new(program);
    cmd.no_window();
    cmd
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
        self
    }
}

/// Async `Command` for long-lived children.
///
/// The child is killed when its handle is dropped, so a relay can never
/// outlive the task supervising it.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window().kill_on_drop(true);
    cmd
}

/// First line of `<program> -version`, if the program runs at all.
pub fn probe_version(program: impl AsRef<OsStr>) -> Option<String> {
    let output = std_command(program).arg("-version").output().ok()?;
    String::from_utf8(output.stdout)
        .ok()
        .and_then(|s| s.lines().next().map(|l| l.trim().to_string()))
        .filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_version_of_missing_binary_is_none() {
        assert!(probe_version("definitely-not-a-real-binary-4c1e").is_none());
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn tokio_command_keeps_program() {
        let cmd = tokio_command("ffmpeg");
        assert_eq!(cmd.as_std().get_program(), "ffmpeg");
    }
}
