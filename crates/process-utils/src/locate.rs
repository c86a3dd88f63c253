use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Where to look for an external executable.
#[derive(Debug, Clone)]
pub struct BinarySpec<'a> {
    /// Executable name without extension, e.g. `ffmpeg`.
    pub name: &'a str,
    /// Environment variable that overrides discovery, e.g. `FFMPEG_PATH`.
    pub env_var: &'a str,
    /// Directories searched for a bundled copy under `<dir>/<name>/<platform>/`.
    pub bundle_roots: Vec<PathBuf>,
}

/// How a binary was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryLocation {
    /// Taken verbatim from the override variable.
    Override(PathBuf),
    /// A copy shipped next to the application.
    Bundled(PathBuf),
    /// Bare name, resolved by the OS through `PATH` at spawn time.
    SystemPath(PathBuf),
}

impl BinaryLocation {
    pub fn path(&self) -> &Path {
        match self {
            Self::Override(p) | Self::Bundled(p) | Self::SystemPath(p) => p,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Self::Override(p) | Self::Bundled(p) | Self::SystemPath(p) => p,
        }
    }
}

fn platform_dir() -> &'static str {
    if cfg!(target_os = "macos") {
        "mac"
    } else if cfg!(windows) {
        "win"
    } else {
        "linux"
    }
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Resolve an executable: override variable, then bundled copy, then `PATH`.
///
/// An override that points at a missing file is still honored (the spawn
/// will fail loudly) but a warning is logged.
pub fn locate_binary(spec: &BinarySpec<'_>) -> BinaryLocation {
    if let Ok(value) = std::env::var(spec.env_var)
        && !value.trim().is_empty()
    {
        let path = PathBuf::from(value.trim());
        if !path.exists() {
            warn!(
                var = spec.env_var,
                path = %path.display(),
                "Binary override does not exist"
            );
        }
        return BinaryLocation::Override(path);
    }

    let exe = executable_name(spec.name);
    for root in &spec.bundle_roots {
        let candidate = root.join(spec.name).join(platform_dir()).join(&exe);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "Using bundled {}", spec.name);
            return BinaryLocation::Bundled(candidate);
        }
    }

    BinaryLocation::SystemPath(PathBuf::from(exe))
}
