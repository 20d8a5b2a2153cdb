// Local file resolution for the upload target.

use std::path::{Component, Path, PathBuf};

pub const DEFAULT_FILE: &str = "sample.txt";

/// Turn the optional CLI argument into an absolute path, defaulting to
/// `sample.txt` in the current directory. `.` and `..` are folded
/// lexically; symlinks are left alone.
pub fn resolve_target(arg: Option<&Path>) -> PathBuf {
    let raw = arg.unwrap_or_else(|| Path::new(DEFAULT_FILE));
    let absolute = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(raw)
    };
    normalize(&absolute)
}

/// True when `path` names an existing regular file.
pub fn target_exists(path: &Path) -> bool {
    path.is_file()
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
