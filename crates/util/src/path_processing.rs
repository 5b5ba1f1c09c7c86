use std::path::PathBuf;

use dirs_next::home_dir;

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    if let Some(rest) = p.strip_prefix("~\\") {
        // Windows-style
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// Path form of [`expand_tilde`]; paths not starting with `~` are returned as-is.
pub fn expand_tilde_path(path: PathBuf) -> PathBuf {
    match path.components().next() {
        Some(first) if first.as_os_str() == "~" => expand_tilde(&path.to_string_lossy()),
        _ => path,
    }
}
