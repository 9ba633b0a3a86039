//! Logical-path helpers shared by every backend adapter.
//!
//! All paths handed to a backend are stripped of leading/trailing separators
//! first. The root path is special: it is preserved as the canonical `/`
//! marker and is never collapsed into an empty string, because backends treat
//! an empty path as "no path" rather than the root.

use chrono::{DateTime, Utc};

/// Canonical root marker.
pub const ROOT: &str = "/";

/// Strip leading/trailing separators; root stays `/`.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() { ROOT.to_string() } else { trimmed.to_string() }
}

/// Parent of a logical path: drop the last segment. A single-segment path
/// parents to the root marker, never to an empty string.
pub fn parent(path: &str) -> String {
    let norm = normalize(path);
    if norm == ROOT {
        return ROOT.to_string();
    }
    let mut segments: Vec<&str> = norm.split('/').collect();
    segments.pop();
    if segments.is_empty() { ROOT.to_string() } else { segments.join("/") }
}

/// Last segment of a logical path; the root has no name.
pub fn file_name(path: &str) -> String {
    let norm = normalize(path);
    if norm == ROOT {
        return String::new();
    }
    norm.rsplit('/').next().unwrap_or_default().to_string()
}

/// Join a base path and a child name, keeping the result normalized.
pub fn join(base: &str, name: &str) -> String {
    let base = normalize(base);
    let name = name.trim_matches('/');
    if name.is_empty() {
        return base;
    }
    if base == ROOT { name.to_string() } else { format!("{}/{}", base, name) }
}

/// Split a file name into (stem, extension-with-dot). A leading dot is part
/// of the stem, so dotfiles carry no extension.
pub fn split_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Collision-avoidance name for a copy landing on its own source:
/// `report.pdf` -> `report_copy.pdf`.
pub fn copy_name(name: &str) -> String {
    let (stem, ext) = split_ext(name);
    format!("{}_copy{}", stem, ext)
}

/// Disambiguated name for a trash move that collides with an existing entry:
/// a UTC timestamp goes between the stem and the extension.
pub fn trash_name(name: &str, now: DateTime<Utc>) -> String {
    let (stem, ext) = split_ext(name);
    format!("{} {}{}", stem, now.format("%Y-%m-%d %H:%M:%S"), ext)
}
