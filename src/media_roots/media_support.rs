use std::path::Path;

/// Container formats picked up by default (lowercase, without dots).
pub const DEFAULT_MEDIA_EXTENSIONS: [&str; 14] = [
    "mp4", "m4v", "mkv", "webm", "mov", "avi", "wmv", "flv", "mpg", "mpeg", "ts", "m2ts", "3gp",
    "ogv",
];

/// Owned copy of the default allow-list, for settings and options.
pub fn default_extensions() -> Vec<String> {
    DEFAULT_MEDIA_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

/// Return true if the path's extension is in `allowed` (case-insensitive).
pub fn has_allowed_extension(path: &Path, allowed: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    allowed
        .iter()
        .any(|candidate| ext.eq_ignore_ascii_case(candidate.trim_start_matches('.')))
}
