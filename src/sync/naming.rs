use std::path::{Path, PathBuf};

/// Produces a fresh url next to `url` that does not collide with any
/// existing file.
///
/// The base name's trailing `_<n>` counter is incremented (or `_1` appended
/// when absent); a device name, when given, is inserted before the counter so
/// collision copies read `<base>_<device>_<n>.<ext>`. Candidates that turn
/// out to exist bump the counter again, so the procedure terminates and never
/// overwrites.
pub fn fresh_url(url: &Path, device: Option<&str>) -> PathBuf {
    let mut candidate = next_candidate(url, device);
    while candidate.exists() {
        candidate = next_candidate(&candidate, None);
    }
    candidate
}

fn next_candidate(url: &Path, device: Option<&str>) -> PathBuf {
    let name = url
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
        _ => (name, None),
    };

    let base = match device {
        Some(device) => format!("{stem}_{device}"),
        None => stem,
    };
    let next = match (device, parse_counter(&base)) {
        // A freshly appended device name never carries a counter of its own.
        (Some(_), _) | (None, None) => format!("{base}_1"),
        (None, Some((prefix, n))) => format!("{prefix}_{}", n + 1),
    };

    match ext {
        Some(ext) => url.with_file_name(format!("{next}.{ext}")),
        None => url.with_file_name(next),
    }
}

/// Splits a trailing `_<n>` suffix off `base`, if present.
fn parse_counter(base: &str) -> Option<(&str, u64)> {
    let (prefix, digits) = base.rsplit_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((prefix, digits.parse().ok()?))
}
