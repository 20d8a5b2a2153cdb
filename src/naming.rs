// Remote file naming: `<stem>-<UTC timestamp>[.<ext>]`.

use chrono::{DateTime, Utc};
use std::path::Path;

/// Millisecond precision, e.g. `20240131235959123`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Build the collision-avoiding remote name for `path` at instant `now`.
///
/// The extension is kept exactly as written; a path without one (or with a
/// trailing dot) yields `<stem>-<timestamp>` with no dot.
pub fn remote_file_name(path: &Path, now: DateTime<Utc>) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let stamp = now.format(TIMESTAMP_FORMAT);
    match path.extension().map(|e| e.to_string_lossy()) {
        Some(ext) if !ext.is_empty() => format!("{stem}-{stamp}.{ext}"),
        _ => format!("{stem}-{stamp}"),
    }
}

/// [`remote_file_name`] against the current clock.
pub fn timestamped_name(path: &Path) -> String {
    remote_file_name(path, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap() + Duration::milliseconds(42)
    }

    #[test]
    fn keeps_extension() {
        let name = remote_file_name(Path::new("/tmp/report.csv"), instant());
        assert_eq!(name, "report-20240305070809042.csv");
    }

    #[test]
    fn no_extension_has_no_trailing_dot() {
        let name = remote_file_name(Path::new("/tmp/README"), instant());
        assert_eq!(name, "README-20240305070809042");
    }

    #[test]
    fn trailing_dot_is_dropped() {
        let name = remote_file_name(Path::new("notes."), instant());
        assert_eq!(name, "notes-20240305070809042");
    }

    #[test]
    fn only_last_extension_is_split_off() {
        let name = remote_file_name(Path::new("backup.tar.GZ"), instant());
        assert_eq!(name, "backup.tar-20240305070809042.GZ");
    }

    #[test]
    fn one_millisecond_apart_differs() {
        let path = Path::new("report.csv");
        let first = remote_file_name(path, instant());
        let second = remote_file_name(path, instant() + Duration::milliseconds(1));
        assert_ne!(first, second);
    }

    #[test]
    fn current_clock_name_has_expected_shape() {
        let name = timestamped_name(Path::new("a.txt"));
        let stamp = name
            .strip_prefix("a-")
            .and_then(|rest| rest.strip_suffix(".txt"))
            .unwrap();
        assert_eq!(stamp.len(), 17);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }
}
