//! Header-dependency parsing.
//!
//! GCC and Clang write Make-style `.d` files (`-MMD -MF`); MSVC reports
//! includes on stdout via `/showIncludes`. Both channels reduce to a
//! deduplicated header list in first-seen order.

use std::path::{Path, PathBuf};

/// The marker MSVC prints for each include. The compile command forces
/// English output (`/English-`), so only this spelling is recognized.
const SHOW_INCLUDES_MARKER: &str = "Note: including file:";

/// Parse a Make-style dependency file.
///
/// Backslash continuations are joined, everything after the first colon is
/// split on whitespace, and only entries with header extensions are kept.
pub fn parse_make_deps(content: &str) -> Vec<PathBuf> {
    let joined = content.replace("\\\r\n", " ").replace("\\\n", " ");

    let mut result: Vec<PathBuf> = Vec::new();

    for rule in joined.lines() {
        // "obj/main.o: src/main.cpp include/foo.hpp ..."
        let Some(colon) = rule.find(':') else {
            continue;
        };
        // Guard against "C:\..." drive-letter targets
        let after = if rule.len() > colon + 1 && rule.as_bytes()[colon + 1] == b'\\' {
            match rule[colon + 1..].find(':') {
                Some(next) => &rule[colon + 1 + next + 1..],
                None => continue,
            }
        } else {
            &rule[colon + 1..]
        };

        for token in after.split_whitespace() {
            let path = PathBuf::from(token);
            if is_header_path(&path) && !result.contains(&path) {
                result.push(path);
            }
        }
    }

    result
}

/// Parse MSVC `/showIncludes` output from compiler stdout.
///
/// Each include line carries the marker followed by an indented path; the
/// trailing path is trimmed. Order is first-seen, deduplicated.
pub fn parse_show_includes(stdout: &str) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for line in stdout.lines() {
        if let Some(rest) = line.trim_start().strip_prefix(SHOW_INCLUDES_MARKER) {
            let path = PathBuf::from(rest.trim());
            if !path.as_os_str().is_empty() && !result.contains(&path) {
                result.push(path);
            }
        }
    }

    result
}

/// Whether a path looks like a header file.
pub fn is_header_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("h" | "hpp" | "hh" | "hxx" | "inl" | "ipp")
    )
}

/// Classify a header as a system header by path prefix against well-known
/// installation locations. System headers are excluded from the cache's
/// deps-hash.
pub fn is_system_header(path: &Path) -> bool {
    const UNIX_PREFIXES: &[&str] = &[
        "/usr/include",
        "/usr/local/include",
        "/usr/lib",
        "/opt/homebrew/include",
        "/Library/Developer",
        "/Applications/Xcode.app",
    ];
    const WINDOWS_MARKERS: &[&str] = &[
        "microsoft visual studio",
        "windows kits",
        "vctoolsinstalldir",
    ];

    let text = path.to_string_lossy();

    if UNIX_PREFIXES.iter().any(|p| text.starts_with(p)) {
        return true;
    }

    let lower = text.to_lowercase();
    WINDOWS_MARKERS.iter().any(|m| lower.contains(m))
}
