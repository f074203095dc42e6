use std::collections::BTreeSet;
use std::path::Path;

/// Canonical form of an extension: lower-case with exactly one leading dot.
/// Returns `None` for blank input.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!(".{}", trimmed.to_lowercase()))
    }
}

/// Allow-list of file extensions, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: BTreeSet<String>,
}

impl ExtensionSet {
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = raw
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        Self { extensions }
    }

    /// The canonical extension of `path` if it is allowed.
    pub fn match_path(&self, path: &Path) -> Option<String> {
        let ext = normalize_extension(&path.extension()?.to_string_lossy())?;
        if self.extensions.contains(&ext) {
            Some(ext)
        } else {
            None
        }
    }
}
