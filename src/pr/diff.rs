use serde::Deserialize;

/// One entry of GitHub's "list pull request files" response.
#[derive(Debug, Clone, Deserialize)]
pub struct PullFile {
    pub filename: String,
    /// Unified-diff hunk text. GitHub omits it for binary files, pure renames,
    /// and patches that are too large.
    #[serde(default)]
    pub patch: Option<String>,
}

/// Concatenate the per-file patches of a pull request into one diff text.
///
/// Each file with a non-empty patch becomes a `--- {filename} ---` header
/// followed by its patch; segments are separated by a blank line. Files
/// without a patch are skipped, so the result is empty if none has one.
pub fn combine_patches(files: &[PullFile]) -> String {
    files
        .iter()
        .filter_map(|file| match file.patch.as_deref() {
            Some(patch) if !patch.is_empty() => {
                Some(format!("--- {} ---\n{}", file.filename, patch))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
