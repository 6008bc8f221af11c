//! Safe file names for downloaded documents.

use std::sync::LazyLock;

use regex::Regex;

/// Characters rejected by common file systems
#[allow(clippy::expect_used)]
static INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[:?/*|<>"\\]"#).expect("filename regex is valid") // Static pattern, safe to panic
});

/// Turn a paper title into a file name ending with `suffix`.
///
/// Strips `: ? / * | < > " \`, drops trailing dots and appends `suffix`
/// unless the name already ends with it. Applying it twice changes nothing.
///
/// ```
/// use paperfetch::download::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Cells: a review?", ".pdf"), "Cells a review.pdf");
/// ```
pub fn sanitize_filename(title: &str, suffix: &str) -> String {
    let cleaned = INVALID_CHARS.replace_all(title, "");
    let mut name = cleaned.trim_end_matches('.').to_string();
    if !name.ends_with(suffix) {
        name.push_str(suffix);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        let cases = [
            ("Valid Title", "Valid Title.pdf"),
            ("", ".pdf"),
            ("A/B testing: why?", "AB testing why.pdf"),
            ("<html> \"quoted\" back\\slash|pipe*", "html quoted backslashpipe.pdf"),
            ("Ends with dots...", "Ends with dots.pdf"),
            ("already.pdf", "already.pdf"),
            ("et al.", "et al.pdf"),
        ];

        for (title, expected) in cases {
            assert_eq!(sanitize_filename(title, ".pdf"), expected, "title: {:?}", title);
        }
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let titles = [
            "Risk factors for heat-related illnesses during the Hajj: an expert review.",
            "???",
            "...",
            "x.pdf.",
            "Deep learning / cells",
        ];

        for title in titles {
            for suffix in [".pdf", ".txt"] {
                let once = sanitize_filename(title, suffix);
                assert_eq!(sanitize_filename(&once, suffix), once);
                assert!(once.ends_with(suffix));
            }
        }
    }
}
