//! Path coercion between user-relative paths and prefix-rooted keys.

/// Normalizes user-supplied folder paths into fully-qualified keys under the
/// configured root prefix.
///
/// The output is always non-empty, always begins with `root/`, and always
/// ends with `/`. All inputs are coerced, never rejected, and formatting is
/// idempotent.
#[derive(Debug, Clone)]
pub struct PathFormatter {
    root: String,
}

impl PathFormatter {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into().trim_matches('/').to_string();
        Self { root }
    }

    /// `format("docs/reports")` -> `root/docs/reports/`.
    ///
    /// Empty input resolves to the root itself. Paths that already carry the
    /// root prefix are left rooted where they are.
    pub fn format(&self, path: &str) -> String {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return format!("{}/", self.root);
        }

        if trimmed.starts_with(&self.root) {
            format!("{trimmed}/")
        } else {
            format!("{}/{trimmed}/", self.root)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> PathFormatter {
        PathFormatter::new("app")
    }

    #[test]
    fn empty_input_resolves_to_root() {
        assert_eq!(formatter().format(""), "app/");
        assert_eq!(formatter().format("/"), "app/");
    }

    #[test]
    fn strips_surrounding_slashes() {
        assert_eq!(formatter().format("/docs/reports/"), "app/docs/reports/");
    }

    #[test]
    fn prepends_root_when_missing() {
        assert_eq!(formatter().format("docs"), "app/docs/");
    }

    #[test]
    fn keeps_already_rooted_paths() {
        assert_eq!(formatter().format("app/docs"), "app/docs/");
    }

    #[test]
    fn is_idempotent() {
        let fmt = formatter();
        for input in ["", "/", "docs", "docs/reports/", "app/docs", "app/docs/reports/"] {
            let once = fmt.format(input);
            assert_eq!(fmt.format(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn output_shape_invariant() {
        let fmt = formatter();
        for input in ["", "x", "//x//", "app", "app/", "deep/nested/path"] {
            let out = fmt.format(input);
            assert!(out.starts_with("app/"), "output: {out:?}");
            assert!(out.ends_with('/'), "output: {out:?}");
        }
    }

    #[test]
    fn trailing_slash_root_is_normalized() {
        let fmt = PathFormatter::new("/app/");
        assert_eq!(fmt.format("docs"), "app/docs/");
    }
}
