//! Target path derivation
//!
//! Source paths are mirrored under the Robot project root: the source root
//! prefix is swapped for the target root, the extension follows the role and
//! spaces in the file name become underscores. Rewriting is idempotent.

use crate::model::FileRole;

/// Source roots stripped before re-rooting, most specific first
pub const DEFAULT_SOURCE_ROOTS: &[&str] = &[
    "src/test/java",
    "src/test/resources",
    "src/main/java",
    "src/test",
    "src",
];

const TARGET_EXTENSIONS: &[&str] = &["robot", "resource"];

#[derive(Debug, Clone)]
pub struct PathRewriter {
    target_root: String,
    source_roots: Vec<String>,
}

impl PathRewriter {
    pub fn new(target_root: &str) -> Self {
        Self::with_source_roots(target_root, DEFAULT_SOURCE_ROOTS.iter().map(|s| s.to_string()))
    }

    pub fn with_source_roots<I>(target_root: &str, roots: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut source_roots: Vec<String> = roots
            .into_iter()
            .map(|r| normalize(&r))
            .filter(|r| !r.is_empty())
            .collect();
        // Longest prefix wins regardless of configuration order
        source_roots.sort_by(|a, b| b.len().cmp(&a.len()));
        let target_root = normalize(target_root);
        Self {
            target_root: if target_root.is_empty() {
                "robot".to_string()
            } else {
                target_root
            },
            source_roots,
        }
    }

    pub fn target_root(&self) -> &str {
        &self.target_root
    }

    fn is_under_target(&self, path: &str) -> bool {
        path == self.target_root || path.starts_with(&format!("{}/", self.target_root))
    }

    /// Derive the target path for a source file.
    pub fn rewrite(&self, path: &str, role: FileRole) -> String {
        let normalized = normalize(path);
        if normalized.is_empty() || normalized == self.target_root {
            return self.target_root.clone();
        }

        let rooted = if self.is_under_target(&normalized) {
            normalized
        } else {
            let relative = self
                .source_roots
                .iter()
                .find_map(|root| normalized.strip_prefix(&format!("{}/", root)))
                .unwrap_or(&normalized);
            format!("{}/{}", self.target_root, relative)
        };

        let (dir, file_name) = match rooted.rfind('/') {
            Some(idx) => (&rooted[..idx], &rooted[idx + 1..]),
            None => ("", rooted.as_str()),
        };
        let file_name = sanitize_file_name(file_name, role.target_extension());
        if dir.is_empty() {
            file_name
        } else {
            format!("{}/{}", dir, file_name)
        }
    }

    /// `../` prefix leading from a target file's directory back to the root.
    pub fn relative_to_root(&self, target_path: &str) -> String {
        let normalized = normalize(target_path);
        let inner = normalized
            .strip_prefix(&format!("{}/", self.target_root))
            .unwrap_or(&normalized);
        let depth = inner.matches('/').count();
        "../".repeat(depth)
    }
}

/// Collapse separators, drop `.` and empty segments, trim surrounding slashes.
fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Swap the extension for a Robot one (unless already Robot) and replace spaces.
pub fn sanitize_file_name(file_name: &str, extension: &str) -> String {
    let (stem, ext) = match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], Some(&file_name[idx + 1..])),
        _ => (file_name, None),
    };
    let renamed = match ext {
        Some(ext) if TARGET_EXTENSIONS.contains(&ext) => file_name.to_string(),
        Some(_) => format!("{}.{}", stem, extension),
        None => format!("{}.{}", file_name, extension),
    };
    renamed.replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rewrite_step_definition() {
        let rewriter = PathRewriter::new("robot");
        assert_eq!(
            rewriter.rewrite("src/test/java/com/acme/steps/LoginSteps.java", FileRole::StepDefinition),
            "robot/com/acme/steps/LoginSteps.resource"
        );
    }

    #[test]
    fn test_rewrite_feature_with_spaces() {
        let rewriter = PathRewriter::new("robot");
        assert_eq!(
            rewriter.rewrite("src/test/resources/features/user login.feature", FileRole::Scenario),
            "robot/features/user_login.robot"
        );
    }

    #[test]
    fn test_rewrite_normalizes_separators() {
        let rewriter = PathRewriter::new("/robot/");
        assert_eq!(
            rewriter.rewrite(".\\src\\test\\java\\pages\\LoginPage.java", FileRole::PageObject),
            "robot/pages/LoginPage.resource"
        );
    }

    #[test]
    fn test_rewrite_unknown_root_is_mirrored() {
        let rewriter = PathRewriter::new("robot");
        assert_eq!(
            rewriter.rewrite("tests/ui/Checkout Steps.java", FileRole::StepDefinition),
            "robot/tests/ui/Checkout_Steps.resource"
        );
    }

    #[test]
    fn test_already_migrated_path_is_unchanged() {
        let rewriter = PathRewriter::new("robot");
        let target = "robot/features/login.robot";
        assert_eq!(rewriter.rewrite(target, FileRole::Resource), target);
    }

    #[test]
    fn test_dotfile_keeps_name() {
        assert_eq!(sanitize_file_name(".java", "resource"), ".java.resource");
    }

    #[test]
    fn test_relative_to_root() {
        let rewriter = PathRewriter::new("robot");
        assert_eq!(rewriter.relative_to_root("robot/login.robot"), "");
        assert_eq!(rewriter.relative_to_root("robot/features/auth/login.robot"), "../../");
    }

    proptest! {
        #[test]
        fn prop_rewrite_is_idempotent(
            segments in proptest::collection::vec("[a-zA-Z0-9 _.-]{1,10}", 1..6),
            root in prop_oneof![Just("robot"), Just("tests/robot"), Just("src")],
            role_idx in 0usize..7,
        ) {
            let role = FileRole::ALL[role_idx];
            let rewriter = PathRewriter::new(root);
            let path = segments.join("/");
            let once = rewriter.rewrite(&path, role);
            let twice = rewriter.rewrite(&once, role);
            prop_assert_eq!(once, twice);
        }
    }
}
