//! File discovery and role classification
//!
//! Classification is a single ordered rule table over path segments and
//! file-name tokens; the first matching rule wins. Everything downstream
//! consumes the resulting [`FileRole`].

use crate::error::RepoError;
use crate::model::{DiscoveredFile, FileRole, MigrationRequest, OperationKind};
use crate::repo::{is_under, ListProgress, RepositoryFacade};
use std::collections::{BTreeMap, BTreeSet};

/// File patterns listed for fresh migrations
pub const SOURCE_PATTERN: &str = "*.java|*.kt|*.feature|*.properties";
/// File patterns listed when re-processing migrated output
pub const TARGET_PATTERN: &str = "*.robot|*.resource";

/// Maximum sample names listed per role in summaries
const MAX_SAMPLES: usize = 3;

/// Pre-split view of a path, lowercased
#[derive(Debug)]
pub struct PathTokens {
    dirs: Vec<String>,
    stem: String,
    extension: String,
}

impl PathTokens {
    pub fn new(path: &str) -> Self {
        let lower = path.replace('\\', "/").to_lowercase();
        let mut segments: Vec<String> = lower
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let file_name = segments.pop().unwrap_or_default();
        let (stem, extension) = match file_name.rfind('.') {
            Some(idx) if idx > 0 => (file_name[..idx].to_string(), file_name[idx + 1..].to_string()),
            _ => (file_name.clone(), String::new()),
        };
        Self {
            dirs: segments,
            stem,
            extension,
        }
    }

    fn has_dir(&self, names: &[&str]) -> bool {
        self.dirs.iter().any(|d| names.contains(&d.as_str()))
    }

    fn dir_contains(&self, needle: &str) -> bool {
        self.dirs.iter().any(|d| d.contains(needle))
    }

    fn stem_ends_with(&self, suffixes: &[&str]) -> bool {
        suffixes.iter().any(|s| self.stem.ends_with(s))
    }
}

/// One row of the classification table
pub struct ClassificationRule {
    pub name: &'static str,
    pub matches: fn(&PathTokens) -> bool,
    pub role: FileRole,
}

fn is_feature(t: &PathTokens) -> bool {
    t.extension == "feature"
}

fn is_page_object(t: &PathTokens) -> bool {
    t.has_dir(&["pages", "page", "pageobjects", "pageobject"])
        || t.stem_ends_with(&["page", "pageobject"])
}

fn is_step_definition(t: &PathTokens) -> bool {
    t.dir_contains("stepdefinition")
        || t.has_dir(&["steps", "stepdefs", "step"])
        || t.stem_ends_with(&["steps", "stepdefs", "stepdefinitions", "stepdefinition"])
}

fn is_locator(t: &PathTokens) -> bool {
    t.dir_contains("locator") || t.stem.contains("locator")
}

fn is_utility(t: &PathTokens) -> bool {
    t.has_dir(&["utils", "util", "utilities", "helpers", "helper"])
        || t.stem.contains("util")
        || t.stem.contains("helper")
}

fn is_robot_suite(t: &PathTokens) -> bool {
    t.extension == "robot"
}

fn is_resource(t: &PathTokens) -> bool {
    matches!(
        t.extension.as_str(),
        "resource" | "properties" | "json" | "yaml" | "yml" | "csv" | "xml"
    )
}

/// Ordered rule table; first match wins
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule { name: "gherkin feature", matches: is_feature, role: FileRole::Scenario },
    ClassificationRule { name: "page object", matches: is_page_object, role: FileRole::PageObject },
    ClassificationRule { name: "step definition", matches: is_step_definition, role: FileRole::StepDefinition },
    ClassificationRule { name: "locator", matches: is_locator, role: FileRole::Locator },
    ClassificationRule { name: "utility", matches: is_utility, role: FileRole::Utility },
    ClassificationRule { name: "robot suite", matches: is_robot_suite, role: FileRole::Scenario },
    ClassificationRule { name: "resource file", matches: is_resource, role: FileRole::Resource },
];

/// Assign a role to a path using [`RULES`].
pub fn classify(path: &str) -> FileRole {
    let tokens = PathTokens::new(path);
    RULES
        .iter()
        .find(|rule| (rule.matches)(&tokens))
        .map(|rule| rule.role)
        .unwrap_or(FileRole::Other)
}

/// Name of the rule that classified `path`, for diagnostics.
pub fn matching_rule(path: &str) -> Option<&'static str> {
    let tokens = PathTokens::new(path);
    RULES.iter().find(|r| (r.matches)(&tokens)).map(|r| r.name)
}

/// Branch that discovery reads from for a given request
pub fn discovery_branch(request: &MigrationRequest) -> String {
    match request.operation {
        OperationKind::Transformation => request
            .target_branch
            .clone()
            .unwrap_or_else(|| request.source_branch.clone()),
        _ => request.source_branch.clone(),
    }
}

/// Enumerate and classify candidate files for a request.
///
/// Explicit role paths take precedence over the rule table. For fresh
/// migrations, files already under the target root are ignored.
pub async fn discover(
    facade: &dyn RepositoryFacade,
    request: &MigrationRequest,
    progress: Option<ListProgress<'_>>,
) -> Result<Vec<DiscoveredFile>, RepoError> {
    let branch = discovery_branch(request);
    let transformation_only = request.operation.is_transformation_only();
    let pattern = if transformation_only {
        TARGET_PATTERN
    } else {
        SOURCE_PATTERN
    };

    let mut found: BTreeMap<String, FileRole> = BTreeMap::new();

    for (role, paths) in &request.role_paths {
        for path in paths {
            let files = facade
                .list_all_files(path, pattern, Some(&branch), progress)
                .await?;
            for file in files {
                found.entry(file.path).or_insert(*role);
            }
        }
    }

    let roots: Vec<String> = if transformation_only {
        vec![request.target_root.clone()]
    } else if request.source_paths.is_empty() {
        vec![String::new()]
    } else {
        request.source_paths.clone()
    };

    for root in &roots {
        let files = facade
            .list_all_files(root, pattern, Some(&branch), progress)
            .await?;
        for file in files {
            if !transformation_only && is_under(&file.path, &request.target_root) {
                continue;
            }
            let role = classify(&file.path);
            found.entry(file.path).or_insert(role);
        }
    }

    let discovered: Vec<DiscoveredFile> = found
        .into_iter()
        .map(|(path, role)| DiscoveredFile {
            path,
            role,
            branch: branch.clone(),
        })
        .collect();

    tracing::info!(
        count = discovered.len(),
        branch = %branch,
        "discovered candidate files"
    );
    Ok(discovered)
}

/// Per-role counts with a few sample names, in role order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSummary {
    pub role: FileRole,
    pub count: usize,
    pub samples: Vec<String>,
}

/// Summarize paths by role for commit messages and reports.
pub fn summarize_roles<'a, I>(files: I) -> Vec<RoleSummary>
where
    I: IntoIterator<Item = (&'a str, FileRole)>,
{
    let mut by_role: BTreeMap<FileRole, (usize, Vec<String>)> = BTreeMap::new();
    for (path, role) in files {
        let entry = by_role.entry(role).or_default();
        entry.0 += 1;
        let name = display_name(path);
        if entry.1.len() < MAX_SAMPLES && !entry.1.contains(&name) {
            entry.1.push(name);
        }
    }
    by_role
        .into_iter()
        .map(|(role, (count, samples))| RoleSummary {
            role,
            count,
            samples,
        })
        .collect()
}

/// File stem used as a short display name
pub fn display_name(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name[..idx].to_string(),
        _ => file_name.to_string(),
    }
}

/// Distinct roles present in a discovery result
pub fn roles_present(files: &[DiscoveredFile]) -> BTreeSet<FileRole> {
    files.iter().map(|f| f.role).collect()
}
