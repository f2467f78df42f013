//! Shared data model for the migration pipeline
//!
//! Requests flow in, every discovered file flows through read -> transform ->
//! commit, and exactly one [`MigrationResult`] flows out per discovered file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Request
// ============================================================================

/// Which halves of the pipeline a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Fresh migration of source files into a new branch
    #[default]
    Migration,
    /// Re-process already-migrated target files in place
    Transformation,
    /// Migrate, re-processing any target file that already exists
    MigrationAndTransformation,
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Migration => "migration",
            OperationKind::Transformation => "transformation",
            OperationKind::MigrationAndTransformation => "migration+transformation",
        }
    }

    /// Transformation-only runs skip branch creation and skeleton generation
    pub fn is_transformation_only(&self) -> bool {
        matches!(self, OperationKind::Transformation)
    }
}

/// How much of the semantic pipeline runs on fresh migrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    /// Bare placeholder with TODO markers
    Manual,
    /// Full extraction, mapping and generation
    #[default]
    Enhanced,
    /// Enhanced output plus inline review markers
    Hybrid,
}

impl TransformMode {
    pub fn label(&self) -> &'static str {
        match self {
            TransformMode::Manual => "manual",
            TransformMode::Enhanced => "enhanced",
            TransformMode::Hybrid => "hybrid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "manual" => Some(TransformMode::Manual),
            "enhanced" => Some(TransformMode::Enhanced),
            "hybrid" => Some(TransformMode::Hybrid),
            _ => None,
        }
    }
}

/// Depth of re-processing applied to already-migrated target files
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformTier {
    /// Rewrite the descriptive header only
    #[default]
    QuickRefresh,
    /// Header refresh plus a structural validation pass
    Validation,
    /// Full re-derivation from original source when available
    DeepRegeneration,
}

impl TransformTier {
    pub fn number(&self) -> u8 {
        match self {
            TransformTier::QuickRefresh => 1,
            TransformTier::Validation => 2,
            TransformTier::DeepRegeneration => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(TransformTier::QuickRefresh),
            2 => Some(TransformTier::Validation),
            3 => Some(TransformTier::DeepRegeneration),
            _ => None,
        }
    }
}

/// AI delegation settings carried on the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSettings {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub region: Option<String>,
}

/// Everything one run needs to know
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub operation: OperationKind,
    pub source_branch: String,
    /// Branch receiving the output; generated from a timestamp when absent
    pub target_branch: Option<String>,
    /// Roots searched for source files; empty means auto-detect
    pub source_paths: Vec<String>,
    /// Explicit paths whose files are forced into a role
    #[serde(default)]
    pub role_paths: BTreeMap<FileRole, Vec<String>>,
    /// Root directory of the generated Robot Framework project
    pub target_root: String,
    pub mode: TransformMode,
    pub tier: TransformTier,
    pub force: bool,
    pub ai: AiSettings,
    pub batch_size: usize,
    pub dry_run: bool,
    pub create_pr: bool,
}

impl Default for MigrationRequest {
    fn default() -> Self {
        Self {
            operation: OperationKind::Migration,
            source_branch: "main".to_string(),
            target_branch: None,
            source_paths: Vec::new(),
            role_paths: BTreeMap::new(),
            target_root: "robot".to_string(),
            mode: TransformMode::Enhanced,
            tier: TransformTier::QuickRefresh,
            force: false,
            ai: AiSettings::default(),
            batch_size: 10,
            dry_run: false,
            create_pr: false,
        }
    }
}

// ============================================================================
// Files
// ============================================================================

/// Role inferred for a discovered file; drives generator routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Scenario,
    StepDefinition,
    PageObject,
    Locator,
    Utility,
    Resource,
    Other,
}

impl FileRole {
    pub const ALL: [FileRole; 7] = [
        FileRole::Scenario,
        FileRole::StepDefinition,
        FileRole::PageObject,
        FileRole::Locator,
        FileRole::Utility,
        FileRole::Resource,
        FileRole::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FileRole::Scenario => "scenario",
            FileRole::StepDefinition => "step definition",
            FileRole::PageObject => "page object",
            FileRole::Locator => "locator",
            FileRole::Utility => "utility",
            FileRole::Resource => "resource",
            FileRole::Other => "other",
        }
    }

    /// Heading used in commit message summaries
    pub fn plural_label(&self) -> &'static str {
        match self {
            FileRole::Scenario => "Scenarios",
            FileRole::StepDefinition => "Step definitions",
            FileRole::PageObject => "Page objects",
            FileRole::Locator => "Locators",
            FileRole::Utility => "Utilities",
            FileRole::Resource => "Resources",
            FileRole::Other => "Other files",
        }
    }

    /// Extension of the generated Robot Framework file
    pub fn target_extension(&self) -> &'static str {
        match self {
            FileRole::Scenario => "robot",
            _ => "resource",
        }
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    pub path: String,
    pub role: FileRole,
    pub branch: String,
}

/// Outcome of the content validator (soft gate)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn from_issues(issues: Vec<String>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// Which strategy ended up producing a file's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformStrategy {
    Ai,
    Semantic,
    Heuristic,
    Placeholder,
    Manual,
    Stub,
    Tier,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformedFile {
    pub source_path: String,
    pub target_path: String,
    pub role: FileRole,
    pub content: String,
    pub validation: ValidationReport,
    pub status: TransformStatus,
    pub strategy: TransformStrategy,
    /// Set when a transform error was demoted to a placeholder
    pub error: Option<String>,
}

impl TransformedFile {
    pub fn is_success(&self) -> bool {
        self.status == TransformStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Success,
    Failed,
}

/// Final per-file outcome; one per discovered file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    pub source_file: String,
    pub target_file: Option<String>,
    pub status: MigrationStatus,
    pub error: Option<String>,
    /// Extra detail for successes that were not written (dry run, unchanged)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MigrationResult {
    pub fn success(source_file: impl Into<String>, target_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            target_file: Some(target_file.into()),
            status: MigrationStatus::Success,
            error: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == MigrationStatus::Success
    }

    pub fn failed(
        source_file: impl Into<String>,
        target_file: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            target_file,
            status: MigrationStatus::Failed,
            error: Some(error.into()),
            note: None,
        }
    }
}

// ============================================================================
// Workflow state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    #[default]
    NotStarted,
    Validating,
    Analyzing,
    Transforming,
    Generating,
    Committing,
    Completed,
    Failed,
}

impl WorkflowPhase {
    /// Human-readable status for display
    pub fn status_text(&self) -> &'static str {
        match self {
            WorkflowPhase::NotStarted => "Ready",
            WorkflowPhase::Validating => "Validating access...",
            WorkflowPhase::Analyzing => "Analyzing sources...",
            WorkflowPhase::Transforming => "Transforming...",
            WorkflowPhase::Generating => "Generating skeleton...",
            WorkflowPhase::Committing => "Committing...",
            WorkflowPhase::Completed => "Complete!",
            WorkflowPhase::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowPhase::Completed | WorkflowPhase::Failed)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    pub phase: WorkflowPhase,
    pub percent: u8,
    pub branch: Option<String>,
    pub pr_url: Option<String>,
}

impl WorkflowState {
    pub fn enter(&mut self, phase: WorkflowPhase, percent: u8) {
        self.phase = phase;
        self.percent = percent.min(100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_numbers_round_trip() {
        for n in 1..=3 {
            assert_eq!(TransformTier::from_number(n).map(|t| t.number()), Some(n));
        }
        assert!(TransformTier::from_number(0).is_none());
        assert!(TransformTier::from_number(4).is_none());
    }

    #[test]
    fn test_tiers_are_ordered() {
        assert!(TransformTier::QuickRefresh < TransformTier::Validation);
        assert!(TransformTier::Validation < TransformTier::DeepRegeneration);
    }

    #[test]
    fn test_only_scenarios_become_suites() {
        for role in FileRole::ALL {
            let expected = if role == FileRole::Scenario { "robot" } else { "resource" };
            assert_eq!(role.target_extension(), expected);
        }
    }

    #[test]
    fn test_validation_report_from_issues() {
        assert!(ValidationReport::from_issues(Vec::new()).valid);
        assert!(!ValidationReport::from_issues(vec!["x".to_string()]).valid);
    }

    #[test]
    fn test_workflow_state_clamps_percent() {
        let mut state = WorkflowState::default();
        state.enter(WorkflowPhase::Committing, 140);
        assert_eq!(state.percent, 100);
        assert!(!state.phase.is_terminal());
        state.enter(WorkflowPhase::Completed, 100);
        assert!(state.phase.is_terminal());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(TransformMode::parse(" Hybrid "), Some(TransformMode::Hybrid));
        assert_eq!(TransformMode::parse("auto"), None);
    }
}
