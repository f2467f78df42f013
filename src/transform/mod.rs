//! Per-file transformation engine
//!
//! Fresh migrations route each file by role: AI delegation first (when
//! enabled), then the semantic generators, then heuristics, and finally a
//! placeholder built from raw method names. Already-migrated target files go
//! through [`tiers::apply_tier`] instead.
//!
//! Nothing in here aborts a run. Generator errors and panics are demoted to
//! placeholders and recorded on the [`TransformedFile`].

pub mod actions;
pub mod extract;
pub mod feature;
pub mod generate;
pub mod locators;
pub mod mapping;
pub mod naming;
pub mod page_object;
pub mod scanner;
pub mod tiers;

use crate::ai::{AiOutcome, AiTransformer, AiUsageMetrics};
use crate::model::{DiscoveredFile, FileRole, TransformMode, TransformStatus, TransformStrategy, TransformTier, TransformedFile};
use crate::paths::PathRewriter;
use crate::validate::validate;
use extract::{has_step_annotations, raw_method_names, ExtractError};
use feature::{feature_suite, parse_feature, FeatureError};
use generate::{placeholder_blocks, placeholder_file, GenContext, RobotFile, Variable};
use locators::locators_file;
use mapping::escape_cell;
use naming::{constant_name, keyword_name_from_identifier};
use page_object::page_object;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tiers::{apply_tier, ensure_marker, Marker, TierRequest};

pub const DEFAULT_LIBRARY: &str = "SeleniumLibrary";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
}

type Generator = fn(&str, &GenContext<'_>) -> Result<Option<(RobotFile, TransformStrategy)>, ExtractError>;

/// Generator chain for a Java source of the given role; first `Some` wins.
fn chain_for(role: FileRole, content: &str) -> &'static [Generator] {
    const STEPS_FIRST: &[Generator] = &[generate::step_definitions, page_object];
    const PAGE_FIRST: &[Generator] = &[page_object];
    const LOCATORS: &[Generator] = &[locators_file, page_object];
    match role {
        FileRole::PageObject if has_step_annotations(content) => STEPS_FIRST,
        FileRole::PageObject => PAGE_FIRST,
        FileRole::Locator => LOCATORS,
        _ => STEPS_FIRST,
    }
}

fn is_feature_path(path: &str) -> bool {
    path.to_lowercase().ends_with(".feature")
}

fn is_properties_path(path: &str) -> bool {
    path.to_lowercase().ends_with(".properties")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct TransformEngine {
    mode: TransformMode,
    library: String,
    rewriter: PathRewriter,
    ai: Option<Arc<AiTransformer>>,
}

impl TransformEngine {
    pub fn new(mode: TransformMode, library: impl Into<String>, rewriter: PathRewriter) -> Self {
        let library = library.into();
        Self {
            mode,
            library: if library.trim().is_empty() {
                DEFAULT_LIBRARY.to_string()
            } else {
                library
            },
            rewriter,
            ai: None,
        }
    }

    pub fn with_ai(mut self, ai: Arc<AiTransformer>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn rewriter(&self) -> &PathRewriter {
        &self.rewriter
    }

    pub fn ai_usage(&self) -> AiUsageMetrics {
        self.ai.as_deref().map(AiTransformer::usage).unwrap_or_default()
    }

    fn context<'a>(&'a self, path: &'a str) -> GenContext<'a> {
        GenContext {
            mode: self.mode,
            library: &self.library,
            source_path: path,
        }
    }

    /// Fresh migration of one source file.
    pub async fn migrate(&self, file: &DiscoveredFile, content: &str) -> TransformedFile {
        let target_path = self.rewriter.rewrite(&file.path, file.role);
        let mut transformed = TransformedFile {
            source_path: file.path.clone(),
            target_path,
            role: file.role,
            content: String::new(),
            validation: Default::default(),
            status: TransformStatus::Success,
            strategy: TransformStrategy::Placeholder,
            error: None,
        };

        if content.trim().is_empty() {
            transformed.status = TransformStatus::Failed;
            transformed.error = Some("source file is empty".to_string());
            return transformed;
        }

        if let Some(ai) = self.ai_for(file.role) {
            if let AiOutcome::Produced(text) = ai.transform(&file.path, file.role, content, &self.library).await {
                transformed.content = ensure_marker(&text, &Marker::new(self.mode, 1));
                transformed.strategy = TransformStrategy::Ai;
                transformed.validation = validate(&transformed.content);
                return transformed;
            }
        }

        let (content, strategy, error) = self.generate_guarded(&file.path, file.role, content, &transformed.target_path);
        transformed.validation = validate(&content);
        transformed.content = content;
        transformed.strategy = strategy;
        transformed.error = error;
        transformed
    }

    fn ai_for(&self, role: FileRole) -> Option<&AiTransformer> {
        if role == FileRole::Utility || self.mode == TransformMode::Manual {
            return None;
        }
        self.ai.as_deref()
    }

    /// Deterministic generation with errors and panics demoted to a placeholder.
    fn generate_guarded(
        &self,
        path: &str,
        role: FileRole,
        content: &str,
        target_path: &str,
    ) -> (String, TransformStrategy, Option<String>) {
        let attempt = catch_unwind(AssertUnwindSafe(|| self.generate_for(path, role, content, target_path)));
        let reason = match attempt {
            Ok(Ok((text, strategy))) => return (text, strategy, None),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("generator panicked: {}", panic_message(payload.as_ref())),
        };
        tracing::warn!(path, error = %reason, "transform demoted to placeholder");
        let ctx = self.context(path);
        let placeholder = placeholder_file(&raw_method_names(content), &ctx, Some(&reason));
        (placeholder.render(), TransformStrategy::Placeholder, Some(reason))
    }

    /// Run the deterministic pipeline for a source file.
    pub fn generate(&self, path: &str, role: FileRole, content: &str) -> Result<(String, TransformStrategy), TransformError> {
        let target = self.rewriter.rewrite(path, role);
        self.generate_for(path, role, content, &target)
    }

    fn generate_for(
        &self,
        path: &str,
        role: FileRole,
        content: &str,
        target_path: &str,
    ) -> Result<(String, TransformStrategy), TransformError> {
        let ctx = self.context(path);

        if is_feature_path(path) {
            let parsed = parse_feature(content)?;
            let suite = feature_suite(&parsed, &ctx, &self.rewriter.relative_to_root(target_path));
            let strategy = if self.mode == TransformMode::Manual {
                TransformStrategy::Manual
            } else {
                TransformStrategy::Semantic
            };
            return Ok((suite.render(), strategy));
        }

        if self.mode == TransformMode::Manual {
            let file = placeholder_file(&raw_method_names(content), &ctx, None);
            return Ok((file.render(), TransformStrategy::Manual));
        }

        match role {
            FileRole::Utility => return Ok((utility_stub(content, &ctx).render(), TransformStrategy::Stub)),
            FileRole::Resource if is_properties_path(path) => {
                return Ok((properties_resource(content, &ctx).render(), TransformStrategy::Semantic));
            }
            FileRole::Resource => {
                let mut file = placeholder_file(&[], &ctx, None);
                file.header.push(format!("# TODO: convert {} manually", path));
                return Ok((file.render(), TransformStrategy::Stub));
            }
            _ => {}
        }

        for generator in chain_for(role, content) {
            if let Some((file, strategy)) = generator(content, &ctx)? {
                return Ok((file.render(), strategy));
            }
        }
        let file = placeholder_file(&raw_method_names(content), &ctx, None);
        Ok((file.render(), TransformStrategy::Placeholder))
    }

    /// Re-process an already-migrated target file. `regenerated` is fresh
    /// output for the source file mapping to it, when there is one.
    pub fn retransform(
        &self,
        file: &DiscoveredFile,
        existing: &str,
        tier: TransformTier,
        force: bool,
        regenerated: Option<&str>,
    ) -> TransformedFile {
        let request = TierRequest {
            mode: self.mode,
            tier,
            force,
            path: &file.path,
        };
        let outcome = apply_tier(existing, request, regenerated);
        let strategy = if outcome.changed {
            TransformStrategy::Tier
        } else {
            TransformStrategy::Unchanged
        };
        let validation = outcome.validation.unwrap_or_else(|| validate(&outcome.content));
        TransformedFile {
            source_path: file.path.clone(),
            target_path: file.path.clone(),
            role: file.role,
            content: outcome.content,
            validation,
            status: TransformStatus::Success,
            strategy,
            error: None,
        }
    }
}

/// Helper classes get one placeholder keyword per method and nothing else.
fn utility_stub(content: &str, ctx: &GenContext<'_>) -> RobotFile {
    let mut file = RobotFile::resource(ctx, format!("Utility stub for {}", ctx.title()));
    let mut names = raw_method_names(content);
    if names.is_empty() {
        names.push(ctx.title());
    }
    file.keywords = placeholder_blocks(&names, &format!("port helper logic from {}", ctx.source_path));
    file
}

/// `key=value` properties become `*** Variables ***` rows.
fn properties_resource(content: &str, ctx: &GenContext<'_>) -> RobotFile {
    let mut file = RobotFile::resource(ctx, format!("Variables migrated from {}", ctx.title()));
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(['=', ':']) {
            Some(at) => (line[..at].trim(), line[at + 1..].trim()),
            None => (line, ""),
        };
        let name = key
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(constant_name)
            .collect::<Vec<_>>()
            .join("_");
        if name.is_empty() || file.variables.iter().any(|v| v.name == name) {
            continue;
        }
        file.variables.push(Variable {
            name,
            value: escape_cell(value),
            comment: None,
        });
    }
    if file.variables.is_empty() {
        file.header.push(format!("# TODO: no properties found in {}", ctx.source_path));
    }
    file.keywords = placeholder_blocks(
        &[format!("{} Loaded", keyword_name_from_identifier(&ctx.title()))],
        "variables only; remove if unused",
    );
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedService;
    use crate::ai::AiOptions;

    fn engine(mode: TransformMode) -> TransformEngine {
        TransformEngine::new(mode, "SeleniumLibrary", PathRewriter::new("robot"))
    }

    fn discovered(path: &str, role: FileRole) -> DiscoveredFile {
        DiscoveredFile {
            path: path.to_string(),
            role,
            branch: "main".to_string(),
        }
    }

    const STEP_SOURCE: &str = r#"@Given("user is on login page") public void method() { navigate("url"); }"#;

    #[tokio::test]
    async fn test_step_definition_end_to_end() {
        let file = discovered("src/test/java/steps/LoginSteps.java", FileRole::StepDefinition);
        let out = engine(TransformMode::Enhanced).migrate(&file, STEP_SOURCE).await;
        assert!(out.is_success());
        assert_eq!(out.target_path, "robot/steps/LoginSteps.resource");
        assert_eq!(out.strategy, TransformStrategy::Semantic);
        assert!(out.content.starts_with("# robomigrate: mode=enhanced tier=1\n"));
        assert!(out.content.contains("\nUser Is On Login Page\n"));
        assert!(out.content.contains("    Go To    url\n"));
        assert!(out.validation.valid, "{:?}", out.validation.issues);
        assert!(out.error.is_none());
    }

    #[tokio::test]
    async fn test_empty_source_fails() {
        let file = discovered("src/test/java/steps/Empty.java", FileRole::StepDefinition);
        let out = engine(TransformMode::Enhanced).migrate(&file, "  \n\t").await;
        assert_eq!(out.status, TransformStatus::Failed);
        assert_eq!(out.error.as_deref(), Some("source file is empty"));
    }

    #[tokio::test]
    async fn test_extract_error_is_demoted_to_placeholder() {
        let source = "public class BrokenSteps {\n  public void first() { }\n  @Given(\"x\") public void second() {\n";
        let file = discovered("src/test/java/steps/BrokenSteps.java", FileRole::StepDefinition);
        let out = engine(TransformMode::Enhanced).migrate(&file, source).await;
        assert!(out.is_success());
        assert_eq!(out.strategy, TransformStrategy::Placeholder);
        assert!(out.error.is_some());
        assert!(out.content.contains("# TODO: automatic migration failed:"));
        assert!(out.content.contains("\nFirst\n"));
    }

    #[tokio::test]
    async fn test_manual_mode_emits_placeholders() {
        let file = discovered("src/test/java/steps/LoginSteps.java", FileRole::StepDefinition);
        let out = engine(TransformMode::Manual).migrate(&file, STEP_SOURCE).await;
        assert_eq!(out.strategy, TransformStrategy::Manual);
        assert!(out.content.starts_with("# robomigrate: mode=manual tier=1\n"));
        assert!(out.content.contains("# TODO: migrate manually from src/test/java/steps/LoginSteps.java"));
        assert!(!out.content.contains("Go To"));
    }

    #[tokio::test]
    async fn test_feature_becomes_suite() {
        let source = "Feature: Login\n  Scenario: Valid login\n    Given user is on login page\n";
        let file = discovered("src/test/resources/features/login.feature", FileRole::Scenario);
        let out = engine(TransformMode::Enhanced).migrate(&file, source).await;
        assert_eq!(out.target_path, "robot/features/login.robot");
        assert!(out.content.contains("*** Test Cases ***\nValid Login\n"));
        assert!(out.content.contains("Resource    ${CURDIR}/../resources/common.resource"));
        assert!(out.content.contains("    User Is On Login Page\n"));
    }

    #[tokio::test]
    async fn test_utility_is_stubbed_and_skips_ai() {
        let service = ScriptedService::new(vec![ScriptedService::reply("*** Keywords ***\nX\n    No Operation\n")]);
        let ai = AiTransformer::new(Arc::new(service), AiOptions::default());
        let engine = engine(TransformMode::Enhanced).with_ai(Arc::new(ai));
        let source = "public class DateUtils { public static String today() { return \"\"; } }";
        let file = discovered("src/test/java/utils/DateUtils.java", FileRole::Utility);
        let out = engine.migrate(&file, source).await;
        assert_eq!(out.strategy, TransformStrategy::Stub);
        assert!(out.content.contains("\nToday\n"));
        assert!(engine.ai_usage().records.is_empty());
    }

    #[tokio::test]
    async fn test_ai_output_used_then_fallback() {
        let service = ScriptedService::new(vec![
            ScriptedService::reply("*** Settings ***\nLibrary    SeleniumLibrary\n\n*** Keywords ***\nOpen\n    Go To    url\n"),
            ScriptedService::reply("I could not convert this file."),
        ]);
        let ai = AiTransformer::new(Arc::new(service), AiOptions::default());
        let engine = engine(TransformMode::Hybrid).with_ai(Arc::new(ai));
        let file = discovered("src/test/java/steps/LoginSteps.java", FileRole::StepDefinition);

        let first = engine.migrate(&file, STEP_SOURCE).await;
        assert_eq!(first.strategy, TransformStrategy::Ai);
        assert!(first.content.starts_with("# robomigrate: mode=hybrid tier=1\n*** Settings ***"));

        let second = engine.migrate(&file, STEP_SOURCE).await;
        assert_eq!(second.strategy, TransformStrategy::Semantic);
        assert!(second.content.contains("User Is On Login Page"));

        let usage = engine.ai_usage();
        assert_eq!(usage.produced(), 1);
        assert_eq!(usage.fallbacks(), 1);
    }

    #[test]
    fn test_properties_become_variables() {
        let source = "# env\nbase.url=https://example.test\nbrowser: chrome\n\nbase.url=dup\n";
        let (content, strategy) = engine(TransformMode::Enhanced)
            .generate("src/test/resources/config.properties", FileRole::Resource, source)
            .unwrap();
        assert_eq!(strategy, TransformStrategy::Semantic);
        assert!(content.contains("${BASE_URL}    https://example.test\n"));
        assert!(content.contains("${BROWSER}    chrome\n"));
        assert_eq!(content.matches("${BASE_URL}").count(), 1);
    }

    #[test]
    fn test_page_object_with_steps_routes_to_step_generator() {
        let (content, _) = engine(TransformMode::Enhanced)
            .generate("src/test/java/pages/HomePage.java", FileRole::PageObject, STEP_SOURCE)
            .unwrap();
        assert!(content.contains("[Documentation]    Given: user is on login page"));
    }

    #[test]
    fn test_retransform_unchanged_without_force() {
        let existing = "# robomigrate: mode=enhanced tier=1\n*** Settings ***\nDocumentation    Steps\nLibrary    SeleniumLibrary\n\n*** Keywords ***\nA\n    Go To    url\n";
        let file = discovered("robot/steps/LoginSteps.resource", FileRole::StepDefinition);
        let engine = engine(TransformMode::Enhanced);

        let same = engine.retransform(&file, existing, TransformTier::QuickRefresh, false, None);
        assert_eq!(same.strategy, TransformStrategy::Unchanged);
        assert_eq!(same.content, existing);

        let validated = engine.retransform(&file, existing, TransformTier::Validation, false, None);
        assert_eq!(validated.strategy, TransformStrategy::Tier);
        assert!(validated.content.starts_with("# robomigrate: mode=enhanced tier=2 validated\n"));
        assert!(validated.validation.valid);
    }
}
