use super::*;
use crate::error::RepoErrorKind;
use crate::model::{MigrationStatus, TransformMode};
use crate::repo::testing::FaultyRepository;
use crate::repo::MemoryRepository;
use std::sync::Mutex;

const STEPS: &str = r#"
package com.acme.steps;

public class LoginSteps {
    @Given("user is on login page")
    public void onLoginPage() {
        navigate("url");
    }

    @When("user enters {string} and {string}")
    public void enterCredentials(String username, String password) {
        driver.findElement(By.id("username")).sendKeys(username);
        driver.findElement(By.id("password")).sendKeys(password);
    }
}
"#;

const PAGE: &str = r#"
public class LoginPage {
    @FindBy(id = "submit")
    private WebElement submitButton;

    public void submit() {
        submitButton.click();
    }
}
"#;

const FEATURE: &str = "Feature: Login\n  Scenario: Valid login\n    Given user is on login page\n    When user enters \"bob\" and \"secret\"\n";

const STEPS_PATH: &str = "src/test/java/steps/LoginSteps.java";
const PAGE_PATH: &str = "src/test/java/pages/LoginPage.java";
const FEATURE_PATH: &str = "src/test/resources/features/login.feature";

fn sources() -> Vec<(&'static str, &'static str)> {
    vec![
        (STEPS_PATH, STEPS),
        (PAGE_PATH, PAGE),
        (FEATURE_PATH, FEATURE),
        ("README.md", "# readme"),
    ]
}

fn memory() -> MemoryRepository {
    MemoryRepository::with_branch("main", sources()).with_multi_file_writes()
}

fn request() -> MigrationRequest {
    MigrationRequest {
        target_branch: Some("migrated".to_string()),
        batch_size: 2,
        ..Default::default()
    }
}

type Events = Mutex<Vec<(String, WorkflowPhase, Option<u8>)>>;

fn recorder(events: &Events) -> impl Fn(&str, WorkflowPhase, Option<u8>) + Send + Sync + '_ {
    move |message: &str, phase: WorkflowPhase, percent: Option<u8>| {
        events.lock().unwrap().push((message.to_string(), phase, percent));
    }
}

fn result_for<'r>(response: &'r MigrationResponse, source: &str) -> &'r MigrationResult {
    response
        .results
        .iter()
        .find(|r| r.source_file == source)
        .unwrap_or_else(|| panic!("no result for {}", source))
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_migration() {
    let repo = memory();
    let events = Events::default();
    let observer = recorder(&events);
    let response = Workflow::new(&repo).run(&request(), &observer).await;

    assert!(response.is_success(), "{:?}", response.error);
    assert_eq!(response.run_id.len(), 36);
    assert_eq!(response.results.len(), 3);
    assert!(response.results.iter().all(MigrationResult::is_success));
    assert_eq!(response.branch.as_deref(), Some("migrated"));
    assert_eq!(response.summary.discovered, 3);
    assert_eq!(response.summary.committed, 3);
    assert_eq!(response.summary.skeleton_files, 3);
    // 3 files in batches of 2, skeleton joins the last batch
    assert_eq!(response.summary.batches, 2);
    assert_eq!(repo.commits().len(), 2);
    assert!(repo.commits()[0].message.starts_with("robomigrate: migrate batch 1/2 (2 files)"));

    let steps = repo.file("migrated", "robot/steps/LoginSteps.resource").unwrap();
    assert!(steps.contains("\nUser Is On Login Page\n"));
    assert!(steps.contains("    Go To    url\n"));
    let suite = repo.file("migrated", "robot/features/login.robot").unwrap();
    assert!(suite.contains("User Enters Text And Text    bob    secret"));
    let common = repo.file("migrated", "robot/resources/common.resource").unwrap();
    assert!(common.contains("Resource    ${CURDIR}/../pages/LoginPage.resource"));
    assert!(repo.file("main", "robot/steps/LoginSteps.resource").is_none());

    let events = events.lock().unwrap();
    let phases: Vec<WorkflowPhase> = events.iter().map(|e| e.1).collect();
    for phase in [
        WorkflowPhase::Validating,
        WorkflowPhase::Analyzing,
        WorkflowPhase::Transforming,
        WorkflowPhase::Generating,
        WorkflowPhase::Committing,
        WorkflowPhase::Completed,
    ] {
        assert!(phases.contains(&phase), "missing {:?}", phase);
    }
    assert_eq!(events.last().map(|e| e.2), Some(Some(100)));
}

#[tokio::test(start_paused = true)]
async fn test_access_errors_are_classified() {
    let repo = FaultyRepository::new(memory()).fail_branch_listing(RepoError::new(RepoErrorKind::Auth, "401 Unauthorized"));
    let response = Workflow::new(&repo).run(&request(), &NoopObserver).await;
    assert_eq!(response.state.phase, WorkflowPhase::Failed);
    assert_eq!(response.error_code, Some(ErrorCode::Auth));
    assert!(response.results.is_empty());

    let repo = memory();
    let missing = MigrationRequest {
        source_branch: "develop".to_string(),
        ..request()
    };
    let response = Workflow::new(&repo).run(&missing, &NoopObserver).await;
    assert_eq!(response.error_code, Some(ErrorCode::NotFound));
    assert!(response.error.unwrap().contains("develop"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_discovery_completes() {
    let repo = MemoryRepository::with_branch("main", [("README.md", "# readme")]);
    let response = Workflow::new(&repo).run(&request(), &NoopObserver).await;
    assert!(response.is_success());
    assert!(response.results.is_empty());
    assert_eq!(response.state.percent, 100);
    assert!(repo.commits().is_empty());
    assert!(!repo.list_branches().await.unwrap().contains(&"migrated".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_is_recorded_per_file() {
    let repo = FaultyRepository::new(memory())
        .fail_read(PAGE_PATH, vec![RepoError::new(RepoErrorKind::Authorization, "forbidden")]);
    let response = Workflow::new(&repo).run(&request(), &NoopObserver).await;

    assert!(response.is_success());
    assert_eq!(response.results.len(), 3);
    let page = result_for(&response, PAGE_PATH);
    assert_eq!(page.status, MigrationStatus::Failed);
    assert!(page.error.as_deref().unwrap().starts_with("read failed:"));
    assert!(result_for(&response, STEPS_PATH).is_success());
    assert_eq!(response.summary.read_failures, 1);
    assert_eq!(response.summary.committed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_writes_nothing() {
    let repo = memory();
    let dry = MigrationRequest {
        dry_run: true,
        create_pr: true,
        ..request()
    };
    let response = Workflow::new(&repo).run(&dry, &NoopObserver).await;
    assert!(response.is_success());
    assert!(repo.commits().is_empty());
    assert!(repo.pull_requests().is_empty());
    assert!(!repo.list_branches().await.unwrap().contains(&"migrated".to_string()));
    for result in &response.results {
        assert!(result.is_success());
        assert_eq!(result.note.as_deref(), Some("dry run: not committed"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_branch_creation_failure() {
    let repo = FaultyRepository::new(memory()).fail_branch_creation(RepoError::other("ref locked"));
    let response = Workflow::new(&repo).run(&request(), &NoopObserver).await;
    assert_eq!(response.error_code, Some(ErrorCode::Branch));
    assert_eq!(response.results.len(), 3);
    for result in &response.results {
        assert_eq!(result.status, MigrationStatus::Failed);
        assert!(result.error.as_deref().unwrap().starts_with("not processed:"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_observer_panic_is_internal_error() {
    let repo = memory();
    let observer = |_: &str, phase: WorkflowPhase, _: Option<u8>| {
        if phase == WorkflowPhase::Transforming {
            panic!("observer exploded");
        }
    };
    let response = Workflow::new(&repo).run(&request(), &observer).await;
    assert_eq!(response.state.phase, WorkflowPhase::Failed);
    assert_eq!(response.error_code, Some(ErrorCode::Internal));
    assert!(response.error.unwrap().contains("observer exploded"));
    assert_eq!(response.results.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_marks_its_files() {
    let repo = FaultyRepository::new(memory())
        .script_writes(vec![Some(RepoError::new(RepoErrorKind::Authorization, "permission denied")), None]);
    let response = Workflow::new(&repo).run(&request(), &NoopObserver).await;

    assert!(response.is_success());
    assert_eq!(response.summary.commit_failures, 2);
    assert_eq!(response.summary.committed, 1);
    let failed: Vec<&MigrationResult> = response.results.iter().filter(|r| !r.is_success()).collect();
    assert_eq!(failed.len(), 2);
    assert!(failed[0].error.as_deref().unwrap().starts_with("commit failed:"));
}

#[tokio::test(start_paused = true)]
async fn test_pull_request() {
    let repo = memory();
    let with_pr = MigrationRequest {
        create_pr: true,
        ..request()
    };
    let response = Workflow::new(&repo).run(&with_pr, &NoopObserver).await;
    assert_eq!(response.pr_url.as_deref(), Some("memory://pulls/1"));
    let prs = repo.pull_requests();
    assert_eq!(prs[0].head, "migrated");
    assert_eq!(prs[0].base, "main");

    let repo = FaultyRepository::new(memory()).fail_pull_request(RepoError::other("422 validation failed"));
    let response = Workflow::new(&repo).run(&with_pr, &NoopObserver).await;
    assert_eq!(response.error_code, Some(ErrorCode::PullRequest));
    // Files were committed before the pull request failed
    assert!(response.results.iter().all(MigrationResult::is_success));
}

const MIGRATED_V1: &str = "# robomigrate: mode=enhanced tier=1\n\
*** Settings ***\n\
Documentation    Login steps\n\
...    Generated by robomigrate; mode=enhanced, tier=1.\n\
Library    SeleniumLibrary\n\
\n\
*** Keywords ***\n\
User Is On Login Page\n\
\x20   Go To    url\n";

#[tokio::test(start_paused = true)]
async fn test_transformation_only_applies_tier() {
    let repo = MemoryRepository::with_branch(
        "main",
        [
            ("robot/steps/LoginSteps.resource", MIGRATED_V1.to_string()),
            ("robot/steps/Done.resource", MIGRATED_V1.replace("tier=1\n", "tier=2 validated\n")),
        ],
    );
    let transform = MigrationRequest {
        operation: OperationKind::Transformation,
        target_branch: None,
        tier: TransformTier::Validation,
        ..request()
    };
    let response = Workflow::new(&repo).run(&transform, &NoopObserver).await;

    assert!(response.is_success(), "{:?}", response.error);
    assert_eq!(response.summary.unchanged, 1);
    assert_eq!(response.summary.skeleton_files, 0);
    assert_eq!(
        result_for(&response, "robot/steps/Done.resource").note.as_deref(),
        Some("unchanged: already at the requested tier")
    );
    let updated = repo.file("main", "robot/steps/LoginSteps.resource").unwrap();
    assert!(updated.starts_with("# robomigrate: mode=enhanced tier=2 validated\n"));
    assert!(updated.contains("User Is On Login Page\n    Go To    url\n"));
}

#[tokio::test(start_paused = true)]
async fn test_migration_and_transformation_keeps_newer_targets() {
    let mut files: Vec<(String, String)> = sources()
        .into_iter()
        .map(|(p, c)| (p.to_string(), c.to_string()))
        .collect();
    files.push((
        "robot/steps/LoginSteps.resource".to_string(),
        MIGRATED_V1.replace("tier=1\n", "tier=3 validated\n"),
    ));
    let repo = MemoryRepository::with_branch("main", files).with_multi_file_writes();
    let both = MigrationRequest {
        operation: OperationKind::MigrationAndTransformation,
        mode: TransformMode::Enhanced,
        ..request()
    };
    let response = Workflow::new(&repo).run(&both, &NoopObserver).await;

    assert!(response.is_success());
    assert_eq!(response.results.len(), 3);
    assert_eq!(response.summary.unchanged, 1);
    let steps = result_for(&response, STEPS_PATH);
    assert!(steps.is_success());
    assert_eq!(steps.target_file.as_deref(), Some("robot/steps/LoginSteps.resource"));
    assert!(repo
        .file("migrated", "robot/steps/LoginSteps.resource")
        .unwrap()
        .contains("tier=3 validated"));
}
