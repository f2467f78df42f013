//! Target project skeleton
//!
//! Shared files every migrated Robot project needs: a common resource that
//! imports all generated resources, a suite initialization file and the
//! Python requirements.

use crate::error::{ErrorCode, MigrationError};
use crate::repo::FileWrite;
use crate::transform::generate::generated_note;
use crate::transform::mapping::row;
use crate::transform::tiers::Marker;
use crate::model::TransformMode;

pub const COMMON_RESOURCE: &str = "resources/common.resource";

fn library_package(library: &str) -> &'static str {
    match library {
        "Browser" => "robotframework-browser",
        "AppiumLibrary" => "robotframework-appiumlibrary",
        "RequestsLibrary" => "robotframework-requests",
        _ => "robotframework-seleniumlibrary",
    }
}

fn join(root: &str, rel: &str) -> String {
    let root = root.trim_matches('/');
    if root.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", root, rel)
    }
}

fn common_resource(root: &str, library: &str, mode: TransformMode, generated_resources: &[String]) -> String {
    let mut lines = vec![
        Marker::new(mode, 1).render(),
        "*** Settings ***".to_string(),
        row(&["Documentation", "Shared settings for the migrated suites"]),
        row(&["...", generated_note(mode, 1).as_str()]),
        row(&["Library", library]),
    ];
    let prefix = format!("{}/", root.trim_matches('/'));
    let mut resources: Vec<&str> = generated_resources
        .iter()
        .map(|path| path.strip_prefix(&prefix).unwrap_or(path))
        .filter(|rel| rel.ends_with(".resource") && *rel != COMMON_RESOURCE)
        .collect();
    resources.sort_unstable();
    resources.dedup();
    for rel in resources {
        lines.push(row(&["Resource", format!("${{CURDIR}}/../{}", rel).as_str()]));
    }

    lines.push(String::new());
    lines.push("*** Variables ***".to_string());
    lines.push(row(&["${BASE_URL}", "http://localhost:8080"]));
    lines.push(row(&["${BROWSER}", "chrome"]));
    lines.push(row(&["${TIMEOUT}", "10s"]));

    lines.push(String::new());
    lines.push("*** Keywords ***".to_string());
    lines.push("Open Test Browser".to_string());
    lines.push(format!("    {}", row(&["Open Browser", "${BASE_URL}", "${BROWSER}"])));
    lines.push(format!("    {}", row(&["Set Selenium Timeout", "${TIMEOUT}"])));
    lines.push("    Maximize Browser Window".to_string());
    lines.push(String::new());
    lines.push("Close Test Browser".to_string());
    lines.push("    Close All Browsers".to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn init_suite(mode: TransformMode) -> String {
    [
        Marker::new(mode, 1).render(),
        "*** Settings ***".to_string(),
        row(&["Documentation", "Migrated test suites"]),
        row(&["Resource", format!("${{CURDIR}}/{}", COMMON_RESOURCE).as_str()]),
        row(&["Suite Setup", "Open Test Browser"]),
        row(&["Suite Teardown", "Close Test Browser"]),
        String::new(),
    ]
    .join("\n")
}

fn requirements(library: &str) -> String {
    format!("robotframework>=7.0\n{}\n", library_package(library))
}

/// Skeleton files for a target root. `generated_resources` are the target
/// paths of every generated `.resource` file.
pub fn generate_skeleton(
    root: &str,
    library: &str,
    mode: TransformMode,
    generated_resources: &[String],
) -> Result<Vec<FileWrite>, MigrationError> {
    let library = library.trim();
    if library.is_empty() {
        return Err(MigrationError::new(
            ErrorCode::Skeleton,
            "cannot generate the project skeleton without an automation library",
        ));
    }
    Ok(vec![
        FileWrite {
            path: join(root, COMMON_RESOURCE),
            content: common_resource(root, library, mode, generated_resources),
        },
        FileWrite {
            path: join(root, "__init__.robot"),
            content: init_suite(mode),
        },
        FileWrite {
            path: join(root, "requirements.txt"),
            content: requirements(library),
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;

    #[test]
    fn test_skeleton_layout() {
        let generated = vec![
            "robot/steps/LoginSteps.resource".to_string(),
            "robot/features/login.robot".to_string(),
            "robot/pages/LoginPage.resource".to_string(),
        ];
        let files = generate_skeleton("robot", "SeleniumLibrary", TransformMode::Enhanced, &generated).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["robot/resources/common.resource", "robot/__init__.robot", "robot/requirements.txt"]);

        let common = &files[0].content;
        assert!(common.contains("Resource    ${CURDIR}/../pages/LoginPage.resource\nResource    ${CURDIR}/../steps/LoginSteps.resource\n"));
        assert!(!common.contains("login.robot"));
        assert!(common.contains("${BASE_URL}    http://localhost:8080"));
        assert!(common.contains("\nOpen Test Browser\n"));
        assert!(validate(common).valid, "{:?}", validate(common).issues);
        assert!(files[2].content.contains("robotframework-seleniumlibrary"));
    }

    #[test]
    fn test_empty_library_is_skeleton_error() {
        let err = generate_skeleton("robot", "  ", TransformMode::Enhanced, &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::Skeleton);
    }
}
