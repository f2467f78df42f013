//! Generated content validator
//!
//! Structural and leakage checks over generated Robot Framework text. The
//! result is reported but never blocks a write.

use crate::model::ValidationReport;
use regex::Regex;
use std::sync::OnceLock;

/// Automation libraries a generated file may import
pub const RECOGNIZED_LIBRARIES: &[&str] = &["SeleniumLibrary", "Browser", "AppiumLibrary", "RequestsLibrary"];

/// Action keywords that show a file actually drives something. `Log` and
/// `No Operation` deliberately do not count.
const ACTION_KEYWORDS: &[&str] = &[
    // SeleniumLibrary
    "click element",
    "click button",
    "click link",
    "input text",
    "input password",
    "go to",
    "get text",
    "element should be visible",
    "element should be enabled",
    "element should contain",
    "wait until element is visible",
    "wait until element is enabled",
    "wait until element is not visible",
    "wait until page contains",
    "select from list by label",
    "select from list by value",
    "select from list by index",
    "clear element text",
    "go back",
    "reload page",
    "close browser",
    "close all browsers",
    "open browser",
    "maximize browser window",
    "get title",
    "get location",
    "get element attribute",
    "submit form",
    "page should contain",
    "page should contain element",
    "sleep",
    // Browser
    "new page",
    "click",
    "fill text",
    "get url",
    // AppiumLibrary
    "open application",
    "tap",
    // RequestsLibrary
    "create session",
    "get on session",
    "post on session",
    "get request",
    "post request",
];

/// Prefixes of BuiltIn assertion keywords (`Should Be Equal`, ...)
const ASSERTION_PREFIXES: &[&str] = &["should ", "run keyword and return status"];

struct Leak {
    label: &'static str,
    pattern: &'static str,
}

const LEAKS: &[Leak] = &[
    Leak { label: "import statement", pattern: r"^import\s+[\w.*]+\s*;?" },
    Leak { label: "package declaration", pattern: r"^package\s+[\w.]+\s*;?" },
    Leak { label: "class declaration", pattern: r"^(?:(?:public|private|protected|final|abstract|static)\s+)*class\s+[A-Z]\w*|\bpublic\s+class\s+\w+" },
    Leak { label: "element annotation", pattern: r"@FindBy\s*\(" },
    Leak { label: "typed element declaration", pattern: r"\bWebElement\s+\w+" },
    Leak { label: "step annotation", pattern: r"@(?:Given|When|Then|And|But)\s*\(" },
    Leak { label: "driver call", pattern: r"\bdriver\.findElement\s*\(" },
];

fn leak_regexes() -> &'static [(Regex, &'static str)] {
    static CELL: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    CELL.get_or_init(|| {
        LEAKS
            .iter()
            .filter_map(|leak| Regex::new(leak.pattern).ok().map(|re| (re, leak.label)))
            .collect()
    })
}

fn cell_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\t+| {2,}|\s+\|\s+").expect("cell separator regex"))
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\*+\s*([A-Za-z][A-Za-z ]*?)\s*\**\s*$").expect("section header regex"))
}

/// Split a Robot row into cells. Leading indentation yields an empty first
/// cell, matching how Robot reads keyword bodies.
pub fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim_end();
    if line.is_empty() {
        return Vec::new();
    }
    cell_separator().split(line).map(|c| c.to_string()).collect()
}

/// Normalized section name (`setting`, `variable`, `test case`, `task`,
/// `keyword`, `comment`) for a header line such as `*** Keywords ***`.
pub fn section_header(line: &str) -> Option<String> {
    let caps = header_regex().captures(line.trim())?;
    let name = caps.get(1)?.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    Some(name.strip_suffix('s').map(str::to_string).unwrap_or(name))
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Library named by a `Library` setting row, if the row is one.
fn imported_library(line: &str) -> Option<String> {
    let cells = split_cells(line);
    let mut cells = cells.iter();
    let first = cells.next()?;
    if !first.eq_ignore_ascii_case("library") {
        return None;
    }
    cells.next().map(|c| c.trim().to_string())
}

const FIXTURE_SETTINGS: &[&str] = &[
    "suite setup",
    "suite teardown",
    "test setup",
    "test teardown",
    "task setup",
    "task teardown",
];

/// Keyword run by a setup or teardown setting row
fn fixture_keyword(line: &str) -> Option<String> {
    let cells = split_cells(line);
    let setting = cells.first()?.to_lowercase();
    if !FIXTURE_SETTINGS.contains(&setting.as_str()) {
        return None;
    }
    cells.get(1).map(|c| c.trim().to_lowercase())
}

/// First keyword called by a body row, with assignments skipped.
fn called_keyword(line: &str) -> Option<String> {
    if !line.starts_with(' ') && !line.starts_with('\t') {
        return None;
    }
    split_cells(line)
        .into_iter()
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty() && !(c.starts_with("${") && c.ends_with('=')) && !c.starts_with('['))
        .map(|c| c.to_lowercase())
}

fn is_action_keyword(keyword: &str) -> bool {
    ACTION_KEYWORDS.contains(&keyword) || ASSERTION_PREFIXES.iter().any(|p| keyword.starts_with(p))
}

/// Run every check over generated content.
pub fn validate(content: &str) -> ValidationReport {
    let mut issues = Vec::new();
    let mut has_keyword_section = false;
    let mut library: Option<String> = None;
    let mut has_action = false;
    let mut section = String::new();

    for (index, line) in content.lines().enumerate() {
        if let Some(name) = section_header(line) {
            if name == "keyword" || name == "test case" || name == "task" {
                has_keyword_section = true;
            }
            section = name;
            continue;
        }
        if is_comment(line) || line.trim().is_empty() {
            continue;
        }

        let code = line.trim();
        for (re, label) in leak_regexes() {
            if re.is_match(code) {
                issues.push(format!("line {}: leaked source syntax ({}): {}", index + 1, label, truncate(code, 80)));
                break;
            }
        }

        if section == "setting" {
            if let Some(name) = imported_library(line) {
                if RECOGNIZED_LIBRARIES.iter().any(|lib| lib.eq_ignore_ascii_case(&name)) {
                    library = Some(name);
                }
            } else if fixture_keyword(line).is_some_and(|kw| is_action_keyword(&kw)) {
                has_action = true;
            }
        } else if section == "keyword" || section == "test case" || section == "task" {
            if called_keyword(line).is_some_and(|kw| is_action_keyword(&kw)) {
                has_action = true;
            }
        }
    }

    if !has_keyword_section {
        issues.push("missing *** Keywords *** or *** Test Cases *** section".to_string());
    }
    match &library {
        None => issues.push(format!(
            "missing automation library import (expected one of: {})",
            RECOGNIZED_LIBRARIES.join(", ")
        )),
        Some(name) if !has_action => {
            issues.push(format!("imports {} but calls none of its action keywords", name))
        }
        Some(_) => {}
    }

    ValidationReport::from_issues(issues)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "# robomigrate: mode=enhanced tier=1\n\
*** Settings ***\n\
Library    SeleniumLibrary\n\
\n\
*** Keywords ***\n\
Open Login\n\
\x20   Go To    ${BASE_URL}\n";

    #[test]
    fn test_valid_resource() {
        let report = validate(GOOD);
        assert!(report.valid, "{:?}", report.issues);
    }

    #[test]
    fn test_missing_library_always_fails() {
        let without = GOOD.replace("Library    SeleniumLibrary\n", "");
        let report = validate(&without);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("missing automation library")));

        let unknown = GOOD.replace("SeleniumLibrary", "Collections");
        assert!(!validate(&unknown).valid);
    }

    #[test]
    fn test_test_cases_count_as_keyword_section() {
        let suite = "*** Settings ***\nLibrary    Browser\n\n*** Test Cases ***\nLogin\n    Click    id=go\n";
        assert!(validate(suite).valid);
    }

    #[test]
    fn test_leaked_source_syntax() {
        let leaked = format!("{}    WebElement username = driver.findElement(By.id(\"u\"));\n", GOOD);
        let report = validate(&leaked);
        assert!(!report.valid);
        assert!(report.issues[0].contains("typed element declaration"));

        let imported = format!("import org.openqa.selenium.By;\n{}", GOOD);
        assert!(!validate(&imported).valid);
    }

    #[test]
    fn test_commented_leaks_are_ignored() {
        let commented = format!("{}    # TODO: unmapped statement: @FindBy(id = \"x\")\n", GOOD);
        assert!(validate(&commented).valid);
    }

    #[test]
    fn test_library_without_actions() {
        let logs_only = GOOD.replace("Go To    ${BASE_URL}", "Log    nothing");
        let report = validate(&logs_only);
        assert!(!report.valid);
        assert!(report.issues[0].contains("none of its action keywords"));
    }

    #[test]
    fn test_assertions_and_assignments_count() {
        let body = GOOD.replace("Go To    ${BASE_URL}", "${ok}=    Run Keyword And Return Status    Element Should Be Visible    id:x");
        assert!(validate(&body).valid);
        let body = GOOD.replace("Go To    ${BASE_URL}", "Should Be Equal    ${a}    ${b}");
        assert!(validate(&body).valid);
    }

    #[test]
    fn test_suite_teardown_counts_as_action() {
        let suite = "*** Settings ***\nLibrary    SeleniumLibrary\nSuite Teardown    Close All Browsers\n\n*** Test Cases ***\nLogin\n    User Logs In\n";
        assert!(validate(suite).valid);
    }

    #[test]
    fn test_section_header_normalization() {
        assert_eq!(section_header("*** Keywords ***").as_deref(), Some("keyword"));
        assert_eq!(section_header("*** Test Case ***").as_deref(), Some("test case"));
        assert_eq!(section_header("***settings***").as_deref(), Some("setting"));
        assert_eq!(section_header("Keywords"), None);
    }

    #[test]
    fn test_split_cells() {
        assert_eq!(split_cells("Library    SeleniumLibrary"), vec!["Library", "SeleniumLibrary"]);
        assert_eq!(split_cells("    Go To    url"), vec!["", "Go To", "url"]);
    }
}
