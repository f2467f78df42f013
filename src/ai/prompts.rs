use crate::model::FileRole;

pub const MIGRATION_SYSTEM: &str = r#"You are a senior test automation engineer migrating Java Selenium and Cucumber test code to Robot Framework.

OUTPUT FORMAT:
- Output ONLY the Robot Framework file. No explanations, no markdown fences.
- The first line must be a section header such as *** Settings ***.
- Separate cells with exactly four spaces. Indent keyword and test bodies with four spaces.

RULES:
- Import the automation library named in the request in the Settings section.
- Use the library's own keywords (Click Element, Input Text, Go To, Wait Until Element Is Visible, ...).
- Convert Selenium locators to library syntax: id:, name:, css:, xpath:, class:, link:, partial link:, tag:.
- Keep every step and method. Never drop behaviour silently.
- When something has no direct equivalent, keep a `# TODO:` comment describing it.
- Never leave Java syntax (imports, classes, annotations, WebElement declarations) in the output."#;

const STEP_DEFINITION_TASK: &str = r#"Convert every step-definition method into one keyword.
- Keyword name: the step pattern in Title Case with placeholders replaced by words (a string placeholder becomes "Text", a number becomes "Number").
- One [Arguments] entry per method parameter, named after the parameter.
- First body line after arguments: [Documentation] with the step kind and the original pattern."#;

const PAGE_OBJECT_TASK: &str = r#"Convert the page object into a resource file.
- Every located element (@FindBy or By field) becomes a variable in *** Variables *** named in UPPER_SNAKE_CASE.
- Every public method becomes a keyword using those variables."#;

const LOCATOR_TASK: &str = r#"Convert the locator class into a resource file.
- Every locator constant becomes a variable in *** Variables *** with the converted locator.
- Append a comment rating the locator: # quality: Stable, Moderate or Fragile."#;

const SCENARIO_TASK: &str = r#"Convert the Gherkin feature into a Robot Framework suite.
- Feature name and description go into Documentation; feature tags into Force Tags.
- Each scenario becomes a test case; expand Scenario Outlines into one test per Examples row.
- Each step becomes a keyword call: Title Case text with quoted strings and numbers passed as arguments.
- Background steps go into a "Background Steps" keyword used as Test Setup.
- Import ${CURDIR}/<root>resources/common.resource and use Open Test Browser / Close All Browsers as suite setup and teardown."#;

const GENERIC_TASK: &str = r#"Convert this file into an equivalent Robot Framework resource file."#;

fn role_task(role: FileRole) -> &'static str {
    match role {
        FileRole::StepDefinition => STEP_DEFINITION_TASK,
        FileRole::PageObject => PAGE_OBJECT_TASK,
        FileRole::Locator => LOCATOR_TASK,
        FileRole::Scenario => SCENARIO_TASK,
        FileRole::Utility | FileRole::Resource | FileRole::Other => GENERIC_TASK,
    }
}

/// User message for one file
pub fn migration_user_prompt(role: FileRole, path: &str, library: &str, content: &str) -> String {
    format!(
        "FILE: {path}\nROLE: {role}\nLIBRARY: {library}\n\nTASK:\n{task}\n\nSOURCE:\n{content}",
        path = path,
        role = role.label(),
        library = library,
        task = role_task(role),
        content = content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_role_and_library() {
        let prompt = migration_user_prompt(FileRole::PageObject, "pages/Login.java", "Browser", "class Login {}");
        assert!(prompt.contains("ROLE: page object"));
        assert!(prompt.contains("LIBRARY: Browser"));
        assert!(prompt.contains("*** Variables ***"));
        assert!(prompt.ends_with("class Login {}"));
    }
}
