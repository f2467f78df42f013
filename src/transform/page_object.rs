//! Page-object transformation
//!
//! Located elements become suite variables and every public method becomes a
//! keyword whose body is the mapped action list.

use super::actions::extract_actions;
use super::extract::{element_names, outline, ExtractError, Method};
use super::generate::{element_variables, Block, GenContext, RobotFile};
use super::mapping::map_actions;
use super::naming::{keyword_name_from_identifier, scalar};
use crate::model::{TransformMode, TransformStrategy};

fn method_keyword(method: &Method, elements: &std::collections::BTreeMap<String, super::actions::Locator>, ctx: &GenContext<'_>) -> (Block, bool) {
    let actions = extract_actions(&method.body, elements);
    let mapped = map_actions(&actions);
    let semantic = mapped.iter().any(|line| !line.starts_with('#'));

    let mut body = Vec::new();
    if ctx.mode == TransformMode::Hybrid {
        body.push(format!("# REVIEW: verify mapped actions for '{}'", method.name));
    }
    if mapped.is_empty() {
        body.push("# TODO: no actions found in the method body".to_string());
        body.push("No Operation".to_string());
    } else {
        body.extend(mapped);
    }

    let block = Block {
        name: keyword_name_from_identifier(&method.name),
        args: method.params.iter().map(|p| scalar(p)).collect(),
        documentation: Some(format!("Page object method: {}", method.name)),
        tags: Vec::new(),
        body,
    };
    (block, semantic)
}

/// Generate a page-object resource. `Ok(None)` when the class declares
/// neither elements nor public methods.
pub fn page_object(source: &str, ctx: &GenContext<'_>) -> Result<Option<(RobotFile, TransformStrategy)>, ExtractError> {
    let class = outline(source)?;
    let elements = element_names(&class);
    let variables = element_variables(&class);

    let methods: Vec<&Method> = class
        .methods()
        .filter(|m| m.is_public && !m.is_constructor)
        .collect();
    if methods.is_empty() && variables.is_empty() {
        return Ok(None);
    }

    let title = class
        .name
        .as_deref()
        .map(keyword_name_from_identifier)
        .unwrap_or_else(|| ctx.title());
    let mut file = RobotFile::resource(ctx, format!("Page object migrated from {}", title));
    file.variables = variables;

    let mut any_semantic = false;
    let mut seen = std::collections::BTreeSet::new();
    for method in methods {
        // Overloads collapse into the first definition
        if !seen.insert(method.name.clone()) {
            continue;
        }
        let (block, semantic) = method_keyword(method, &elements, ctx);
        any_semantic |= semantic;
        file.keywords.push(block);
    }

    let strategy = if any_semantic {
        TransformStrategy::Semantic
    } else {
        TransformStrategy::Heuristic
    };
    Ok(Some((file, strategy)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        package com.example.pages;

        import org.openqa.selenium.WebElement;

        public class LoginPage extends BasePage {
            @FindBy(id = "username")
            private WebElement usernameField;

            @FindBy(how = How.CSS, using = "button[type='submit']")
            private WebElement loginButton;

            private final By banner = By.xpath("//div[@class='banner']");

            public LoginPage(WebDriver driver) {
                super(driver);
            }

            public void enterUsername(String name) {
                usernameField.clear();
                usernameField.sendKeys(name);
            }

            public void submit() {
                loginButton.click();
            }

            public String bannerText() {
                return driver.findElement(banner).getText();
            }

            private void helper() { }
        }
    "#;

    fn ctx(mode: TransformMode) -> GenContext<'static> {
        GenContext {
            mode,
            library: "SeleniumLibrary",
            source_path: "src/test/java/com/example/pages/LoginPage.java",
        }
    }

    #[test]
    fn test_elements_become_variables() {
        let (file, _) = page_object(LOGIN_PAGE, &ctx(TransformMode::Enhanced)).unwrap().unwrap();
        let names: Vec<&str> = file.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["USERNAME_FIELD", "LOGIN_BUTTON", "BANNER"]);
        assert_eq!(file.variables[0].value, "id:username");
        assert_eq!(file.variables[1].value, "css:button[type='submit']");
    }

    #[test]
    fn test_public_methods_become_keywords() {
        let (file, strategy) = page_object(LOGIN_PAGE, &ctx(TransformMode::Enhanced)).unwrap().unwrap();
        assert_eq!(strategy, TransformStrategy::Semantic);
        let names: Vec<&str> = file.keywords.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["Enter Username", "Submit", "Banner Text"]);
        assert_eq!(
            file.keywords[0].body,
            vec![
                "Clear Element Text    ${USERNAME_FIELD}".to_string(),
                "Input Text    ${USERNAME_FIELD}    ${name}".to_string(),
            ]
        );
        assert_eq!(file.keywords[1].body, vec!["Click Element    ${LOGIN_BUTTON}".to_string()]);
        assert_eq!(file.keywords[0].documentation.as_deref(), Some("Page object method: enterUsername"));
    }

    #[test]
    fn test_rendered_page_object_is_clean() {
        let (file, _) = page_object(LOGIN_PAGE, &ctx(TransformMode::Enhanced)).unwrap().unwrap();
        let rendered = file.render();
        let report = crate::validate::validate(&rendered);
        assert!(report.valid, "{:?}\n{}", report.issues, rendered);
    }

    #[test]
    fn test_empty_class_is_none() {
        assert!(page_object("public class Empty { }", &ctx(TransformMode::Enhanced)).unwrap().is_none());
    }

    #[test]
    fn test_hybrid_review_marker() {
        let (file, _) = page_object(LOGIN_PAGE, &ctx(TransformMode::Hybrid)).unwrap().unwrap();
        assert_eq!(file.keywords[1].body[0], "# REVIEW: verify mapped actions for 'submit'");
    }
}
