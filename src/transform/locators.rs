//! Locator-class transformation
//!
//! Named locator constants become `*** Variables ***` rows, each tagged with
//! a heuristic quality rating so fragile selectors stand out in review.

use super::actions::Locator;
use super::extract::{element_declarations, first_string_literal, outline, ExtractError};
use super::generate::{GenContext, RobotFile, Variable};
use super::mapping::{escape_cell, render_locator};
use super::naming::{constant_name, keyword_name_from_identifier};
use crate::model::TransformStrategy;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LocatorQuality {
    Stable,
    Moderate,
    Fragile,
}

impl fmt::Display for LocatorQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LocatorQuality::Stable => "Stable",
            LocatorQuality::Moderate => "Moderate",
            LocatorQuality::Fragile => "Fragile",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorConstant {
    pub name: String,
    pub locator: Locator,
    pub quality: LocatorQuality,
}

fn positional_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d+\]|:nth-(?:child|of-type)\(").expect("positional regex"))
}

/// Rate how likely a locator is to survive page changes.
pub fn classify_quality(locator: &Locator) -> LocatorQuality {
    let value = locator.value.as_str();
    if value.contains("data-testid") || value.contains("data-test") || value.contains("aria-") {
        return LocatorQuality::Stable;
    }
    match locator.strategy.as_str() {
        "id" | "name" => LocatorQuality::Stable,
        "xpath" => {
            if value.starts_with("/html") || value.contains("text()") || positional_regex().is_match(value) {
                LocatorQuality::Fragile
            } else if value.matches('/').count() > 4 {
                LocatorQuality::Fragile
            } else {
                LocatorQuality::Moderate
            }
        }
        "cssSelector" | "css" => {
            let depth = value.split_whitespace().filter(|part| *part != ">").count();
            if positional_regex().is_match(value) || depth > 3 {
                LocatorQuality::Fragile
            } else {
                LocatorQuality::Moderate
            }
        }
        "tagName" => LocatorQuality::Fragile,
        _ => LocatorQuality::Moderate,
    }
}

/// Strategy for a bare selector string constant
pub fn infer_strategy(value: &str) -> &'static str {
    let v = value.trim();
    if v.starts_with("//") || v.starts_with("(/") || v.starts_with("./") || v.starts_with('(') {
        "xpath"
    } else if v.starts_with('#') || v.starts_with('.') || v.starts_with('[') || v.contains(" > ") || v.contains('[') {
        "cssSelector"
    } else {
        "id"
    }
}

/// Every named locator constant in a class: `By` fields, `@FindBy` fields
/// and selector string constants.
pub fn locator_constants(source: &str) -> Result<Vec<LocatorConstant>, ExtractError> {
    let class = outline(source)?;
    let mut constants: Vec<LocatorConstant> = element_declarations(&class)
        .into_iter()
        .map(|decl| LocatorConstant {
            quality: classify_quality(&decl.locator),
            name: decl.name,
            locator: decl.locator,
        })
        .collect();

    for field in class.fields() {
        if field.type_name().as_deref() != Some("String") {
            continue;
        }
        let (Some(name), Some(init)) = (field.name(), field.initializer()) else {
            continue;
        };
        if constants.iter().any(|c| c.name == name) {
            continue;
        }
        let Some(value) = first_string_literal(init) else {
            continue;
        };
        let locator = Locator::new(infer_strategy(&value), value);
        constants.push(LocatorConstant {
            name,
            quality: classify_quality(&locator),
            locator,
        });
    }
    Ok(constants)
}

/// Generate a locator resource. `Ok(None)` when no constants were found.
pub fn locators_file(source: &str, ctx: &GenContext<'_>) -> Result<Option<(RobotFile, TransformStrategy)>, ExtractError> {
    let constants = locator_constants(source)?;
    if constants.is_empty() {
        return Ok(None);
    }
    let class_name = outline(source)?.name;
    let title = class_name
        .as_deref()
        .map(keyword_name_from_identifier)
        .unwrap_or_else(|| ctx.title());

    let mut file = RobotFile::resource(ctx, format!("Locators migrated from {}", title));
    let count = |q: LocatorQuality| constants.iter().filter(|c| c.quality == q).count();
    file.header.push(format!(
        "# Locator quality: {} stable, {} moderate, {} fragile",
        count(LocatorQuality::Stable),
        count(LocatorQuality::Moderate),
        count(LocatorQuality::Fragile)
    ));

    for constant in &constants {
        let (value, comment) = match render_locator(&constant.locator) {
            Some(locator) => (escape_cell(&locator), format!("quality: {}", constant.quality)),
            None => (
                escape_cell(&constant.locator.value),
                format!("TODO: unmapped locator strategy '{}'", constant.locator.strategy),
            ),
        };
        file.variables.push(Variable {
            name: constant_name(&constant.name),
            value,
            comment: Some(comment),
        });
    }
    Ok(Some((file, TransformStrategy::Semantic)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransformMode;

    const LOCATORS: &str = r#"
        public final class LoginLocators {
            public static final By USERNAME = By.id("username");
            public static final By SUBMIT = By.cssSelector("form#login > button");
            public static final By FIRST_ROW = By.xpath("/html/body/div[2]/table/tr[1]");
            public static final String SEARCH_BOX = "//input[@id='q']";
            public static final String TEST_ID = "[data-testid='save']";
            public static final int TIMEOUT = 10;
            private LoginLocators() { }
        }
    "#;

    #[test]
    fn test_constants_and_quality() {
        let constants = locator_constants(LOCATORS).unwrap();
        let summary: Vec<(&str, &str, LocatorQuality)> = constants
            .iter()
            .map(|c| (c.name.as_str(), c.locator.strategy.as_str(), c.quality))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("USERNAME", "id", LocatorQuality::Stable),
                ("SUBMIT", "cssSelector", LocatorQuality::Moderate),
                ("FIRST_ROW", "xpath", LocatorQuality::Fragile),
                ("SEARCH_BOX", "xpath", LocatorQuality::Moderate),
                ("TEST_ID", "cssSelector", LocatorQuality::Stable),
            ]
        );
    }

    #[test]
    fn test_infer_strategy() {
        assert_eq!(infer_strategy("//div"), "xpath");
        assert_eq!(infer_strategy("(//a)[2]"), "xpath");
        assert_eq!(infer_strategy("#main"), "cssSelector");
        assert_eq!(infer_strategy("form > input"), "cssSelector");
        assert_eq!(infer_strategy("login-button"), "id");
    }

    #[test]
    fn test_locators_file_rendering() {
        let ctx = GenContext {
            mode: TransformMode::Enhanced,
            library: "SeleniumLibrary",
            source_path: "src/test/java/locators/LoginLocators.java",
        };
        let (file, _) = locators_file(LOCATORS, &ctx).unwrap().unwrap();
        let rendered = file.render();
        assert!(rendered.contains("# Locator quality: 2 stable, 2 moderate, 1 fragile\n"));
        assert!(rendered.contains("${USERNAME}    id:username    # quality: Stable\n"));
        assert!(rendered.contains("${SEARCH_BOX}    xpath://input[@id='q']    # quality: Moderate\n"));
        assert!(!rendered.contains("TIMEOUT"));
    }

    #[test]
    fn test_no_constants_is_none() {
        let ctx = GenContext {
            mode: TransformMode::Enhanced,
            library: "SeleniumLibrary",
            source_path: "Empty.java",
        };
        assert!(locators_file("class Empty { int x = 1; }", &ctx).unwrap().is_none());
    }
}
