//! Bounded-region extraction from Java sources
//!
//! A class body is walked member by member: every top-level `;` closes a
//! field, every top-level `{` opens a method (or nested block) whose extent
//! comes from the brace scanner. Annotations are read from member headers.

use super::actions::{extract_actions, Action, ElementRef, Locator};
use super::naming::unescape_java;
use super::scanner::{find_code_any, find_code_byte, scan_block, scan_delimited, split_args, strip_comments};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("unterminated block after '{0}'")]
    UnterminatedBlock(String),
    #[error("unterminated annotation '@{0}'")]
    UnterminatedAnnotation(String),
}

/// The step annotations recognized on step-definition methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Given,
    When,
    Then,
    And,
    But,
}

impl StepKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Given" => Some(StepKind::Given),
            "When" => Some(StepKind::When),
            "Then" => Some(StepKind::Then),
            "And" => Some(StepKind::And),
            "But" => Some(StepKind::But),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Given => "Given",
            StepKind::When => "When",
            StepKind::Then => "Then",
            StepKind::And => "And",
            StepKind::But => "But",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    /// Raw text between the parentheses, empty when absent
    pub args: String,
}

impl Annotation {
    /// First string literal in the arguments, unescaped
    pub fn first_literal(&self) -> Option<String> {
        first_string_literal(&self.args)
    }

    /// `key = value` pairs from the argument list
    pub fn named_args(&self) -> BTreeMap<String, String> {
        split_args(&self.args)
            .into_iter()
            .filter_map(|arg| {
                let (key, value) = arg.split_once('=')?;
                Some((key.trim().to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub params: Vec<String>,
    pub body: String,
    pub annotations: Vec<Annotation>,
    pub is_public: bool,
    pub is_constructor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub annotations: Vec<Annotation>,
    /// Declaration without annotations, e.g. `private WebElement username`
    pub declaration: String,
}

impl Field {
    /// Declared name: the identifier before `=` or at the end
    pub fn name(&self) -> Option<String> {
        let decl = self
            .declaration
            .split_once('=')
            .map(|(lhs, _)| lhs)
            .unwrap_or(&self.declaration);
        decl.split_whitespace()
            .last()
            .map(|s| s.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_')).to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn initializer(&self) -> Option<&str> {
        self.declaration.split_once('=').map(|(_, rhs)| rhs.trim())
    }

    pub fn type_name(&self) -> Option<String> {
        let decl = self
            .declaration
            .split_once('=')
            .map(|(lhs, _)| lhs)
            .unwrap_or(&self.declaration);
        let words: Vec<&str> = decl.split_whitespace().collect();
        if words.len() >= 2 {
            Some(words[words.len() - 2].to_string())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Field(Field),
    Method(Method),
}

/// A parsed top-level type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassOutline {
    pub name: Option<String>,
    pub members: Vec<Member>,
}

impl ClassOutline {
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(method) => Some(method),
            Member::Field(_) => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(field) => Some(field),
            Member::Method(_) => None,
        })
    }
}

/// One step-definition method and everything extracted from its body
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedStep {
    pub kind: StepKind,
    pub pattern: String,
    pub method_name: String,
    pub params: Vec<String>,
    pub actions: Vec<Action>,
}

impl ExtractedStep {
    pub fn interactions(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Interaction { .. }))
    }

    pub fn page_calls(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::PageCall { .. }))
    }

    pub fn assertions(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Assertion { .. }))
    }
}

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "synchronized", "try", "do", "else", "return", "new",
];

pub fn is_control_keyword(word: &str) -> bool {
    CONTROL_KEYWORDS.contains(&word)
}

fn class_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:class|enum|interface|record)\s+([A-Za-z_]\w*)").expect("class regex")
    })
}

fn literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("literal regex"))
}

/// First `"..."` literal in `text`, unescaped
pub fn first_string_literal(text: &str) -> Option<String> {
    literal_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| unescape_java(m.as_str()))
}

/// Parse the first top-level type in `source`. Sources without a type
/// declaration are treated as a bare class body.
pub fn outline(source: &str) -> Result<ClassOutline, ExtractError> {
    let declared = class_regex().captures(source).and_then(|caps| {
        let name = caps.get(1)?;
        let open = find_code_byte(source, name.end(), b'{')?;
        Some((name.as_str().to_string(), open))
    });

    let (name, body) = match declared {
        Some((name, open)) => {
            let (body, _) = scan_block(source, open)
                .ok_or_else(|| ExtractError::UnterminatedBlock(format!("class {}", name)))?;
            (Some(name), body)
        }
        None => (None, source),
    };

    let members = members(body, name.as_deref())?;
    Ok(ClassOutline { name, members })
}

fn members(body: &str, class_name: Option<&str>) -> Result<Vec<Member>, ExtractError> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some(idx) = find_code_any(body, pos, b";{") {
        let stripped = strip_comments(&body[pos..idx]);
        let header = stripped.trim();
        if body.as_bytes()[idx] == b';' {
            if !header.is_empty() {
                let (annotations, rest) = split_annotations(header)?;
                if !rest.starts_with("import ") && !rest.starts_with("package ") {
                    out.push(Member::Field(Field {
                        annotations,
                        declaration: rest,
                    }));
                }
            }
            pos = idx + 1;
            continue;
        }

        let (block, end) = scan_block(body, idx)
            .ok_or_else(|| ExtractError::UnterminatedBlock(truncate(header, 60)))?;
        let (annotations, rest) = split_annotations(header)?;
        if let Some(method) = method_from_header(&rest, block, annotations, class_name) {
            out.push(Member::Method(method));
        }
        pos = end + 1;
    }
    Ok(out)
}

fn method_from_header(
    header: &str,
    body: &str,
    annotations: Vec<Annotation>,
    class_name: Option<&str>,
) -> Option<Method> {
    if header.contains('=') || header.contains("class ") || header.contains("interface ") {
        return None;
    }
    let open = find_code_byte(header, 0, b'(')?;
    let (params, _) = scan_delimited(header, open, b'(', b')')?;
    let before = header[..open].trim_end();
    let name_start = before
        .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let name = &before[name_start..];
    if name.is_empty() || CONTROL_KEYWORDS.contains(&name) {
        return None;
    }
    let modifiers = &before[..name_start];
    Some(Method {
        name: name.to_string(),
        params: parameter_names(params),
        body: body.to_string(),
        annotations,
        is_public: modifiers.split_whitespace().any(|w| w == "public"),
        is_constructor: class_name == Some(name),
    })
}

/// Names of declared parameters: the last identifier of each declaration.
pub fn parameter_names(params: &str) -> Vec<String> {
    split_args(params)
        .into_iter()
        .filter_map(|param| {
            let (_, rest) = split_annotations(&param).ok()?;
            rest.split_whitespace()
                .last()
                .map(|s| s.trim_start_matches("...").to_string())
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// Separate leading `@Annotation(...)` items from a header.
pub fn split_annotations(header: &str) -> Result<(Vec<Annotation>, String), ExtractError> {
    let mut annotations = Vec::new();
    let mut rest = String::new();
    let bytes = header.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            // Copy literals verbatim so '@' inside strings is ignored
            let end = literal_end(header, i);
            rest.push_str(&header[i..end]);
            i = end;
            continue;
        }
        if bytes[i] != b'@' {
            let width = header[i..].chars().next().map(char::len_utf8).unwrap_or(1);
            rest.push_str(&header[i..i + width]);
            i += width;
            continue;
        }
        let name_end = header[i + 1..]
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .map(|n| i + 1 + n)
            .unwrap_or(header.len());
        let full_name = &header[i + 1..name_end];
        let name = full_name.rsplit('.').next().unwrap_or(full_name).to_string();
        let after = header[name_end..].trim_start();
        let gap = header.len() - name_end - after.len();
        if after.starts_with('(') {
            let open = name_end + gap;
            let (args, close) = scan_delimited(header, open, b'(', b')')
                .ok_or_else(|| ExtractError::UnterminatedAnnotation(name.clone()))?;
            annotations.push(Annotation {
                name,
                args: args.trim().to_string(),
            });
            i = close + 1;
        } else {
            annotations.push(Annotation {
                name,
                args: String::new(),
            });
            i = name_end;
        }
    }
    let rest = rest.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok((annotations, rest))
}

fn literal_end(text: &str, start: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    text.len()
}

fn truncate(text: &str, max: usize) -> String {
    let one_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match one_line.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &one_line[..idx]),
        None => one_line,
    }
}

/// Step-definition methods with their extracted bodies.
///
/// A method carrying several step annotations yields one step per annotation.
pub fn extract_steps(source: &str) -> Result<Vec<ExtractedStep>, ExtractError> {
    let outline = outline(source)?;
    let elements = element_names(&outline);
    let mut steps = Vec::new();
    for method in outline.methods() {
        for annotation in &method.annotations {
            let Some(kind) = StepKind::parse(&annotation.name) else {
                continue;
            };
            let Some(pattern) = annotation.first_literal() else {
                continue;
            };
            steps.push(ExtractedStep {
                kind,
                pattern,
                method_name: method.name.clone(),
                params: method.params.clone(),
                actions: extract_actions(&method.body, &elements),
            });
        }
    }
    Ok(steps)
}

/// Whether any step annotation appears in the source.
pub fn has_step_annotations(source: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(?:Given|When|Then|And|But)\s*\(").expect("step regex"))
        .is_match(source)
}

/// A located UI element declared on a page object or locator class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    pub name: String,
    pub locator: Locator,
}

/// Elements declared with `@FindBy`, `By` fields or locator string constants.
pub fn element_declarations(outline: &ClassOutline) -> Vec<ElementDecl> {
    let mut out = Vec::new();
    for field in outline.fields() {
        let Some(name) = field.name() else { continue };
        if let Some(find_by) = field
            .annotations
            .iter()
            .find(|a| a.name == "FindBy" || a.name == "AndroidFindBy" || a.name == "iOSXCUITFindBy")
        {
            if let Some(locator) = locator_from_find_by(find_by) {
                out.push(ElementDecl { name, locator });
            }
            continue;
        }
        let Some(init) = field.initializer() else { continue };
        if let Some(ElementRef::By(locator)) = super::actions::parse_element(init) {
            out.push(ElementDecl { name, locator });
        }
    }
    out
}

/// Name -> locator map used to resolve `field.click()` style calls
pub fn element_names(outline: &ClassOutline) -> BTreeMap<String, Locator> {
    element_declarations(outline)
        .into_iter()
        .map(|decl| (decl.name, decl.locator))
        .collect()
}

fn locator_from_find_by(annotation: &Annotation) -> Option<Locator> {
    let args = annotation.named_args();
    if let (Some(how), Some(using)) = (args.get("how"), args.get("using")) {
        let how = how.rsplit('.').next().unwrap_or(how);
        let strategy = match how {
            "ID" | "ID_OR_NAME" => "id",
            "NAME" => "name",
            "XPATH" => "xpath",
            "CSS" => "css",
            "CLASS_NAME" => "className",
            "LINK_TEXT" => "linkText",
            "PARTIAL_LINK_TEXT" => "partialLinkText",
            "TAG_NAME" => "tagName",
            other => other,
        };
        return Some(Locator::new(strategy, first_string_literal(using)?));
    }
    for (key, value) in &args {
        if key == "how" || key == "using" {
            continue;
        }
        if let Some(literal) = first_string_literal(value) {
            return Some(Locator::new(key, literal));
        }
    }
    None
}

/// Method names found with a loose signature scan; used for placeholders
/// when structured extraction fails.
pub fn raw_method_names(source: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?m)(?:public|private|protected|void|static)[\w<>\[\],\s]*?\s([a-zA-Z_]\w*)\s*\([^;{]*\)\s*(?:throws[\w.,\s]+)?\{")
            .expect("method regex")
    });
    let mut names: Vec<String> = Vec::new();
    for caps in re.captures_iter(source) {
        if let Some(name) = caps.get(1) {
            let name = name.as_str().to_string();
            if !CONTROL_KEYWORDS.contains(&name.as_str()) && !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS: &str = r#"
package com.acme.steps;

import io.cucumber.java.en.*;

public class LoginSteps {
    private LoginPage loginPage = new LoginPage(driver);

    @Given("user is on login page")
    public void userIsOnLoginPage() {
        driver.get("https://example.com/login");
    }

    @When("user enters {string} and {string}")
    public void userEnters(String username, String password) {
        loginPage.enterCredentials(username, password);
    }

    @Then("^user should see \"([^\"]*)\"$")
    public void userShouldSee(final String message) {
        if (message != null) {
            Assert.assertEquals(message, loginPage.banner());
        }
    }
}
"#;

    #[test]
    fn test_extracts_each_step() {
        let steps = extract_steps(STEPS).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].kind, StepKind::Given);
        assert_eq!(steps[0].pattern, "user is on login page");
        assert_eq!(steps[1].params, vec!["username", "password"]);
        assert_eq!(steps[2].pattern, r#"^user should see "([^"]*)"$"#);
        assert_eq!(steps[2].params, vec!["message"]);
    }

    #[test]
    fn test_actions_keep_kind_views() {
        let steps = extract_steps(STEPS).unwrap();
        assert_eq!(steps[1].page_calls().count(), 1);
        assert_eq!(steps[2].assertions().count(), 1);
        assert_eq!(steps[0].interactions().count(), 0);
    }

    #[test]
    fn test_bare_snippet_without_class() {
        let steps = extract_steps(r#"@Given("user is on login page") method() { navigate("url"); }"#).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].method_name, "method");
    }

    #[test]
    fn test_stacked_annotations() {
        let src = r#"class S { @Given("a thing") @And("another thing") public void both() { } }"#;
        let steps = extract_steps(src).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].kind, StepKind::And);
    }

    #[test]
    fn test_comments_around_steps_keep_every_method() {
        let src = r#"
public class LoginSteps {
    // Opens the login page
    @Given("user is on login page")
    public void open() {
        navigate("url");
    } // open

    /** Credentials come from the feature table */
    @When("user logs in")
    public void logIn() {
        loginPage.submit();
    } // submit
    @Then("user sees {string}")
    public void sees(String banner) { }
}
"#;
        let steps = extract_steps(src).unwrap();
        let patterns: Vec<&str> = steps.iter().map(|s| s.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["user is on login page", "user logs in", "user sees {string}"]);
        assert_eq!(steps[2].params, vec!["banner"]);
    }

    #[test]
    fn test_commented_out_annotation_is_ignored() {
        let src = r#"class S {
    // @When("x")
    @When("b") public void b() { click(); }
}"#;
        let steps = extract_steps(src).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].pattern, "b");
        assert_eq!(steps[0].method_name, "b");
    }

    #[test]
    fn test_comment_above_page_object_method() {
        let src = "public class P {\n    // submits the form\n    public void submit() { button.click(); }\n}";
        let outline = outline(src).unwrap();
        let names: Vec<&str> = outline.methods().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["submit"]);
    }

    #[test]
    fn test_unterminated_method_is_an_error() {
        let err = extract_steps(r#"@Given("x") void m() { a();"#).unwrap_err();
        assert!(matches!(err, ExtractError::UnterminatedBlock(_)));
    }

    #[test]
    fn test_page_object_elements() {
        let src = r#"
public class LoginPage {
    @FindBy(id = "username")
    private WebElement usernameField;

    @FindBy(how = How.XPATH, using = "//button[@type='submit']")
    private WebElement loginButton;

    private By banner = By.cssSelector(".banner");

    public LoginPage(WebDriver driver) { this.driver = driver; }

    public void enterUsername(String name) { usernameField.sendKeys(name); }
}
"#;
        let outline = outline(src).unwrap();
        let elements = element_declarations(&outline);
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].name, "usernameField");
        assert_eq!(elements[0].locator, Locator::new("id", "username"));
        assert_eq!(elements[1].locator, Locator::new("xpath", "//button[@type='submit']"));
        assert_eq!(elements[2].locator, Locator::new("cssSelector", ".banner"));

        let methods: Vec<&Method> = outline.methods().collect();
        assert!(methods[0].is_constructor);
        assert_eq!(methods[1].name, "enterUsername");
        assert!(methods[1].is_public);
    }

    #[test]
    fn test_raw_method_names() {
        let names = raw_method_names("public class A { public void a() { if (x) { } } private int b(int x) { return 1; } }");
        assert_eq!(names, vec!["a", "b"]);
    }
}
