//! Action mapping tables
//!
//! Fixed lookups from extracted Selenium/JUnit actions to SeleniumLibrary and
//! BuiltIn keyword rows. Every row is returned as cells joined by the Robot
//! separator; anything without a mapping becomes a `# TODO` comment row.

use super::actions::{Action, AssertionKind, BrowserCall, ElementAction, ElementRef, Locator, SelectBy, WaitKind};
use super::naming::{constant_name, keyword_name_from_identifier, scalar, unescape_java};
use super::scanner::split_args;

/// Cell separator used in generated files
pub const SEP: &str = "    ";

/// Selenium `By` strategy -> SeleniumLibrary locator prefix
const LOCATOR_PREFIXES: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("xpath", "xpath"),
    ("cssSelector", "css"),
    ("css", "css"),
    ("className", "class"),
    ("linkText", "link"),
    ("partialLinkText", "partial link"),
    ("tagName", "tag"),
];

pub fn locator_prefix(strategy: &str) -> Option<&'static str> {
    LOCATOR_PREFIXES
        .iter()
        .find(|(source, _)| *source == strategy)
        .map(|(_, prefix)| *prefix)
}

/// `By.id("user")` -> `id:user`
pub fn render_locator(locator: &Locator) -> Option<String> {
    locator_prefix(&locator.strategy).map(|prefix| format!("{}:{}", prefix, locator.value))
}

/// Locator cell for an element reference; `None` for unknown strategies
pub fn element_cell(element: &ElementRef) -> Option<String> {
    match element {
        ElementRef::By(locator) => render_locator(locator).map(|l| escape_cell(&l)),
        ElementRef::Named(name) => Some(scalar(&constant_name(name))),
    }
}

/// A converted argument; `exact` is false when the source expression had
/// no direct Robot equivalent and was copied as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotArg {
    pub text: String,
    pub exact: bool,
}

impl RobotArg {
    fn exact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exact: true,
        }
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_numeric_literal(text: &str) -> bool {
    let trimmed = text.trim_end_matches(['L', 'l', 'f', 'F', 'd', 'D']);
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
}

/// Convert a Java argument expression to a Robot cell.
pub fn robot_arg(expr: &str) -> RobotArg {
    let expr = expr.trim();
    if expr.len() >= 2 && expr.starts_with('"') && expr.ends_with('"') && !has_top_level_plus(expr) {
        return RobotArg::exact(escape_cell(&unescape_java(&expr[1..expr.len() - 1])));
    }
    if has_top_level_plus(expr) {
        let parts: Vec<RobotArg> = split_concat(expr).iter().map(|p| robot_arg(p)).collect();
        let exact = parts.iter().all(|p| p.exact);
        let text: String = parts
            .into_iter()
            .map(|p| if p.text == "${EMPTY}" { String::new() } else { p.text })
            .collect();
        return RobotArg {
            text: if text.is_empty() { "${EMPTY}".to_string() } else { text },
            exact,
        };
    }
    match expr {
        "true" => return RobotArg::exact("${True}"),
        "false" => return RobotArg::exact("${False}"),
        "null" => return RobotArg::exact("${None}"),
        _ => {}
    }
    if is_numeric_literal(expr) {
        return RobotArg::exact(expr.trim_end_matches(['L', 'l', 'f', 'F', 'd', 'D']));
    }
    let name = expr.strip_prefix("this.").unwrap_or(expr);
    if is_identifier(name) {
        return RobotArg::exact(scalar(name));
    }
    // Class constants (`Config.BASE_URL`) become suite-level variables
    if let Some((_, last)) = name.rsplit_once('.') {
        if name.split('.').all(is_identifier) {
            if last.chars().all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '_') {
                return RobotArg::exact(scalar(last));
            }
            return RobotArg::exact(scalar(name));
        }
    }
    RobotArg {
        text: escape_cell(&expr.split_whitespace().collect::<Vec<_>>().join(" ")),
        exact: false,
    }
}

fn has_top_level_plus(expr: &str) -> bool {
    split_concat(expr).len() > 1
}

fn split_concat(expr: &str) -> Vec<String> {
    // Reuse the argument splitter by turning top-level `+` into commas
    let mut rewritten = String::with_capacity(expr.len());
    let mut in_str = false;
    let mut escaped = false;
    let mut depth = 0i32;
    for ch in expr.chars() {
        if in_str {
            rewritten.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_str = true;
                rewritten.push(ch);
            }
            '(' => {
                depth += 1;
                rewritten.push(ch);
            }
            ')' => {
                depth -= 1;
                rewritten.push(ch);
            }
            '+' if depth == 0 => rewritten.push('\u{1f}'),
            ',' if depth == 0 => rewritten.push('\u{1e}'),
            _ => rewritten.push(ch),
        }
    }
    if rewritten.contains('\u{1e}') {
        return vec![expr.to_string()];
    }
    rewritten
        .split('\u{1f}')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Escape text so Robot reads it back as the same literal value.
pub fn escape_cell(text: &str) -> String {
    if text.is_empty() {
        return "${EMPTY}".to_string();
    }
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '#' if i == 0 => out.push_str("\\#"),
            '$' | '@' | '&' | '%' if chars.get(i + 1) == Some(&'{') => {
                out.push('\\');
                out.push(ch);
            }
            ' ' if i == 0 || i == chars.len() - 1 || chars.get(i + 1) == Some(&' ') => {
                out.push_str("${SPACE}")
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Join cells with the Robot separator.
pub fn row<S: AsRef<str>>(cells: &[S]) -> String {
    cells
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(SEP)
}

fn todo(text: &str) -> String {
    let single = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let short: String = single.chars().take(120).collect();
    format!("# TODO: {}", short)
}

fn assigned(bind: &Option<String>, mut cells: Vec<String>) -> Vec<String> {
    if let Some(name) = bind {
        cells.insert(0, format!("{}=", scalar(name)));
    }
    cells
}

/// Args converted to cells, with review comments for inexact conversions
fn convert_args(args: &[String], rows: &mut Vec<String>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let converted = robot_arg(arg);
            if !converted.exact {
                rows.push(todo(&format!("review expression '{}'", arg)));
            }
            converted.text
        })
        .collect()
}

/// Milliseconds expression -> Robot time string
pub fn sleep_time(millis: &str) -> String {
    let trimmed = millis.trim().trim_end_matches(['L', 'l']);
    match trimmed.parse::<u64>() {
        Ok(ms) if ms % 1000 == 0 => format!("{}s", ms / 1000),
        Ok(ms) => format!("{}ms", ms),
        Err(_) => format!("{}ms", robot_arg(trimmed).text),
    }
}

/// Map one action to keyword rows.
pub fn map_action(action: &Action) -> Vec<String> {
    let mut rows = Vec::new();
    match action {
        Action::Interaction {
            element,
            action,
            args,
            bind,
        } => {
            let Some(locator) = element_cell(element) else {
                rows.push(todo(&format!("unmapped locator strategy in {:?}", element)));
                return rows;
            };
            let args = convert_args(args, &mut rows);
            let first = args.first().cloned().unwrap_or_else(|| "${EMPTY}".to_string());
            let cells: Vec<String> = match action {
                ElementAction::Click => vec!["Click Element".into(), locator],
                ElementAction::Fill => vec!["Input Text".into(), locator, first],
                ElementAction::Clear => vec!["Clear Element Text".into(), locator],
                ElementAction::GetText => {
                    let bind = bind.clone().or_else(|| Some("text".to_string()));
                    assigned(&bind, vec!["Get Text".into(), locator])
                }
                ElementAction::IsDisplayed | ElementAction::IsEnabled => {
                    let check = if *action == ElementAction::IsDisplayed {
                        "Element Should Be Visible"
                    } else {
                        "Element Should Be Enabled"
                    };
                    match bind {
                        Some(_) => assigned(
                            bind,
                            vec!["Run Keyword And Return Status".into(), check.into(), locator],
                        ),
                        None => vec![check.into(), locator],
                    }
                }
                ElementAction::Submit => vec!["Submit Form".into()],
                ElementAction::GetAttribute => assigned(
                    bind,
                    vec!["Get Element Attribute".into(), locator, first],
                ),
                ElementAction::Select(by) => {
                    let keyword = match by {
                        SelectBy::Label => "Select From List By Label",
                        SelectBy::Value => "Select From List By Value",
                        SelectBy::Index => "Select From List By Index",
                    };
                    vec![keyword.into(), locator, first]
                }
                ElementAction::Other(method) => {
                    rows.push(todo(&format!("unmapped element action '{}' on {}", method, locator)));
                    return rows;
                }
            };
            rows.push(row(&cells));
        }
        Action::Navigate { url } => {
            let url = convert_args(std::slice::from_ref(url), &mut rows);
            rows.push(row(&["Go To", url[0].as_str()]));
        }
        Action::Browser { call, bind } => {
            let keyword = match call {
                BrowserCall::Back => "Go Back",
                BrowserCall::Refresh => "Reload Page",
                BrowserCall::Maximize => "Maximize Browser Window",
                BrowserCall::Close => "Close Browser",
                BrowserCall::Title => "Get Title",
                BrowserCall::CurrentUrl => "Get Location",
            };
            let bind = match call {
                BrowserCall::Title | BrowserCall::CurrentUrl => bind.clone(),
                _ => None,
            };
            rows.push(row(&assigned(&bind, vec![keyword.to_string()])));
        }
        Action::WaitFor { kind, element } => {
            let Some(locator) = element_cell(element) else {
                rows.push(todo(&format!("unmapped wait target {:?}", element)));
                return rows;
            };
            let keyword = match kind {
                WaitKind::Visible => "Wait Until Element Is Visible",
                WaitKind::NotVisible => "Wait Until Element Is Not Visible",
                WaitKind::Clickable => "Wait Until Element Is Enabled",
            };
            rows.push(row(&[keyword, locator.as_str(), "${TIMEOUT}"]));
        }
        Action::Sleep { millis } => rows.push(row(&["Sleep".to_string(), sleep_time(millis)])),
        Action::PageCall {
            object: _,
            method,
            args,
            bind,
        } => {
            let mut cells = vec![keyword_name_from_identifier(method)];
            cells.extend(convert_args(args, &mut rows));
            rows.push(row(&assigned(bind, cells)));
        }
        Action::Assertion { kind, args } => {
            let args = convert_args(args, &mut rows);
            let arg = |i: usize| args.get(i).cloned().unwrap_or_else(|| "${EMPTY}".to_string());
            let cells: Vec<String> = match kind {
                AssertionKind::Equals => vec!["Should Be Equal".into(), arg(0), arg(1)],
                AssertionKind::True => vec!["Should Be True".into(), arg(0)],
                AssertionKind::False => vec!["Should Not Be True".into(), arg(0)],
                AssertionKind::NotNull => vec!["Should Not Be Equal".into(), arg(0), "${None}".into()],
                AssertionKind::Null => vec!["Should Be Equal".into(), arg(0), "${None}".into()],
                AssertionKind::NotEquals => vec!["Should Not Be Equal".into(), arg(0), arg(1)],
            };
            rows.push(row(&cells));
        }
        Action::Log { message } => {
            let message = convert_args(std::slice::from_ref(message), &mut rows);
            rows.push(row(&["Log", message[0].as_str()]));
        }
        Action::Assign { name, value } => {
            let value = convert_args(std::slice::from_ref(value), &mut rows);
            rows.push(row(&[format!("{}=", scalar(name)), "Set Variable".to_string(), value[0].clone()]));
        }
        Action::Return { value } => {
            let value = if value.starts_with("${") {
                value.clone()
            } else {
                convert_args(std::slice::from_ref(value), &mut rows).remove(0)
            };
            rows.push(row(&["RETURN", value.as_str()]));
        }
        Action::Unmapped { statement } => rows.push(todo(&format!("unmapped statement: {}", statement))),
    }
    rows
}

/// Map a list of actions, keeping their order.
pub fn map_actions(actions: &[Action]) -> Vec<String> {
    actions.iter().flat_map(map_action).collect()
}

/// Argument cells for a list of Java argument expressions (used by callers
/// that build rows themselves).
pub fn arg_cells(args: &str) -> Vec<String> {
    split_args(args).iter().map(|a| robot_arg(a).text).collect()
}
