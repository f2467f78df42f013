//! Statement-level action extraction
//!
//! Method bodies are split into statements and each statement is read as a
//! call chain (`driver.findElement(By.id("x")).click()`). Chains are then
//! matched against the interaction, navigation, wait, assertion and
//! page-object shapes. Anything else is kept as an unmapped action so it
//! surfaces as a TODO instead of disappearing.

use super::scanner::{scan_delimited, split_args, split_statements};
use super::naming::unescape_java;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Locator strategy and value as written in the source (`id`, `cssSelector`, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub strategy: String,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementRef {
    /// Inline locator
    By(Locator),
    /// Declared element, rendered as a variable reference
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectBy {
    Label,
    Value,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    Click,
    Fill,
    Clear,
    GetText,
    IsDisplayed,
    IsEnabled,
    Submit,
    GetAttribute,
    Select(SelectBy),
    Other(String),
}

impl ElementAction {
    fn from_method(method: &str) -> Option<Self> {
        let action = match method {
            "click" => ElementAction::Click,
            "sendKeys" => ElementAction::Fill,
            "clear" => ElementAction::Clear,
            "getText" => ElementAction::GetText,
            "isDisplayed" => ElementAction::IsDisplayed,
            "isEnabled" => ElementAction::IsEnabled,
            "submit" => ElementAction::Submit,
            "getAttribute" | "getDomAttribute" => ElementAction::GetAttribute,
            "selectByVisibleText" => ElementAction::Select(SelectBy::Label),
            "selectByValue" => ElementAction::Select(SelectBy::Value),
            "selectByIndex" => ElementAction::Select(SelectBy::Index),
            _ => return None,
        };
        Some(action)
    }

    /// Actions whose result can be bound to a variable
    pub fn returns_value(&self) -> bool {
        matches!(
            self,
            ElementAction::GetText
                | ElementAction::IsDisplayed
                | ElementAction::IsEnabled
                | ElementAction::GetAttribute
        )
    }
}

/// Element methods that mark an unknown receiver as a UI element
const COMMON_ELEMENT_METHODS: &[&str] = &[
    "click",
    "sendKeys",
    "clear",
    "getText",
    "isDisplayed",
    "isEnabled",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Visible,
    NotVisible,
    Clickable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserCall {
    Back,
    Refresh,
    Maximize,
    Close,
    Title,
    CurrentUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    Equals,
    True,
    False,
    NotNull,
    Null,
    NotEquals,
}

impl AssertionKind {
    fn from_junit(name: &str) -> Option<Self> {
        match name {
            "assertEquals" => Some(AssertionKind::Equals),
            "assertTrue" => Some(AssertionKind::True),
            "assertFalse" => Some(AssertionKind::False),
            "assertNotNull" => Some(AssertionKind::NotNull),
            "assertNull" => Some(AssertionKind::Null),
            "assertNotEquals" => Some(AssertionKind::NotEquals),
            _ => None,
        }
    }

    fn from_fluent(name: &str) -> Option<Self> {
        match name {
            "isEqualTo" => Some(AssertionKind::Equals),
            "isTrue" => Some(AssertionKind::True),
            "isFalse" => Some(AssertionKind::False),
            "isNotNull" => Some(AssertionKind::NotNull),
            "isNull" => Some(AssertionKind::Null),
            "isNotEqualTo" => Some(AssertionKind::NotEquals),
            _ => None,
        }
    }

    /// Number of value arguments, message excluded
    fn arity(&self) -> usize {
        match self {
            AssertionKind::Equals | AssertionKind::NotEquals => 2,
            _ => 1,
        }
    }
}

/// One extracted action, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Interaction {
        element: ElementRef,
        action: ElementAction,
        args: Vec<String>,
        bind: Option<String>,
    },
    Navigate {
        url: String,
    },
    Browser {
        call: BrowserCall,
        bind: Option<String>,
    },
    WaitFor {
        kind: WaitKind,
        element: ElementRef,
    },
    Sleep {
        millis: String,
    },
    PageCall {
        object: String,
        method: String,
        args: Vec<String>,
        bind: Option<String>,
    },
    Assertion {
        kind: AssertionKind,
        args: Vec<String>,
    },
    Log {
        message: String,
    },
    Assign {
        name: String,
        value: String,
    },
    Return {
        value: String,
    },
    Unmapped {
        statement: String,
    },
}

impl Action {
    fn bound(&self) -> bool {
        match self {
            Action::Interaction { bind, .. }
            | Action::Browser { bind, .. }
            | Action::PageCall { bind, .. } => bind.is_some(),
            _ => false,
        }
    }
}

/// One link of a call chain: `name` or `name(args)`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    args: Option<Vec<String>>,
}

impl Segment {
    fn is_call(&self, name: &str) -> bool {
        self.name == name && self.args.is_some()
    }

    fn args(&self) -> &[String] {
        self.args.as_deref().unwrap_or(&[])
    }
}

/// Parse `a.b(x).c()` into segments; `None` when the text is not a pure chain.
fn call_chain(expr: &str) -> Option<Vec<Segment>> {
    let bytes = expr.as_bytes();
    let mut segments = Vec::new();
    let mut i = 0usize;
    let skip_ws = |i: &mut usize| {
        while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
            *i += 1;
        }
    };
    let read_ident = |i: &mut usize| -> String {
        let start = *i;
        while *i < bytes.len() && (bytes[*i].is_ascii_alphanumeric() || bytes[*i] == b'_' || bytes[*i] == b'$') {
            *i += 1;
        }
        expr[start..*i].to_string()
    };

    loop {
        skip_ws(&mut i);
        let mut name = read_ident(&mut i);
        if name.is_empty() {
            return None;
        }
        if name == "new" {
            skip_ws(&mut i);
            let type_name = read_ident(&mut i);
            if type_name.is_empty() {
                return None;
            }
            name = format!("new {}", type_name);
        }
        skip_ws(&mut i);
        let args = if bytes.get(i) == Some(&b'(') {
            let (inner, close) = scan_delimited(expr, i, b'(', b')')?;
            i = close + 1;
            Some(split_args(inner))
        } else {
            None
        };
        segments.push(Segment { name, args });
        skip_ws(&mut i);
        if i >= bytes.len() {
            break;
        }
        if bytes[i] != b'.' {
            return None;
        }
        i += 1;
    }

    while segments.len() > 1 && segments[0].name == "this" && segments[0].args.is_none() {
        segments.remove(0);
    }
    Some(segments)
}

fn is_driver(segment: &Segment) -> bool {
    let lower = segment.name.to_lowercase();
    lower == "driver" || lower == "webdriver" || lower == "getdriver"
}

fn is_string_literal(expr: &str) -> bool {
    let t = expr.trim();
    t.len() >= 2 && t.starts_with('"') && t.ends_with('"')
}

/// `By.id("x")` or `driver.findElement(By.id("x"))` as an element reference.
pub fn parse_element(expr: &str) -> Option<ElementRef> {
    let segments = call_chain(expr.trim())?;
    element_from_segments(&segments)
}

fn element_from_segments(segments: &[Segment]) -> Option<ElementRef> {
    match segments {
        [by, strategy] if by.name == "By" && strategy.args().len() == 1 => {
            let literal = strategy.args()[0].trim();
            if !is_string_literal(literal) {
                return None;
            }
            Some(ElementRef::By(Locator::new(
                strategy.name.clone(),
                unescape_java(&literal[1..literal.len() - 1]),
            )))
        }
        [.., find] if find.is_call("findElement") && find.args().len() == 1 => {
            parse_element(&find.args()[0])
        }
        _ => None,
    }
}

/// Per-body resolution scope
struct Scope<'a> {
    elements: &'a BTreeMap<String, Locator>,
    locals: BTreeMap<String, ElementRef>,
    selects: BTreeMap<String, ElementRef>,
}

impl Scope<'_> {
    fn resolve(&self, expr: &str) -> Option<ElementRef> {
        if let Some(element) = parse_element(expr) {
            return Some(element);
        }
        let name = expr.trim().trim_start_matches("this.");
        if let Some(local) = self.locals.get(name) {
            return Some(local.clone());
        }
        if self.elements.contains_key(name) {
            return Some(ElementRef::Named(name.to_string()));
        }
        None
    }
}

fn binding_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^(?:final\s+)?(?:[A-Za-z_][\w.]*(?:<.*?>)?(?:\[\])?\s+)?([A-Za-z_]\w*)\s*=\s*(.+)$")
            .expect("binding regex")
    })
}

/// Extract every action from a method body, preserving source order.
///
/// `elements` maps declared element names (page-object fields) to locators.
pub fn extract_actions(body: &str, elements: &BTreeMap<String, Locator>) -> Vec<Action> {
    let mut scope = Scope {
        elements,
        locals: BTreeMap::new(),
        selects: BTreeMap::new(),
    };
    let mut actions = Vec::new();
    for (_, statement) in split_statements(body) {
        actions.extend(statement_actions(&statement, &mut scope));
    }
    actions
}

fn statement_actions(statement: &str, scope: &mut Scope<'_>) -> Vec<Action> {
    let statement = statement.trim();
    if statement.is_empty() || statement == "return" || statement == "return this" {
        return Vec::new();
    }

    if let Some(expr) = statement.strip_prefix("return ") {
        let expr = expr.trim();
        if call_chain(expr).is_some_and(|segments| segments.iter().any(|s| s.args.is_some())) {
            let mut actions = classify(expr, Some("result".to_string()), scope);
            if actions.last().is_some_and(Action::bound) {
                actions.push(Action::Return {
                    value: "${result}".to_string(),
                });
            }
            return actions;
        }
        return vec![Action::Return {
            value: expr.to_string(),
        }];
    }

    if let Some(caps) = binding_regex().captures(statement) {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let rhs = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        if !rhs.starts_with('=') && !name.is_empty() {
            return bound_actions(statement, name, rhs, scope);
        }
    }

    classify(statement, None, scope)
}

fn bound_actions(statement: &str, name: &str, rhs: &str, scope: &mut Scope<'_>) -> Vec<Action> {
    if let Some(element) = parse_element(rhs) {
        scope.locals.insert(name.to_string(), element);
        return Vec::new();
    }
    let Some(segments) = call_chain(rhs) else {
        return vec![Action::Assign {
            name: name.to_string(),
            value: rhs.to_string(),
        }];
    };
    if let [constructor] = segments.as_slice() {
        if constructor.name == "new Select" && constructor.args().len() == 1 {
            if let Some(element) = scope.resolve(&constructor.args()[0]) {
                scope.selects.insert(name.to_string(), element);
                return Vec::new();
            }
        }
        if constructor.name.starts_with("new ") {
            // Object wiring (page objects, waits) has no keyword equivalent
            return Vec::new();
        }
    }
    if segments.iter().all(|s| s.args.is_none()) {
        return vec![Action::Assign {
            name: name.to_string(),
            value: rhs.to_string(),
        }];
    }
    let actions = classify(rhs, Some(name.to_string()), scope);
    if actions.iter().all(|a| matches!(a, Action::Unmapped { .. })) {
        return vec![Action::Unmapped {
            statement: statement.to_string(),
        }];
    }
    actions
}

fn unmapped(statement: &str) -> Vec<Action> {
    vec![Action::Unmapped {
        statement: statement.to_string(),
    }]
}

fn classify(expr: &str, bind: Option<String>, scope: &Scope<'_>) -> Vec<Action> {
    let Some(segments) = call_chain(expr) else {
        return unmapped(expr);
    };

    if let Some(action) = sleep(&segments)
        .or_else(|| navigation(&segments, bind.clone()))
        .or_else(|| wait(&segments, scope))
        .or_else(|| assertion(&segments))
        .or_else(|| interaction(&segments, bind.clone(), scope))
        .or_else(|| log(&segments))
    {
        return vec![action];
    }

    page_calls(&segments, bind).unwrap_or_else(|| unmapped(expr))
}

fn sleep(segments: &[Segment]) -> Option<Action> {
    match segments {
        [thread, sleep] if thread.name == "Thread" && sleep.is_call("sleep") => Some(Action::Sleep {
            millis: sleep.args().first()?.clone(),
        }),
        _ => None,
    }
}

fn navigation(segments: &[Segment], bind: Option<String>) -> Option<Action> {
    if let Some(pos) = segments.iter().position(|s| s.is_call("navigate") && s.args().is_empty()) {
        let next = segments.get(pos + 1)?;
        return match next.name.as_str() {
            "to" => Some(Action::Navigate {
                url: next.args().first()?.clone(),
            }),
            "back" => Some(Action::Browser {
                call: BrowserCall::Back,
                bind: None,
            }),
            "refresh" => Some(Action::Browser {
                call: BrowserCall::Refresh,
                bind: None,
            }),
            _ => None,
        };
    }

    match segments {
        [driver, get] if is_driver(driver) && get.is_call("get") && get.args().len() == 1 => {
            Some(Action::Navigate {
                url: get.args()[0].clone(),
            })
        }
        [driver, call] if is_driver(driver) && call.args().is_empty() && call.args.is_some() => {
            let call = match call.name.as_str() {
                "quit" | "close" => BrowserCall::Close,
                "getTitle" => BrowserCall::Title,
                "getCurrentUrl" => BrowserCall::CurrentUrl,
                _ => return None,
            };
            Some(Action::Browser { call, bind })
        }
        [driver, manage, window, maximize]
            if is_driver(driver)
                && manage.is_call("manage")
                && window.is_call("window")
                && maximize.is_call("maximize") =>
        {
            Some(Action::Browser {
                call: BrowserCall::Maximize,
                bind: None,
            })
        }
        [call] if call.args().len() == 1
            && matches!(
                call.name.as_str(),
                "navigate" | "navigateTo" | "goTo" | "open" | "openUrl" | "visit"
            ) =>
        {
            Some(Action::Navigate {
                url: call.args()[0].clone(),
            })
        }
        _ => None,
    }
}

fn wait(segments: &[Segment], scope: &Scope<'_>) -> Option<Action> {
    let until = segments.iter().find(|s| s.is_call("until"))?;
    let condition = call_chain(until.args().first()?)?;
    let last = condition.last()?;
    let kind = match last.name.as_str() {
        "visibilityOfElementLocated" | "visibilityOf" | "presenceOfElementLocated" => WaitKind::Visible,
        "invisibilityOfElementLocated" | "invisibilityOf" => WaitKind::NotVisible,
        "elementToBeClickable" => WaitKind::Clickable,
        _ => return None,
    };
    let element = scope.resolve(last.args().first()?)?;
    Some(Action::WaitFor { kind, element })
}

/// Drop a leading or trailing message literal beyond the assertion's arity.
fn assertion_args(kind: AssertionKind, args: &[String]) -> Vec<String> {
    let arity = kind.arity();
    if args.len() <= arity {
        return args.to_vec();
    }
    if is_string_literal(&args[0]) {
        args[args.len() - arity..].to_vec()
    } else {
        args[..arity].to_vec()
    }
}

fn assertion(segments: &[Segment]) -> Option<Action> {
    let last = segments.last()?;
    if let Some(kind) = AssertionKind::from_junit(&last.name) {
        if last.args.is_some() {
            return Some(Action::Assertion {
                kind,
                args: assertion_args(kind, last.args()),
            });
        }
    }

    let that = segments.iter().position(|s| s.is_call("assertThat"))?;
    let subject = segments[that].args();
    if let Some(check) = segments.get(that + 1) {
        let kind = AssertionKind::from_fluent(&check.name)?;
        let mut args = vec![subject.first()?.clone()];
        args.extend(check.args().iter().cloned());
        return Some(Action::Assertion { kind, args });
    }

    // Hamcrest: assertThat([reason,] actual, matcher)
    let (actual, matcher) = match subject {
        [actual, matcher] => (actual, matcher),
        [_, actual, matcher] => (actual, matcher),
        _ => return None,
    };
    let matcher = call_chain(matcher)?;
    let [outer] = matcher.as_slice() else {
        return None;
    };
    let expected = outer.args().first()?.clone();
    let kind = match outer.name.as_str() {
        "is" | "equalTo" => {
            if let Some(inner) = call_chain(&expected).and_then(|c| c.into_iter().next()) {
                if inner.name == "not" || inner.name == "equalTo" {
                    let value = inner.args().first()?.clone();
                    let kind = if inner.name == "not" {
                        AssertionKind::NotEquals
                    } else {
                        AssertionKind::Equals
                    };
                    return Some(Action::Assertion {
                        kind,
                        args: vec![actual.clone(), value],
                    });
                }
            }
            AssertionKind::Equals
        }
        "not" => AssertionKind::NotEquals,
        _ => return None,
    };
    Some(Action::Assertion {
        kind,
        args: vec![actual.clone(), expected],
    })
}

fn interaction(segments: &[Segment], bind: Option<String>, scope: &Scope<'_>) -> Option<Action> {
    let last = segments.last()?;
    last.args.as_ref()?;
    let action = ElementAction::from_method(&last.name);
    let receiver = &segments[..segments.len() - 1];

    // new Select(element).selectBy...(x) / select.selectBy...(x)
    if let Some(ElementAction::Select(_)) = action {
        let element = match receiver {
            [constructor] if constructor.name == "new Select" => {
                scope.resolve(constructor.args().first()?)?
            }
            [local] if local.args.is_none() => scope.selects.get(&local.name)?.clone(),
            _ => return None,
        };
        return Some(Action::Interaction {
            element,
            action: action?,
            args: last.args().to_vec(),
            bind: None,
        });
    }

    let element = if let Some(find) = receiver.last().filter(|s| s.is_call("findElement")) {
        match element_from_segments(receiver) {
            Some(element) => element,
            // driver.findElement(loginButton) with a declared `By` field
            None => scope.resolve(find.args().first()?)?,
        }
    } else {
        match receiver {
            [named] if named.args.is_none() => match scope.resolve(&named.name) {
                Some(element) => element,
                None if !is_driver(named)
                    && COMMON_ELEMENT_METHODS.contains(&last.name.as_str()) =>
                {
                    ElementRef::Named(named.name.clone())
                }
                None => return None,
            },
            _ => return None,
        }
    };

    let action = action.unwrap_or_else(|| ElementAction::Other(last.name.clone()));
    let bind = bind.filter(|_| action.returns_value());
    Some(Action::Interaction {
        element,
        action,
        args: last.args().to_vec(),
        bind,
    })
}

fn log(segments: &[Segment]) -> Option<Action> {
    let last = segments.last()?;
    let message = last.args().first()?.clone();
    let is_print = matches!(segments, [system, out, _] if system.name == "System" && (out.name == "out" || out.name == "err"))
        && (last.name == "println" || last.name == "print");
    let is_logger = segments.len() == 2
        && matches!(segments[0].name.to_lowercase().as_str(), "log" | "logger")
        && matches!(last.name.as_str(), "info" | "debug" | "warn" | "error" | "trace");
    (is_print || is_logger).then_some(Action::Log { message })
}

const NON_PAGE_RECEIVERS: &[&str] = &[
    "System", "Assert", "Assertions", "Thread", "String", "Math", "Integer", "Objects", "Arrays",
    "Collections", "By",
];

fn page_calls(segments: &[Segment], bind: Option<String>) -> Option<Vec<Action>> {
    let (object, calls) = match segments.first() {
        Some(first) if first.args.is_none() => {
            if is_driver(first) || NON_PAGE_RECEIVERS.contains(&first.name.as_str()) {
                return None;
            }
            (first.name.clone(), &segments[1..])
        }
        Some(_) => (String::new(), segments),
        None => return None,
    };
    if calls.is_empty() || calls.iter().any(|s| s.args.is_none() || is_driver(s)) {
        return None;
    }
    if calls.iter().any(|s| super::extract::is_control_keyword(&s.name)) {
        return None;
    }
    let last = calls.len() - 1;
    Some(
        calls
            .iter()
            .enumerate()
            .map(|(i, call)| Action::PageCall {
                object: object.clone(),
                method: call.name.clone(),
                args: call.args().to_vec(),
                bind: if i == last { bind.clone() } else { None },
            })
            .collect(),
    )
}
