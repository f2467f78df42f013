//! Keyword and variable naming
//!
//! Step patterns and Gherkin step text must produce the same keyword name so
//! generated suites resolve against generated step resources.

use regex::Regex;
use std::sync::OnceLock;

/// Keyword name derived from a step pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternName {
    pub name: String,
    /// Number of parameter placeholders found in the pattern
    pub placeholders: usize,
}

/// Keyword call derived from Gherkin step text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCall {
    pub name: String,
    pub args: Vec<String>,
}

struct Placeholder {
    pattern: &'static str,
    token: &'static str,
}

// Ordered: quoted regex groups before bare groups, typed expressions before `{}`.
const PLACEHOLDERS: &[Placeholder] = &[
    Placeholder { pattern: r#""\([^)]*\)""#, token: "text" },
    Placeholder { pattern: r"'\([^)]*\)'", token: "text" },
    Placeholder { pattern: r"\{string\}", token: "text" },
    Placeholder {
        pattern: r"\{(?:int|float|double|long|short|byte|biginteger|bigdecimal)\}",
        token: "number",
    },
    Placeholder { pattern: r"\{word\}", token: "word" },
    Placeholder { pattern: r"\{[^}]*\}", token: "value" },
    Placeholder { pattern: r"\((?:-\?)?(?:\\d|\[0-9\])[^)]*\)", token: "number" },
    Placeholder { pattern: r"\([^)]*\)", token: "value" },
];

fn placeholder_regexes() -> &'static [(Regex, &'static str)] {
    static CELL: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    CELL.get_or_init(|| {
        PLACEHOLDERS
            .iter()
            .filter_map(|p| Regex::new(p.pattern).ok().map(|re| (re, p.token)))
            .collect()
    })
}

/// Undo Java string-literal escapes (`\"`, `\\`, `\n`, `\t`, ...).
pub fn unescape_java(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn expression_parameter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\w*\}").expect("expression parameter regex"))
}

fn optional_text() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^(){}]*)\)").expect("optional text regex"))
}

fn alternation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z][\w-]*)(?:/[A-Za-z][\w-]*)+").expect("alternation regex"))
}

/// Cucumber expressions carry `{type}` parameters and no regex anchors.
fn is_cucumber_expression(pattern: &str) -> bool {
    !pattern.starts_with('^') && !pattern.ends_with('$') && expression_parameter().is_match(pattern)
}

/// Resolve expression-only syntax so it never reads as a parameter:
/// optional text is kept (`cucumber(s)` -> `cucumbers`) and an alternation
/// keeps its first option (`belly/stomach` -> `belly`).
fn normalize_expression(pattern: &str) -> String {
    let text = optional_text().replace_all(pattern, "$1");
    alternation().replace_all(&text, "$1").into_owned()
}

/// Keyword name for a step pattern: placeholders become semantic tokens,
/// anchors and quotes are dropped, words are title-cased.
pub fn keyword_name_from_pattern(pattern: &str) -> PatternName {
    let trimmed = pattern.trim();
    let mut text = if is_cucumber_expression(trimmed) {
        normalize_expression(trimmed)
    } else {
        trimmed.to_string()
    };
    let mut placeholders = 0usize;
    for (re, token) in placeholder_regexes() {
        let found = re.find_iter(&text).count();
        if found > 0 {
            placeholders += found;
            text = re.replace_all(&text, format!(" {} ", token)).into_owned();
        }
    }
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '"' && *c != '\'')
        .map(|c| match c {
            '^' | '$' | '\\' | '?' | '*' | '+' | '[' | ']' | '(' | ')' | '|' => ' ',
            other => other,
        })
        .collect();
    PatternName {
        name: title_case(&cleaned),
        placeholders,
    }
}

/// Keyword call for a Gherkin step: quoted strings and numbers become
/// arguments, everything else forms the name.
pub fn step_call(text: &str) -> StepCall {
    let mut words: Vec<String> = Vec::new();
    let mut args: Vec<String> = Vec::new();
    let mut chars = text.trim().chars();
    let mut word = String::new();

    let push_word = |word: &mut String, words: &mut Vec<String>, args: &mut Vec<String>| {
        if word.is_empty() {
            return;
        }
        if is_number(word) {
            args.push(word.clone());
            words.push("number".to_string());
        } else {
            words.push(word.clone());
        }
        word.clear();
    };

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                push_word(&mut word, &mut words, &mut args);
                let mut literal = String::new();
                for inner in chars.by_ref() {
                    if inner == '"' {
                        break;
                    }
                    literal.push(inner);
                }
                args.push(literal);
                words.push("text".to_string());
            }
            c if c.is_whitespace() => push_word(&mut word, &mut words, &mut args),
            c => word.push(c),
        }
    }
    push_word(&mut word, &mut words, &mut args);

    StepCall {
        name: title_case(&words.join(" ").replace('\'', "")),
        args,
    }
}

fn is_number(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().next().is_some_and(|c| c.is_ascii_digit())
        && digits.matches('.').count() <= 1
        && !digits.ends_with('.')
}

/// Collapse whitespace and upper-case the first letter of every word.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a camelCase / snake_case identifier into words.
pub fn split_identifier(ident: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = ident.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = ch.is_uppercase()
            && !current.is_empty()
            && (chars[i - 1].is_lowercase()
                || chars[i - 1].is_ascii_digit()
                || chars.get(i + 1).is_some_and(|n| n.is_lowercase()));
        if boundary {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `enterUsername` -> `Enter Username`
pub fn keyword_name_from_identifier(ident: &str) -> String {
    title_case(&split_identifier(ident).join(" "))
}

/// `usernameField` -> `USERNAME_FIELD`; already-constant names are kept.
pub fn constant_name(ident: &str) -> String {
    split_identifier(ident)
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Robot scalar variable reference for a name
pub fn scalar(name: &str) -> String {
    format!("${{{}}}", name)
}
