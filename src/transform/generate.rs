//! Robot Framework code generation
//!
//! [`RobotFile`] is the in-memory shape of one generated `.robot` or
//! `.resource` file. Step definitions become one keyword per annotation,
//! built from mapped actions, then from verb heuristics over the pattern
//! text, then from a log-only placeholder.

use super::extract::{element_declarations, outline, extract_steps, ExtractError, ExtractedStep};
use super::mapping::{escape_cell, map_actions, render_locator, row, SEP};
use super::naming::{constant_name, keyword_name_from_identifier, keyword_name_from_pattern, scalar, split_identifier};
use super::actions::Action;
use super::tiers::Marker;
use crate::model::{TransformMode, TransformStrategy};

/// Settings shared by every generator for one file
#[derive(Debug, Clone, Copy)]
pub struct GenContext<'a> {
    pub mode: TransformMode,
    pub library: &'a str,
    /// Path of the file being migrated; used for titles and documentation
    pub source_path: &'a str,
}

impl GenContext<'_> {
    pub fn marker(&self) -> Marker {
        Marker::new(self.mode, 1)
    }

    fn is_hybrid(&self) -> bool {
        self.mode == TransformMode::Hybrid
    }

    /// File stem of the source, used as a fallback title
    pub fn title(&self) -> String {
        let stem = crate::discovery::display_name(self.source_path);
        keyword_name_from_identifier(&stem)
    }
}

/// Second documentation line carried by every generated file
pub fn generated_note(mode: TransformMode, tier: u8) -> String {
    format!("Generated by robomigrate; mode={}, tier={}.", mode.label(), tier)
}

/// A keyword or test case
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub args: Vec<String>,
    pub documentation: Option<String>,
    pub tags: Vec<String>,
    pub body: Vec<String>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn render(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push('\n');
        if !self.args.is_empty() {
            out.push_str(SEP);
            out.push_str(&row(&[&["[Arguments]".to_string()], self.args.as_slice()].concat()));
            out.push('\n');
        }
        if let Some(doc) = &self.documentation {
            out.push_str(SEP);
            out.push_str(&row(&["[Documentation]", doc.as_str()]));
            out.push('\n');
        }
        if !self.tags.is_empty() {
            out.push_str(SEP);
            out.push_str(&row(&[&["[Tags]".to_string()], self.tags.as_slice()].concat()));
            out.push('\n');
        }
        let body: Vec<&String> = self.body.iter().filter(|l| !l.trim().is_empty()).collect();
        if body.is_empty() {
            out.push_str(SEP);
            out.push_str("No Operation\n");
        }
        for line in body {
            out.push_str(SEP);
            out.push_str(line);
            out.push('\n');
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Bare name, rendered as `${NAME}`
    pub name: String,
    pub value: String,
    pub comment: Option<String>,
}

/// One generated file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotFile {
    pub marker: Option<Marker>,
    /// Comment lines placed between the marker and the first section
    pub header: Vec<String>,
    pub documentation: Vec<String>,
    /// Settings rows after Documentation (`Library    SeleniumLibrary`, ...)
    pub settings: Vec<String>,
    pub variables: Vec<Variable>,
    pub test_cases: Vec<Block>,
    pub keywords: Vec<Block>,
}

impl RobotFile {
    /// Resource file skeleton: marker, documentation and library import.
    pub fn resource(ctx: &GenContext<'_>, title: impl Into<String>) -> Self {
        Self {
            marker: Some(ctx.marker()),
            documentation: vec![title.into(), generated_note(ctx.mode, 1)],
            settings: vec![row(&["Library", ctx.library])],
            ..Default::default()
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(marker) = &self.marker {
            out.push_str(&marker.render());
            out.push('\n');
        }
        for line in &self.header {
            out.push_str(line);
            out.push('\n');
        }

        out.push_str("*** Settings ***\n");
        let mut doc = self.documentation.iter();
        if let Some(first) = doc.next() {
            out.push_str(&row(&["Documentation", escape_doc(first).as_str()]));
            out.push('\n');
            for line in doc {
                out.push_str(&row(&["...", escape_doc(line).as_str()]));
                out.push('\n');
            }
        }
        for setting in &self.settings {
            out.push_str(setting);
            out.push('\n');
        }

        if !self.variables.is_empty() {
            out.push_str("\n*** Variables ***\n");
            for var in &self.variables {
                let mut line = row(&[scalar(&var.name), var.value.clone()]);
                if let Some(comment) = &var.comment {
                    line.push_str(SEP);
                    line.push_str("# ");
                    line.push_str(comment);
                }
                out.push_str(&line);
                out.push('\n');
            }
        }

        if !self.test_cases.is_empty() {
            out.push_str("\n*** Test Cases ***\n");
            render_blocks(&self.test_cases, &mut out);
        }

        if !self.keywords.is_empty() {
            out.push_str("\n*** Keywords ***\n");
            render_blocks(&self.keywords, &mut out);
        }
        out
    }
}

fn render_blocks(blocks: &[Block], out: &mut String) {
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        block.render(out);
    }
}

/// Documentation text keeps its spaces; only cell-breaking content is escaped.
fn escape_doc(text: &str) -> String {
    let single = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single.is_empty() {
        return "${EMPTY}".to_string();
    }
    escape_cell(&single)
}

// ============================================================================
// Step definitions
// ============================================================================

fn has_mapped_actions(actions: &[Action]) -> bool {
    actions.iter().any(|a| !matches!(a, Action::Unmapped { .. }))
}

/// Build the keyword for one extracted step. Returns the block and whether
/// its body came from mapped actions.
pub fn step_keyword(step: &ExtractedStep, ctx: &GenContext<'_>) -> (Block, bool) {
    let named = keyword_name_from_pattern(&step.pattern);
    let name = if named.name.is_empty() {
        keyword_name_from_identifier(&step.method_name)
    } else {
        named.name
    };
    let args: Vec<String> = if step.params.is_empty() {
        (1..=named.placeholders).map(|i| scalar(&format!("arg{}", i))).collect()
    } else {
        step.params.iter().map(|p| scalar(p)).collect()
    };

    let mut body = Vec::new();
    if ctx.is_hybrid() {
        body.push(review_line(&step.pattern));
    }
    let semantic = has_mapped_actions(&step.actions);
    if semantic {
        body.extend(map_actions(&step.actions));
    } else {
        body.extend(heuristic_body(&step.pattern, &args));
        body.extend(map_actions(&step.actions));
    }

    let block = Block {
        name,
        args,
        documentation: Some(format!("{}: {}", step.kind.label(), escape_cell(&step.pattern))),
        tags: Vec::new(),
        body,
    };
    (block, semantic)
}

fn review_line(pattern: &str) -> String {
    let single = pattern.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("# REVIEW: verify mapped actions for '{}'", single)
}

/// Generate a step-definition resource. `Ok(None)` when the source has no
/// step annotations.
pub fn step_definitions(source: &str, ctx: &GenContext<'_>) -> Result<Option<(RobotFile, TransformStrategy)>, ExtractError> {
    let steps = extract_steps(source)?;
    if steps.is_empty() {
        return Ok(None);
    }
    let class = outline(source)?;
    let title = class
        .name
        .as_deref()
        .map(keyword_name_from_identifier)
        .unwrap_or_else(|| ctx.title());

    let mut file = RobotFile::resource(ctx, format!("Step definitions migrated from {}", title));
    file.variables = element_variables(&class);
    let mut any_semantic = false;
    let mut seen = std::collections::BTreeSet::new();
    for step in &steps {
        let (mut block, semantic) = step_keyword(step, ctx);
        any_semantic |= semantic;
        // Robot rejects duplicate keyword names within one file
        if !seen.insert(block.name.to_lowercase()) {
            let mut n = 2;
            while !seen.insert(format!("{} {}", block.name, n).to_lowercase()) {
                n += 1;
            }
            block.name = format!("{} {}", block.name, n);
        }
        file.keywords.push(block);
    }
    let strategy = if any_semantic {
        TransformStrategy::Semantic
    } else {
        TransformStrategy::Heuristic
    };
    Ok(Some((file, strategy)))
}

/// `*** Variables ***` rows for elements declared on a class
pub fn element_variables(class: &super::extract::ClassOutline) -> Vec<Variable> {
    element_declarations(class)
        .into_iter()
        .map(|decl| match render_locator(&decl.locator) {
            Some(locator) => Variable {
                name: constant_name(&decl.name),
                value: escape_cell(&locator),
                comment: None,
            },
            None => Variable {
                name: constant_name(&decl.name),
                value: escape_cell(&decl.locator.value),
                comment: Some(format!("TODO: unmapped locator strategy '{}'", decl.locator.strategy)),
            },
        })
        .collect()
}

// ============================================================================
// Heuristics
// ============================================================================

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "on", "in", "into", "to", "from", "with", "at", "of", "for", "my", "his", "her",
    "their", "text", "number", "value", "word", "is", "are", "be",
];

const PHRASE_BREAKS: &[&str] = &["and", "then", "but", "or"];

struct HeuristicInput<'a> {
    words: Vec<String>,
    args: &'a [String],
}

impl HeuristicInput<'_> {
    fn verb_position(&self, verbs: &[&str]) -> Option<usize> {
        self.words.iter().position(|w| verbs.contains(&w.as_str()))
    }

    fn has_phrase(&self, phrase: &[&str]) -> bool {
        self.words
            .windows(phrase.len())
            .any(|window| window.iter().zip(phrase).all(|(w, p)| w == p))
    }

    /// `${LOGIN_BUTTON}` for "clicks the login button"
    fn object_variable(&self, verb_at: usize, fallback: &str) -> String {
        let phrase: Vec<&str> = self.words[verb_at + 1..]
            .iter()
            .take_while(|w| !PHRASE_BREAKS.contains(&w.as_str()))
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .map(String::as_str)
            .take(4)
            .collect();
        if phrase.is_empty() {
            scalar(fallback)
        } else {
            scalar(&constant_name(&phrase.join("_")))
        }
    }

    fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    fn last_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

struct Heuristic {
    verbs: &'static [&'static str],
    /// Multi-word triggers; the first word is taken as the verb position
    phrases: &'static [&'static [&'static str]],
    build: fn(&HeuristicInput<'_>, usize) -> Vec<String>,
}

impl Heuristic {
    fn trigger(&self, input: &HeuristicInput<'_>) -> Option<usize> {
        input.verb_position(self.verbs).or_else(|| {
            self.phrases
                .iter()
                .find(|phrase| input.has_phrase(phrase))
                .and_then(|phrase| input.verb_position(&phrase[..1]))
        })
    }
}

fn click(input: &HeuristicInput<'_>, at: usize) -> Vec<String> {
    let target = match input.args.len() {
        0 => input.object_variable(at, "TARGET_ELEMENT"),
        _ => input.args[0].clone(),
    };
    vec![row(&["Click Element", target.as_str()])]
}

fn enter(input: &HeuristicInput<'_>, at: usize) -> Vec<String> {
    let field = input.object_variable(at, "INPUT_FIELD");
    let value = input.first_arg().unwrap_or("${EMPTY}");
    vec![row(&["Input Text", field.as_str(), value])]
}

fn navigate(input: &HeuristicInput<'_>, _at: usize) -> Vec<String> {
    let url = input.first_arg().unwrap_or("${BASE_URL}");
    vec![row(&["Go To", url])]
}

fn verify(input: &HeuristicInput<'_>, at: usize) -> Vec<String> {
    match input.last_arg() {
        Some(expected) => vec![row(&["Page Should Contain", expected])],
        None => {
            let phrase: Vec<&str> = input.words[at + 1..]
                .iter()
                .filter(|w| !STOP_WORDS.contains(&w.as_str()) && !VERIFY_VERBS.contains(&w.as_str()))
                .map(String::as_str)
                .collect();
            let text = if phrase.is_empty() {
                input.words.join(" ")
            } else {
                phrase.join(" ")
            };
            vec![
                "# TODO: confirm the expected page text".to_string(),
                row(&["Page Should Contain", escape_cell(&text).as_str()]),
            ]
        }
    }
}

fn wait(input: &HeuristicInput<'_>, _at: usize) -> Vec<String> {
    let duration = match input.first_arg() {
        Some(arg) => format!("{}s", arg),
        None => "1s".to_string(),
    };
    vec![row(&["Sleep", duration.as_str()])]
}

fn select(input: &HeuristicInput<'_>, at: usize) -> Vec<String> {
    let list = input.object_variable(at, "SELECT_LIST");
    let value = input.first_arg().unwrap_or("${EMPTY}");
    vec![row(&["Select From List By Label", list.as_str(), value])]
}

const VERIFY_VERBS: &[&str] = &["verify", "verifies", "should", "see", "sees", "displayed", "visible", "shown"];

const HEURISTICS: &[Heuristic] = &[
    Heuristic {
        verbs: &["click", "clicks", "clicked", "press", "presses", "pressed", "tap", "taps", "tapped"],
        phrases: &[],
        build: click,
    },
    Heuristic {
        verbs: &["enter", "enters", "entered", "type", "types", "typed", "input", "inputs", "fill", "fills"],
        phrases: &[],
        build: enter,
    },
    Heuristic {
        verbs: &["navigate", "navigates", "open", "opens", "visit", "visits", "launch", "launches"],
        phrases: &[&["is", "on"], &["am", "on"], &["are", "on"], &["goes", "to"], &["go", "to"]],
        build: navigate,
    },
    Heuristic {
        verbs: VERIFY_VERBS,
        phrases: &[],
        build: verify,
    },
    Heuristic {
        verbs: &["wait", "waits", "waited"],
        phrases: &[],
        build: wait,
    },
    Heuristic {
        verbs: &["select", "selects", "selected", "choose", "chooses"],
        phrases: &[],
        build: select,
    },
];

/// Body derived from the step text alone. Ends in a log-only placeholder
/// when no verb matches.
pub fn heuristic_body(pattern: &str, args: &[String]) -> Vec<String> {
    let named = keyword_name_from_pattern(pattern);
    let words: Vec<String> = named
        .name
        .split_whitespace()
        .flat_map(split_identifier)
        .map(|w| w.to_lowercase())
        .collect();
    let input = HeuristicInput { words, args };

    HEURISTICS
        .iter()
        .find_map(|heuristic| heuristic.trigger(&input).map(|at| (heuristic.build)(&input, at)))
        .unwrap_or_else(|| log_placeholder(pattern))
}

/// Last-resort body for a step nothing could map
pub fn log_placeholder(text: &str) -> Vec<String> {
    let single = text.split_whitespace().collect::<Vec<_>>().join(" ");
    vec![
        row(&["Log", escape_cell(&format!("Step: {}", single)).as_str()]),
        "# TODO: implement this keyword".to_string(),
    ]
}

// ============================================================================
// Placeholders
// ============================================================================

/// One `No Operation` block per name, each carrying a TODO.
pub fn placeholder_blocks(names: &[String], todo: &str) -> Vec<Block> {
    names
        .iter()
        .map(|name| {
            let mut block = Block::new(keyword_name_from_identifier(name));
            block.body = vec![format!("# TODO: {}", todo), "No Operation".to_string()];
            block
        })
        .collect()
}

/// Placeholder resource built from method names; used by Manual mode and
/// when the semantic pipeline fails.
pub fn placeholder_file(names: &[String], ctx: &GenContext<'_>, reason: Option<&str>) -> RobotFile {
    let mut file = RobotFile::resource(ctx, format!("Placeholder for {}", ctx.title()));
    if let Some(reason) = reason {
        let single = reason.split_whitespace().collect::<Vec<_>>().join(" ");
        file.header.push(format!("# TODO: automatic migration failed: {}", single));
    }
    let mut names = names.to_vec();
    if names.is_empty() {
        names.push(ctx.title());
    }
    file.keywords = placeholder_blocks(&names, &format!("migrate manually from {}", ctx.source_path));
    file
}
