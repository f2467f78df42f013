//! Gherkin scenario transformation
//!
//! `.feature` files are parsed line by line into a [`Feature`] and rendered as
//! a Robot suite. Step calls use the same naming rules as generated step
//! keywords so the suite resolves against the migrated step resources.

use super::generate::{generated_note, Block, GenContext, RobotFile};
use super::mapping::{escape_cell, row};
use super::naming::{step_call, title_case};
use crate::model::TransformMode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("no Feature: line found")]
    MissingFeature,
    #[error("line {0}: step outside of a scenario or background")]
    StepOutsideScenario(usize),
    #[error("doc string opened on line {0} is never closed")]
    UnterminatedDocString(usize),
}

/// Extra argument attached to a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepArgument {
    DataTable(Vec<Vec<String>>),
    DocString(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// `Given`, `When`, `Then`, `And`, `But` or `*`
    pub keyword: String,
    pub text: String,
    pub argument: Option<StepArgument>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Examples {
    pub tags: Vec<String>,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub tags: Vec<String>,
    pub outline: bool,
    pub steps: Vec<Step>,
    pub examples: Vec<Examples>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    pub description: Vec<String>,
    pub tags: Vec<String>,
    pub background: Option<Vec<Step>>,
    pub scenarios: Vec<Scenario>,
}

const STEP_KEYWORDS: &[&str] = &["Given", "When", "Then", "And", "But", "*"];

fn split_step(line: &str) -> Option<(&str, &str)> {
    STEP_KEYWORDS.iter().find_map(|kw| {
        let rest = line.strip_prefix(kw)?;
        rest.starts_with(char::is_whitespace)
            .then(|| (*kw, rest.trim()))
    })
}

fn table_row(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn tags(line: &str) -> Vec<String> {
    line.split_whitespace()
        .take_while(|t| !t.starts_with('#'))
        .filter_map(|t| t.strip_prefix('@'))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Feature,
    Background,
    Scenario,
    Examples,
    Rule,
}

/// Parse Gherkin text.
pub fn parse_feature(text: &str) -> Result<Feature, FeatureError> {
    let mut feature: Option<Feature> = None;
    let mut section = Section::Feature;
    let mut pending_tags: Vec<String> = Vec::new();
    let mut doc_string: Option<(usize, &str, Vec<String>)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        if let Some((_, delimiter, lines)) = doc_string.as_mut() {
            if line == *delimiter {
                let content = lines.join("\n");
                if let Some(step) = last_step(feature.as_mut(), section) {
                    step.argument = Some(StepArgument::DocString(content));
                }
                doc_string = None;
            } else {
                lines.push(line.to_string());
            }
            continue;
        }

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "\"\"\"" || line.starts_with("\"\"\"") || line.starts_with("```") {
            let delimiter = if line.starts_with("```") { "```" } else { "\"\"\"" };
            doc_string = Some((line_no, delimiter, Vec::new()));
            continue;
        }
        if line.starts_with('@') {
            pending_tags.extend(tags(line));
            continue;
        }

        if let Some(name) = line.strip_prefix("Feature:") {
            feature = Some(Feature {
                name: name.trim().to_string(),
                tags: std::mem::take(&mut pending_tags),
                ..Default::default()
            });
            section = Section::Feature;
            continue;
        }
        let Some(current) = feature.as_mut() else {
            if split_step(line).is_some() {
                return Err(FeatureError::StepOutsideScenario(line_no));
            }
            continue;
        };

        if line.starts_with("Background:") {
            current.background = Some(Vec::new());
            section = Section::Background;
            pending_tags.clear();
            continue;
        }
        if line.starts_with("Rule:") {
            section = Section::Rule;
            pending_tags.clear();
            continue;
        }
        let heading = [
            ("Scenario Outline:", true),
            ("Scenario Template:", true),
            ("Scenario:", false),
            ("Example:", false),
        ]
        .into_iter()
        .find_map(|(prefix, outline)| line.strip_prefix(prefix).map(|rest| (rest, outline)));
        if let Some((name, outline)) = heading {
            current.scenarios.push(Scenario {
                name: name.trim().to_string(),
                tags: std::mem::take(&mut pending_tags),
                outline,
                ..Default::default()
            });
            section = Section::Scenario;
            continue;
        }
        if line.starts_with("Examples:") || line.starts_with("Scenarios:") {
            let examples = Examples {
                tags: std::mem::take(&mut pending_tags),
                ..Default::default()
            };
            match current.scenarios.last_mut() {
                Some(scenario) => scenario.examples.push(examples),
                None => return Err(FeatureError::StepOutsideScenario(line_no)),
            }
            section = Section::Examples;
            continue;
        }

        if line.starts_with('|') {
            if section == Section::Examples {
                if let Some(examples) = current.scenarios.last_mut().and_then(|s| s.examples.last_mut()) {
                    if examples.header.is_empty() {
                        examples.header = table_row(line);
                    } else {
                        examples.rows.push(table_row(line));
                    }
                }
            } else if let Some(step) = last_step(Some(current), section) {
                let cells = table_row(line);
                match &mut step.argument {
                    Some(StepArgument::DataTable(rows)) => rows.push(cells),
                    other => *other = Some(StepArgument::DataTable(vec![cells])),
                }
            }
            continue;
        }

        if let Some((keyword, step_text)) = split_step(line) {
            let step = Step {
                keyword: keyword.to_string(),
                text: step_text.to_string(),
                argument: None,
            };
            match section {
                Section::Background => {
                    if let Some(background) = current.background.as_mut() {
                        background.push(step);
                    }
                }
                Section::Scenario => {
                    if let Some(scenario) = current.scenarios.last_mut() {
                        scenario.steps.push(step);
                    }
                }
                _ => return Err(FeatureError::StepOutsideScenario(line_no)),
            }
            continue;
        }

        // Free text: only the feature description is kept
        if section == Section::Feature && current.scenarios.is_empty() && current.background.is_none() {
            current.description.push(line.to_string());
        }
    }

    if let Some((start, _, _)) = doc_string {
        return Err(FeatureError::UnterminatedDocString(start));
    }
    feature.ok_or(FeatureError::MissingFeature)
}

fn last_step(feature: Option<&mut Feature>, section: Section) -> Option<&mut Step> {
    let feature = feature?;
    match section {
        Section::Background => feature.background.as_mut()?.last_mut(),
        Section::Scenario => feature.scenarios.last_mut()?.steps.last_mut(),
        _ => None,
    }
}

/// Replace `<param>` placeholders with the row's values.
fn substitute(text: &str, header: &[String], row: &[String]) -> String {
    header
        .iter()
        .zip(row)
        .fold(text.to_string(), |acc, (name, value)| acc.replace(&format!("<{}>", name), value))
}

fn step_rows(step: &Step) -> Vec<String> {
    let call = step_call(&step.text);
    let mut cells = vec![call.name];
    cells.extend(call.args.iter().map(|a| escape_cell(a)));
    let mut rows = vec![row(&cells)];
    match &step.argument {
        Some(StepArgument::DataTable(table)) => rows.push(format!(
            "# TODO: data table with {} row(s) was not migrated",
            table.len()
        )),
        Some(StepArgument::DocString(_)) => rows.push("# TODO: doc string argument was not migrated".to_string()),
        None => {}
    }
    rows
}

fn test_body(steps: &[Step], ctx: &GenContext<'_>, name: &str) -> Vec<String> {
    let mut body = Vec::new();
    if ctx.mode == TransformMode::Hybrid {
        body.push(format!("# REVIEW: verify mapped actions for '{}'", name));
    }
    body.extend(steps.iter().flat_map(step_rows));
    body
}

/// Test case name that Robot accepts (no leading/trailing spaces, no `#`)
fn test_name(name: &str) -> String {
    let cleaned = title_case(name);
    if cleaned.is_empty() {
        "Unnamed Scenario".to_string()
    } else {
        escape_cell(&cleaned)
    }
}

fn expand(scenario: &Scenario, ctx: &GenContext<'_>) -> Vec<Block> {
    let rows: Vec<(&Examples, &Vec<String>)> = scenario
        .examples
        .iter()
        .flat_map(|ex| ex.rows.iter().map(move |row| (ex, row)))
        .collect();

    if !scenario.outline || rows.is_empty() {
        let mut block = Block::new(test_name(&scenario.name));
        block.tags = scenario.tags.clone();
        block.body = test_body(&scenario.steps, ctx, &scenario.name);
        if scenario.outline {
            block.body.insert(0, "# TODO: scenario outline has no examples".to_string());
        }
        return vec![block];
    }

    rows.into_iter()
        .enumerate()
        .map(|(i, (examples, values))| {
            let name = substitute(&scenario.name, &examples.header, values);
            let steps: Vec<Step> = scenario
                .steps
                .iter()
                .map(|step| Step {
                    keyword: step.keyword.clone(),
                    text: substitute(&step.text, &examples.header, values),
                    argument: step.argument.clone(),
                })
                .collect();
            let mut block = Block::new(format!("{} - Example {}", test_name(&name), i + 1));
            block.tags = scenario.tags.iter().chain(&examples.tags).cloned().collect();
            block.body = test_body(&steps, ctx, &scenario.name);
            block
        })
        .collect()
}

fn dedupe(blocks: &mut [Block]) {
    let mut seen = std::collections::BTreeSet::new();
    for block in blocks.iter_mut() {
        if seen.insert(block.name.to_lowercase()) {
            continue;
        }
        let mut n = 2;
        while !seen.insert(format!("{} {}", block.name, n).to_lowercase()) {
            n += 1;
        }
        block.name = format!("{} {}", block.name, n);
    }
}

fn suite_shell(feature: &Feature, ctx: &GenContext<'_>, root_prefix: &str) -> RobotFile {
    let mut documentation = vec![if feature.name.is_empty() {
        ctx.title()
    } else {
        feature.name.clone()
    }];
    documentation.extend(feature.description.iter().cloned());
    documentation.push(generated_note(ctx.mode, 1));

    let mut settings = vec![
        row(&["Library", ctx.library]),
        row(&["Resource".to_string(), format!("${{CURDIR}}/{}resources/common.resource", root_prefix)]),
        row(&["Suite Setup", "Open Test Browser"]),
        row(&["Suite Teardown", "Close All Browsers"]),
    ];
    if feature.background.is_some() {
        settings.push(row(&["Test Setup", "Background Steps"]));
    }
    if !feature.tags.is_empty() {
        settings.push(row(&[&["Force Tags".to_string()], feature.tags.as_slice()].concat()));
    }

    RobotFile {
        marker: Some(ctx.marker()),
        documentation,
        settings,
        ..Default::default()
    }
}

/// Render a parsed feature as a Robot suite. `root_prefix` is the `../`
/// path from the suite's directory back to the project root.
pub fn feature_suite(feature: &Feature, ctx: &GenContext<'_>, root_prefix: &str) -> RobotFile {
    let mut file = suite_shell(feature, ctx, root_prefix);
    if ctx.mode == TransformMode::Manual {
        for scenario in &feature.scenarios {
            let mut block = Block::new(test_name(&scenario.name));
            block.tags = scenario.tags.clone();
            block.body = vec!["# TODO: implement scenario steps".to_string(), "No Operation".to_string()];
            file.test_cases.push(block);
        }
    } else {
        for scenario in &feature.scenarios {
            file.test_cases.extend(expand(scenario, ctx));
        }
    }
    dedupe(&mut file.test_cases);

    if let Some(background) = &feature.background {
        let mut block = Block::new("Background Steps");
        block.body = if ctx.mode == TransformMode::Manual {
            vec!["# TODO: implement background steps".to_string(), "No Operation".to_string()]
        } else {
            test_body(background, ctx, "Background")
        };
        file.keywords.push(block);
    }
    file
}
