//! Re-processing of already-migrated target files
//!
//! Every generated file starts with a metadata line such as
//! `# robomigrate: mode=enhanced tier=2 validated`. The tier recorded there is
//! the highest tier ever applied, which is what makes re-runs idempotent.

use super::generate::generated_note;
use super::naming::keyword_name_from_identifier;
use crate::model::{TransformMode, TransformTier, ValidationReport};
use crate::validate::{section_header, split_cells, validate};

pub const MARKER_PREFIX: &str = "# robomigrate:";
const VALIDATION_PREFIX: &str = "# Validation:";

/// Metadata line carried by every generated file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub mode: TransformMode,
    pub tier: u8,
    pub validated: bool,
}

impl Marker {
    pub fn new(mode: TransformMode, tier: u8) -> Self {
        Self {
            mode,
            tier,
            validated: false,
        }
    }

    /// Marker on the first non-blank line of `content`, if any.
    pub fn parse(content: &str) -> Option<Self> {
        let first = content
            .trim_start_matches('\u{feff}')
            .lines()
            .find(|line| !line.trim().is_empty())?;
        let rest = first.trim().strip_prefix(MARKER_PREFIX)?;
        let mut marker = Marker::new(TransformMode::default(), 1);
        for token in rest.split_whitespace() {
            if let Some(mode) = token.strip_prefix("mode=") {
                marker.mode = TransformMode::parse(mode).unwrap_or_default();
            } else if let Some(tier) = token.strip_prefix("tier=") {
                marker.tier = tier.parse::<u8>().unwrap_or(1).clamp(1, 3);
            } else if token == "validated" {
                marker.validated = true;
            }
        }
        Some(marker)
    }

    pub fn render(&self) -> String {
        let mut line = format!("{} mode={} tier={}", MARKER_PREFIX, self.mode.label(), self.tier);
        if self.validated {
            line.push_str(" validated");
        }
        line
    }
}

fn is_marker_line(line: &str) -> bool {
    line.trim().starts_with(MARKER_PREFIX)
}

/// Replace (or add) the marker so it sits on the first line.
pub fn ensure_marker(content: &str, marker: &Marker) -> String {
    let body: Vec<&str> = content
        .trim_start_matches('\u{feff}')
        .lines()
        .skip_while(|line| line.trim().is_empty() || is_marker_line(line))
        .collect();
    let mut out = marker.render();
    out.push('\n');
    out.push_str(&body.join("\n"));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// First line of the existing Documentation setting, skipping generated notes
pub fn existing_title(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let (start, end) = documentation_span(&lines)?;
    lines[start..end]
        .iter()
        .flat_map(|line| split_cells(line).into_iter().skip(1))
        .map(|cell| cell.trim().to_string())
        .find(|cell| !cell.is_empty() && !cell.starts_with("Generated by robomigrate"))
}

/// Line range `[start, end)` of the Documentation setting, continuation
/// lines included.
fn documentation_span(lines: &[&str]) -> Option<(usize, usize)> {
    let mut in_settings = false;
    for (i, line) in lines.iter().enumerate() {
        if let Some(section) = section_header(line) {
            in_settings = section == "setting";
            continue;
        }
        if !in_settings {
            continue;
        }
        let first = split_cells(line).into_iter().next().unwrap_or_default();
        if first.eq_ignore_ascii_case("documentation") {
            let end = lines[i + 1..]
                .iter()
                .position(|l| !l.trim_start().starts_with("..."))
                .map(|offset| i + 1 + offset)
                .unwrap_or(lines.len());
            return Some((i, end));
        }
    }
    None
}

/// Rewrite the Documentation block of the Settings section. Everything else
/// is kept verbatim.
pub fn rewrite_documentation(content: &str, documentation: &[String]) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut block: Vec<String> = Vec::new();
    for (i, line) in documentation.iter().enumerate() {
        let label = if i == 0 { "Documentation" } else { "..." };
        block.push(format!("{}    {}", label, line));
    }

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + block.len() + 1);
    match documentation_span(&lines) {
        Some((start, end)) => {
            out.extend(lines[..start].iter().map(|l| l.to_string()));
            out.extend(block);
            out.extend(lines[end..].iter().map(|l| l.to_string()));
        }
        None => {
            let settings = lines
                .iter()
                .position(|line| section_header(line).as_deref() == Some("setting"));
            match settings {
                Some(at) => {
                    out.extend(lines[..=at].iter().map(|l| l.to_string()));
                    out.extend(block);
                    out.extend(lines[at + 1..].iter().map(|l| l.to_string()));
                }
                None => {
                    // No Settings section: add one before the first section
                    let first_section = lines
                        .iter()
                        .position(|line| section_header(line).is_some())
                        .unwrap_or(lines.len());
                    out.extend(lines[..first_section].iter().map(|l| l.to_string()));
                    out.push("*** Settings ***".to_string());
                    out.extend(block);
                    out.push(String::new());
                    out.extend(lines[first_section..].iter().map(|l| l.to_string()));
                }
            }
        }
    }
    let mut joined = out.join("\n");
    joined.push('\n');
    joined
}

/// Replace any validation comment after the marker with a fresh one.
pub fn annotate_validation(content: &str, report: &ValidationReport) -> String {
    let mut lines: Vec<String> = content
        .lines()
        .filter(|line| !line.starts_with(VALIDATION_PREFIX))
        .map(str::to_string)
        .collect();
    if !report.valid {
        let at = usize::from(lines.first().is_some_and(|l| is_marker_line(l)));
        lines.insert(at, format!("{} {} issue(s)", VALIDATION_PREFIX, report.issues.len()));
    }
    let mut joined = lines.join("\n");
    joined.push('\n');
    joined
}

/// What one tier request did to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierOutcome {
    pub content: String,
    pub changed: bool,
    /// Tier that actually ran; Tier3 without a source degrades to 2
    pub applied: Option<TransformTier>,
    pub validation: Option<ValidationReport>,
}

/// Inputs for one tier application
#[derive(Debug, Clone, Copy)]
pub struct TierRequest<'a> {
    pub mode: TransformMode,
    pub tier: TransformTier,
    pub force: bool,
    /// Target path, used for a title when the file has no documentation
    pub path: &'a str,
}

/// Apply a tier to an existing target file. `regenerated` is the fresh
/// content derived from the mapped source file, when one exists.
pub fn apply_tier(existing: &str, request: TierRequest<'_>, regenerated: Option<&str>) -> TierOutcome {
    let recorded = Marker::parse(existing);
    let requested = request.tier.number();

    if !request.force && recorded.is_some_and(|m| m.tier >= requested) {
        return TierOutcome {
            content: existing.to_string(),
            changed: false,
            applied: None,
            validation: None,
        };
    }

    let effective = match (request.tier, regenerated) {
        (TransformTier::DeepRegeneration, None) => TransformTier::Validation,
        (tier, _) => tier,
    };
    let base = match (effective, regenerated) {
        (TransformTier::DeepRegeneration, Some(fresh)) => fresh,
        _ => existing,
    };

    let title = existing_title(existing)
        .or_else(|| existing_title(base))
        .unwrap_or_else(|| {
            let stem = crate::discovery::display_name(request.path);
            format!("Migrated {}", keyword_name_from_identifier(&stem))
        });
    let tier = recorded.map_or(0, |m| m.tier).max(effective.number());
    let documentation = vec![title, generated_note(request.mode, tier)];
    let mut content = rewrite_documentation(base, &documentation);

    let mut validation = None;
    if effective >= TransformTier::Validation {
        let report = validate(&content);
        content = annotate_validation(&content, &report);
        validation = Some(report);
    }

    let marker = Marker {
        mode: request.mode,
        tier,
        validated: validation.is_some() || recorded.is_some_and(|m| m.validated),
    };
    let content = ensure_marker(&content, &marker);
    TierOutcome {
        changed: content != existing,
        content,
        applied: Some(effective),
        validation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIGRATED: &str = "# robomigrate: mode=enhanced tier=1\n\
*** Settings ***\n\
Documentation    Login steps\n\
...    Generated by robomigrate; mode=enhanced, tier=1.\n\
Library    SeleniumLibrary\n\
Resource    common.resource\n\
\n\
*** Keywords ***\n\
User Logs In\n\
\x20   Click Element    id:login\n";

    fn request(tier: TransformTier, force: bool) -> TierRequest<'static> {
        TierRequest {
            mode: TransformMode::Enhanced,
            tier,
            force,
            path: "robot/steps/LoginSteps.resource",
        }
    }

    #[test]
    fn test_marker_round_trip() {
        let marker = Marker::parse("# robomigrate: mode=hybrid tier=2 validated\n*** Settings ***").unwrap();
        assert_eq!(marker.mode, TransformMode::Hybrid);
        assert_eq!(marker.tier, 2);
        assert!(marker.validated);
        assert_eq!(marker.render(), "# robomigrate: mode=hybrid tier=2 validated");
        assert!(Marker::parse("*** Settings ***\n# robomigrate: mode=manual tier=1").is_none());
    }

    #[test]
    fn test_tier1_on_marked_file_is_unchanged_without_force() {
        let outcome = apply_tier(MIGRATED, request(TransformTier::QuickRefresh, false), None);
        assert!(!outcome.changed);
        assert_eq!(outcome.content, MIGRATED);
        assert!(outcome.applied.is_none());
    }

    #[test]
    fn test_forced_tier1_rewrites_header_only() {
        let mut req = request(TransformTier::QuickRefresh, true);
        req.mode = TransformMode::Hybrid;
        let outcome = apply_tier(MIGRATED, req, None);
        assert!(outcome.content.starts_with("# robomigrate: mode=hybrid tier=1\n"));
        assert!(outcome.content.contains("...    Generated by robomigrate; mode=hybrid, tier=1."));
        assert!(outcome.content.contains("Documentation    Login steps\n"));
        assert!(outcome.content.contains("Resource    common.resource\n"));
        assert!(outcome.content.ends_with("User Logs In\n    Click Element    id:login\n"));
    }

    #[test]
    fn test_tier2_adds_validated_flag() {
        let outcome = apply_tier(MIGRATED, request(TransformTier::Validation, false), None);
        assert!(outcome.content.starts_with("# robomigrate: mode=enhanced tier=2 validated\n"));
        assert!(outcome.validation.as_ref().is_some_and(|r| r.valid));
        assert!(!outcome.content.contains(VALIDATION_PREFIX));

        let again = apply_tier(&outcome.content, request(TransformTier::Validation, false), None);
        assert!(!again.changed);
    }

    #[test]
    fn test_tier2_reports_issue_count() {
        let broken = "*** Settings ***\nDocumentation    Broken\n\n*** Keywords ***\nA\n    Log    x\n";
        let outcome = apply_tier(broken, request(TransformTier::Validation, false), None);
        let report = outcome.validation.unwrap();
        assert!(!report.valid);
        let second = outcome.content.lines().nth(1).unwrap();
        assert_eq!(second, format!("# Validation: {} issue(s)", report.issues.len()));
    }

    #[test]
    fn test_tier3_without_source_degrades_to_tier2() {
        let outcome = apply_tier(MIGRATED, request(TransformTier::DeepRegeneration, false), None);
        assert_eq!(outcome.applied, Some(TransformTier::Validation));
        assert!(outcome.content.starts_with("# robomigrate: mode=enhanced tier=2 validated\n"));
    }

    #[test]
    fn test_tier3_regenerates_and_keeps_title() {
        let fresh = "# robomigrate: mode=enhanced tier=1\n*** Settings ***\nDocumentation    Fresh\nLibrary    SeleniumLibrary\n\n*** Keywords ***\nNew Keyword\n    Go To    url\n";
        let outcome = apply_tier(MIGRATED, request(TransformTier::DeepRegeneration, false), Some(fresh));
        assert_eq!(outcome.applied, Some(TransformTier::DeepRegeneration));
        assert!(outcome.content.starts_with("# robomigrate: mode=enhanced tier=3 validated\n"));
        assert!(outcome.content.contains("Documentation    Login steps\n"));
        assert!(outcome.content.contains("New Keyword"));
        assert!(!outcome.content.contains("User Logs In"));
    }

    #[test]
    fn test_forced_lower_tier_never_downgrades() {
        let tier3 = MIGRATED.replace("tier=1", "tier=3 validated");
        let outcome = apply_tier(&tier3, request(TransformTier::QuickRefresh, true), None);
        assert!(outcome.content.starts_with("# robomigrate: mode=enhanced tier=3 validated\n"));
    }

    #[test]
    fn test_documentation_added_when_missing() {
        let bare = "*** Keywords ***\nA\n    Go To    url\n";
        let outcome = apply_tier(bare, request(TransformTier::QuickRefresh, false), None);
        assert!(outcome.content.contains("*** Settings ***\nDocumentation    Migrated Login Steps\n"));
        assert!(outcome.content.starts_with("# robomigrate: mode=enhanced tier=1\n"));
    }
}
