/*!
 * Quality report over a translated grid.
 *
 * Findings are non-fatal. The residual-script and leaked-placeholder
 * categories are worth another translation pass; drift and spacing findings
 * are reported for manual action.
 */

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::language_detector::{Script, has_residual_source_script};
use crate::language_utils::heuristic_code;
use crate::records::{LockedKeys, Record};
use crate::token_guard::new_placeholders;

static SPACING_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^\s|\s$|[ \t]{2,}| [,;)\]])").expect("valid spacing regex"));

static FULL_WIDTH_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[，。：；！？（）]").expect("valid punctuation regex"));

/// Kind of defect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectCategory {
    /// The value still carries the source script
    ResidualSourceScript,
    /// A placeholder token survived restoration
    LeakedPlaceholder,
    /// A locked cell no longer equals its source
    LockedValueDrift,
    /// Doubled spaces, stray padding or foreign punctuation
    SpacingArtifact,
}

impl DefectCategory {
    /// Whether another translation pass can fix this defect
    pub fn is_retry_worthy(self) -> bool {
        matches!(self, Self::ResidualSourceScript | Self::LeakedPlaceholder)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ResidualSourceScript => "residual source script",
            Self::LeakedPlaceholder => "leaked placeholder",
            Self::LockedValueDrift => "locked value drift",
            Self::SpacingArtifact => "spacing artifact",
        }
    }
}

impl fmt::Display for DefectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One defective cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityFinding {
    pub row: usize,
    pub column: String,
    /// Translated value
    pub value: String,
    /// Source value
    pub original: String,
    pub category: DefectCategory,
}

/// Cell and distinct-row counts for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CategoryTotals {
    pub cells: usize,
    pub rows: usize,
}

/// Aggregated findings for a grid
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub findings: Vec<QualityFinding>,
    pub totals: BTreeMap<DefectCategory, CategoryTotals>,
}

impl QualityReport {
    fn from_findings(findings: Vec<QualityFinding>) -> Self {
        let mut rows: BTreeMap<DefectCategory, BTreeSet<usize>> = BTreeMap::new();
        let mut totals: BTreeMap<DefectCategory, CategoryTotals> = BTreeMap::new();
        for finding in &findings {
            totals.entry(finding.category).or_default().cells += 1;
            rows.entry(finding.category).or_default().insert(finding.row);
        }
        for (category, distinct) in rows {
            totals.entry(category).or_default().rows = distinct.len();
        }
        Self { findings, totals }
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Totals for one category, zero when absent
    pub fn totals_for(&self, category: DefectCategory) -> CategoryTotals {
        self.totals.get(&category).copied().unwrap_or_default()
    }

    /// Findings of a category
    pub fn findings_for(&self, category: DefectCategory) -> impl Iterator<Item = &QualityFinding> {
        self.findings.iter().filter(move |f| f.category == category)
    }

    /// Rows with at least one retry-worthy finding
    pub fn retry_rows(&self) -> BTreeSet<usize> {
        self.findings
            .iter()
            .filter(|f| f.category.is_retry_worthy())
            .map(|f| f.row)
            .collect()
    }

    /// Columns with retry-worthy findings, per row
    pub fn retry_cells(&self) -> BTreeMap<usize, BTreeSet<String>> {
        let mut cells: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
        for finding in self.findings.iter().filter(|f| f.category.is_retry_worthy()) {
            cells.entry(finding.row).or_default().insert(finding.column.clone());
        }
        cells
    }

    /// One line per category with findings
    pub fn summary(&self) -> String {
        if self.is_clean() {
            return "no quality findings".to_string();
        }
        self.totals
            .iter()
            .map(|(category, totals)| format!("{}: {} cell(s) in {} row(s)", category, totals.cells, totals.rows))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn has_spacing_artifact(value: &str, latin_target: bool) -> bool {
    SPACING_ARTIFACT.is_match(value) || (latin_target && FULL_WIDTH_PUNCTUATION.is_match(value))
}

/// Compare a translated grid with its source
pub fn run_quality_checks(
    original: &[Record],
    translated: &[Record],
    locked: &LockedKeys,
    target_language: &str,
) -> QualityReport {
    let latin_target = Script::for_language(&heuristic_code(target_language)).is_none();
    let mut findings = Vec::new();

    for (row, (source, output)) in original.iter().zip(translated).enumerate() {
        for (column, value) in output.fields() {
            let source_value = source.get(column);
            let original_text = source_value.map(|v| v.to_json().to_string()).unwrap_or_default();
            let finding = |category: DefectCategory, value: String, original: String| QualityFinding {
                row,
                column: column.clone(),
                value,
                original,
                category,
            };

            if locked.is_locked(column) {
                if source_value != Some(value) {
                    findings.push(finding(
                        DefectCategory::LockedValueDrift,
                        value.to_json().to_string(),
                        original_text,
                    ));
                }
                continue;
            }

            let Some(text) = value.as_text() else {
                continue;
            };
            let source_text = source.text(column).unwrap_or_default();

            if has_residual_source_script(text, target_language) {
                findings.push(finding(
                    DefectCategory::ResidualSourceScript,
                    text.to_string(),
                    source_text.to_string(),
                ));
            }
            if !new_placeholders(source_text, text).is_empty() {
                findings.push(finding(
                    DefectCategory::LeakedPlaceholder,
                    text.to_string(),
                    source_text.to_string(),
                ));
            }
            if has_spacing_artifact(text, latin_target) {
                findings.push(finding(
                    DefectCategory::SpacingArtifact,
                    text.to_string(),
                    source_text.to_string(),
                ));
            }
        }
    }

    QualityReport::from_findings(findings)
}
