//! Per-object resolution diagnostics.

use crate::models::{Identifier, Provenance, ResolutionResult, ResolutionStatus, Section, WatchlistEntry};
use crate::resolver::IdentityResolver;
use serde::Serialize;
use std::fmt::Write as _;

/// One diagnosed watchlist object.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisRow {
    /// Watchlist section.
    pub section: Section,
    /// Display name.
    pub display_name: String,
    /// Identifier stages 1-3 would try first (offline).
    pub planned: Option<Identifier>,
    /// Stage of the planned identifier.
    pub planned_stage: Option<Provenance>,
    /// Live resolution outcome.
    pub result: ResolutionResult,
}

/// Plans and resolves every entry.
#[must_use]
pub fn diagnose(resolver: &IdentityResolver, entries: &[WatchlistEntry]) -> Vec<DiagnosisRow> {
    let plans: Vec<_> = entries
        .iter()
        .map(|e| resolver.planned_identifier(&e.display_name, e.section))
        .collect();
    resolver
        .resolve_all(entries)
        .into_iter()
        .zip(plans)
        .map(|(result, plan)| {
            let (planned, planned_stage) = plan.map_or((None, None), |(id, stage)| (Some(id), Some(stage)));
            DiagnosisRow {
                section: result.section,
                display_name: result.display_name.clone(),
                planned,
                planned_stage,
                result,
            }
        })
        .collect()
}

/// Renders rows as a fixed-width table.
#[must_use]
pub fn render_table(rows: &[DiagnosisRow]) -> String {
    let headers = ["SECTION", "NAME", "PLANNED", "STATUS", "IDENTIFIER", "VIA", "TRIED"];
    let cells: Vec<[String; 7]> = rows
        .iter()
        .map(|row| {
            [
                row.section.to_string(),
                row.display_name.clone(),
                row.planned.as_ref().map_or_else(|| "-".to_string(), ToString::to_string),
                row.result.status.to_string(),
                row.result
                    .identifier
                    .as_ref()
                    .map_or_else(|| "-".to_string(), ToString::to_string),
                row.result.provenance.map_or("-", |p| p.as_str()).to_string(),
                row.result.attempted_candidates.len().to_string(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut line = |values: &[&str]| {
        let padded: Vec<String> = values
            .iter()
            .zip(widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };
    line(&headers);
    for row in &cells {
        line(&row.each_ref().map(String::as_str));
    }

    let failed = rows
        .iter()
        .filter(|r| r.result.status == ResolutionStatus::Failed)
        .count();
    let _ = writeln!(out, "\n{} object(s), {failed} failed", rows.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;

    #[test]
    fn test_render_table_aligns_columns() {
        let rows = vec![
            DiagnosisRow {
                section: Section::Asteroid,
                display_name: "433 Eros".to_string(),
                planned: Some(Identifier::new("433;")),
                planned_stage: Some(Provenance::Heuristic),
                result: ResolutionResult::succeeded(
                    "433 Eros",
                    Section::Asteroid,
                    Identifier::new("433;"),
                    Position { ra_deg: 1.0, dec_deg: 2.0 },
                    Provenance::Heuristic,
                ),
            },
            DiagnosisRow {
                section: Section::Comet,
                display_name: "C/2099 Z9".to_string(),
                planned: None,
                planned_stage: None,
                result: ResolutionResult::failed("C/2099 Z9", Section::Comet, Vec::new(), Vec::new()),
            },
        ];
        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("SECTION   NAME"));
        assert!(lines[1].contains("433;"));
        assert!(lines[2].contains("failed"));
        assert!(table.ends_with("2 object(s), 1 failed\n"));
    }
}
