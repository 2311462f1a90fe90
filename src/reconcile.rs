use crate::canon::canonicalize;
use crate::schema::{CanonicalReport, ReportMetadata, ReportUnits, Section};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which source supplied the value chosen for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChosenSource {
    Primary,
    Secondary,
    Missing,
}

impl fmt::Display for ChosenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChosenSource::Primary => "primary",
            ChosenSource::Secondary => "secondary",
            ChosenSource::Missing => "missing",
        })
    }
}

/// Per-field record of what each source reported and which value won.
/// Created fresh on every reconciliation, never mutated afterwards, and
/// consumed only for display and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub section: Section,
    pub field: String,
    pub primary: Option<f64>,
    pub secondary: Option<f64>,
    pub chosen: Option<f64>,
    pub source: ChosenSource,
}

/// Canonicalize both raw reports and merge them field by field.
///
/// The primary source (live structured data) is presumed fresher than a
/// model's reading of static document text, so a non-null primary value
/// always wins; the secondary exists purely to patch gaps. One provenance
/// record is emitted for every field of every section, in the fixed section
/// order, whatever the outcome.
pub fn reconcile(
    primary_raw: &Value,
    secondary_raw: &Value,
) -> (CanonicalReport, Vec<ProvenanceRecord>) {
    reconcile_canonical(&canonicalize(primary_raw), &canonicalize(secondary_raw))
}

/// Merge two already-canonicalized reports. See [`reconcile`].
pub fn reconcile_canonical(
    primary: &CanonicalReport,
    secondary: &CanonicalReport,
) -> (CanonicalReport, Vec<ProvenanceRecord>) {
    let mut merged = CanonicalReport {
        metadata: ReportMetadata::merged_over(&primary.metadata, &secondary.metadata),
        units: ReportUnits::merged_over(&primary.units, &secondary.units),
        ..Default::default()
    };

    let total_fields: usize = Section::ALL.iter().map(|s| s.fields().len()).sum();
    let mut provenance = Vec::with_capacity(total_fields);

    for section in Section::ALL {
        for field in section.fields() {
            let from_primary = primary.get_value(section, field).flatten();
            let from_secondary = secondary.get_value(section, field).flatten();

            let (chosen, source) = match (from_primary, from_secondary) {
                (Some(value), _) => (Some(value), ChosenSource::Primary),
                (None, Some(value)) => (Some(value), ChosenSource::Secondary),
                (None, None) => (None, ChosenSource::Missing),
            };

            merged.set_value(section, field, chosen);
            provenance.push(ProvenanceRecord {
                section,
                field: (*field).to_string(),
                primary: from_primary,
                secondary: from_secondary,
                chosen,
                source,
            });
        }
    }

    debug!(
        "reconciled report: {} of {} fields still missing",
        missing_count(&provenance),
        provenance.len()
    );

    (merged, provenance)
}

/// How many fields neither source could supply. Informational only; a
/// missing field is a display condition, not a failure.
pub fn missing_count(records: &[ProvenanceRecord]) -> usize {
    records
        .iter()
        .filter(|r| r.source == ChosenSource::Missing)
        .count()
}

fn fmt_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

/// Render the provenance table as CSV for export.
pub fn provenance_to_csv(records: &[ProvenanceRecord]) -> String {
    let mut output = String::new();
    output.push_str("Section,Field,Primary,Secondary,Chosen,Source\n");
    for record in records {
        output.push_str(&format!(
            "{},{},{},{},{},{}\n",
            record.section,
            record.field,
            fmt_cell(record.primary),
            fmt_cell(record.secondary),
            fmt_cell(record.chosen),
            record.source
        ));
    }
    output
}

/// Render the provenance table as a markdown diagnostics view, one section
/// per heading.
pub fn provenance_to_markdown(records: &[ProvenanceRecord]) -> String {
    let mut output = String::from("# Source Reconciliation\n\n");

    for section in Section::ALL {
        let rows: Vec<&ProvenanceRecord> =
            records.iter().filter(|r| r.section == section).collect();
        if rows.is_empty() {
            continue;
        }

        output.push_str(&format!("## {}\n\n", section));
        output.push_str("| Field | Primary | Secondary | Chosen | Source |\n");
        output.push_str("| --- | --- | --- | --- | --- |\n");
        for record in rows {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                record.field,
                fmt_cell(record.primary),
                fmt_cell(record.secondary),
                fmt_cell(record.chosen),
                record.source
            ));
        }
        output.push('\n');
    }

    let missing = missing_count(records);
    if missing > 0 {
        output.push_str(&format!(
            "{} field(s) were available from neither source.\n",
            missing
        ));
    }

    output
}
