use crate::schema::{CanonicalReport, Section};
use serde::{Deserialize, Serialize};

/// One row of the flat tabular view: (section, field, value). A derived view
/// for export only; the nested JSON report stays the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    pub section: Section,
    pub field: String,
    pub value: Option<f64>,
}

/// Flatten the numeric sections into rows, in the fixed section and field
/// order. Metadata and units are not part of the numeric vocabulary and stay
/// in the JSON form.
pub fn flat_rows(report: &CanonicalReport) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    for section in Section::ALL {
        for field in section.fields() {
            rows.push(FlatRow {
                section,
                field: (*field).to_string(),
                value: report.get_value(section, field).flatten(),
            });
        }
    }
    rows
}

/// Render the flat view as CSV with a Section,Metric,Value header.
pub fn flat_csv(report: &CanonicalReport) -> String {
    let mut output = String::new();
    output.push_str("Section,Metric,Value\n");
    for row in flat_rows(report) {
        match row.value {
            Some(v) => output.push_str(&format!("{},{},{}\n", row.section, row.field, v)),
            None => output.push_str(&format!("{},{},\n", row.section, row.field)),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_rows_cover_every_field() {
        let report = CanonicalReport::default();
        let rows = flat_rows(&report);

        let expected: usize = Section::ALL.iter().map(|s| s.fields().len()).sum();
        assert_eq!(rows.len(), expected);
        assert!(rows.iter().all(|r| r.value.is_none()));
        assert_eq!(rows[0].section, Section::IncomeStatement);
        assert_eq!(rows[0].field, "revenue");
    }

    #[test]
    fn test_flat_csv_renders_nulls_as_empty_cells() {
        let mut report = CanonicalReport::default();
        report.income_statement.revenue = Some(1000.0);

        let csv = flat_csv(&report);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Section,Metric,Value"));
        assert_eq!(lines.next(), Some("income_statement,revenue,1000"));
        assert_eq!(lines.next(), Some("income_statement,gross_profit,"));
    }
}
