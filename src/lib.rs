//! # Financial Report Reconciler
//!
//! A library for normalizing financial-report data from two independent
//! sources (live scraped market data, and LLM extraction from PDF
//! documents) into a single canonical schema, and reconciling the two field
//! by field with per-field provenance.
//!
//! ## Core Concepts
//!
//! - **Raw Report**: a loosely-typed JSON mapping from an external source,
//!   with unconstrained key spellings and string/number values
//! - **Canonical Report**: the strict typed schema every source is
//!   normalized into; absent data is null, never a missing key
//! - **Primary/Secondary Source**: live structured data is trusted first;
//!   the document-derived report exists to patch its gaps
//! - **Provenance**: a per-field record of what each source reported and
//!   which value was chosen
//! - **Derived Metrics**: margins, returns, turnover, leverage and P/E,
//!   computed with null-propagating safe division
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_report_reconciler::*;
//! use serde_json::json;
//!
//! let primary = json!({
//!     "income_statement": {"TotalRevenue": "1,000"},
//! });
//! let secondary = json!({
//!     "income_statement": {"net_income": "100"},
//! });
//!
//! let assembled = ReportAssembler::new()
//!     .with_price(30.0)
//!     .assemble(&primary, Some(&secondary));
//!
//! assert_eq!(assembled.report.income_statement.revenue, Some(1000.0));
//! ```

pub mod canon;
pub mod coerce;
pub mod derived;
pub mod error;
pub mod export;
pub mod format;
pub mod ingestion;
pub mod reconcile;
pub mod schema;

#[cfg(feature = "llm")]
pub mod llm;

pub use canon::{canonical_key, canonicalize};
pub use coerce::{coerce, coerce_str};
pub use derived::{
    backfilled_free_cf, backfilled_total_equity, compute_derived, fill_missing_derived, safe_div,
};
pub use error::{ReconcileError, Result};
pub use export::{flat_csv, flat_rows, FlatRow};
pub use format::{format_currency, format_number, format_percent, format_ratio, report_to_markdown};
pub use ingestion::*;
pub use reconcile::{
    missing_count, provenance_to_csv, provenance_to_markdown, reconcile, reconcile_canonical,
    ChosenSource, ProvenanceRecord,
};
pub use schema::*;

use log::{debug, info};
use serde_json::Value;

/// The outcome of a full assembly run: the reconciled report, the complete
/// provenance table, and whether the secondary source was actually
/// consulted.
#[derive(Debug, Clone)]
pub struct AssembledReport {
    pub report: CanonicalReport,
    pub provenance: Vec<ProvenanceRecord>,
    pub consulted_secondary: bool,
}

/// Orchestrates the primary-first pipeline: canonicalize the primary source,
/// consult the secondary only when the primary has gaps, reconcile with
/// provenance, then backfill statement math and still-missing derived
/// ratios.
#[derive(Debug, Clone, Default)]
pub struct ReportAssembler {
    price: Option<f64>,
    ticker: Option<String>,
}

impl ReportAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Market price used for the P/E ratios; absent by default.
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Stamp a caller-resolved ticker into the final report's metadata,
    /// overriding whatever the sources carried.
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn assemble(&self, primary_raw: &Value, secondary_raw: Option<&Value>) -> AssembledReport {
        let primary = canonicalize(primary_raw);
        info!(
            "assembling report for {}",
            primary.metadata.ticker.as_deref().unwrap_or("<no ticker>")
        );

        let consult = primary.has_missing_fields();
        if !consult {
            debug!("primary source is complete; secondary not consulted");
        }

        let secondary = match secondary_raw {
            Some(raw) if consult => canonicalize(raw),
            _ => CanonicalReport::default(),
        };
        let consulted_secondary = consult && secondary_raw.is_some();

        let (mut report, provenance) = reconcile_canonical(&primary, &secondary);

        fill_missing_derived(&mut report, self.price);

        if let Some(ticker) = &self.ticker {
            report.metadata.ticker = Some(ticker.clone());
        }

        debug!(
            "assembled report: {} field(s) available from neither source",
            missing_count(&provenance)
        );

        AssembledReport {
            report,
            provenance,
            consulted_secondary,
        }
    }
}

/// True if the report still has gaps a secondary source could fill. The
/// gating decision is a cost control, not a correctness check.
pub fn is_incomplete(report: &CanonicalReport) -> bool {
    report.has_missing_fields()
}

/// One-shot wrapper around [`ReportAssembler`] for callers without a price
/// or ticker override.
pub fn assemble_report(primary_raw: &Value, secondary_raw: Option<&Value>) -> AssembledReport {
    ReportAssembler::new().assemble(primary_raw, secondary_raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_end_to_end_assembly() {
        let primary = json!({
            "income_statement": {"TotalRevenue": "1,000"},
            "balance_sheet": {},
            "cash_flow": {},
            "derived": {}
        });
        let secondary = json!({
            "income_statement": {"net_income": "100"}
        });

        let assembled = ReportAssembler::new().assemble(&primary, Some(&secondary));

        let income = &assembled.report.income_statement;
        assert_eq!(income.revenue, Some(1000.0));
        assert_eq!(income.net_income, Some(100.0));
        assert_eq!(income.gross_profit, None);
        assert_eq!(income.operating_income, None);
        assert_eq!(income.eps_basic, None);
        assert_eq!(income.eps_diluted, None);

        assert!(assembled.consulted_secondary);

        let revenue = assembled
            .provenance
            .iter()
            .find(|r| r.field == "revenue")
            .unwrap();
        assert_eq!(revenue.source, ChosenSource::Primary);

        let net_income = assembled
            .provenance
            .iter()
            .find(|r| r.field == "net_income")
            .unwrap();
        assert_eq!(net_income.source, ChosenSource::Secondary);

        // Derived backfill from the merged statements.
        assert_eq!(assembled.report.derived.profit_margin, Some(0.1));
    }

    #[test]
    fn test_complete_primary_skips_secondary() {
        let mut full = CanonicalReport::default();
        for section in Section::ALL {
            for field in section.fields() {
                full.set_value(section, field, Some(1.0));
            }
        }
        let primary = serde_json::to_value(&full).unwrap();
        let secondary = json!({"income_statement": {"revenue": 999}});

        let assembled = ReportAssembler::new().assemble(&primary, Some(&secondary));
        assert!(!assembled.consulted_secondary);
        assert_eq!(assembled.report.income_statement.revenue, Some(1.0));
    }

    #[test]
    fn test_ticker_override_and_price() {
        let primary = json!({
            "metadata": {"ticker": "HVN"},
            "income_statement": {"eps_basic": 2.0}
        });

        let assembled = ReportAssembler::new()
            .with_price(30.0)
            .with_ticker("HVN.AX")
            .assemble(&primary, None);

        assert_eq!(assembled.report.metadata.ticker.as_deref(), Some("HVN.AX"));
        assert_eq!(assembled.report.derived.pe_ratio_basic, Some(15.0));
        assert_eq!(assembled.report.derived.pe_ratio_diluted, Some(15.0));
        assert!(!assembled.consulted_secondary);
    }

    #[test]
    fn test_absent_sources_yield_all_null_report() {
        let assembled = assemble_report(&json!(null), None);
        assert!(is_incomplete(&assembled.report));
        assert_eq!(missing_count(&assembled.provenance), 23);
    }
}
