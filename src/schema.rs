use crate::coerce::coerce;
use crate::error::{ReconcileError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Scale divisor meaning "figures are reported as-is".
pub const DEFAULT_SCALE: f64 = 1.0;

/// The four numeric sections of a canonical report, in the fixed order used
/// for provenance tables and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    Derived,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::IncomeStatement,
        Section::BalanceSheet,
        Section::CashFlow,
        Section::Derived,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Section::IncomeStatement => "income_statement",
            Section::BalanceSheet => "balance_sheet",
            Section::CashFlow => "cash_flow",
            Section::Derived => "derived",
        }
    }

    /// The canonical field vocabulary of this section. Every canonical report
    /// carries exactly these fields, each a number or null.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Section::IncomeStatement => &IncomeStatement::FIELDS,
            Section::BalanceSheet => &BalanceSheet::FIELDS,
            Section::CashFlow => &CashFlow::FIELDS,
            Section::Derived => &DerivedMetrics::FIELDS,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportMetadata {
    #[schemars(description = "Exchange ticker symbol, e.g. 'HVN.AX', or null if unknown")]
    pub ticker: Option<String>,

    #[schemars(description = "Date the report was assembled, YYYY-MM-DD")]
    pub as_of: Option<String>,

    #[schemars(description = "Where the figures came from, e.g. a provider name or document path")]
    pub source: Option<String>,

    /// Additional metadata keys are carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReportMetadata {
    pub(crate) fn from_raw(raw: Option<&Value>) -> Self {
        let mut meta = ReportMetadata::default();
        let Some(Value::Object(fields)) = raw else {
            return meta;
        };
        for (key, value) in fields {
            match (key.as_str(), value.as_str()) {
                ("ticker", Some(s)) => meta.ticker = Some(s.to_string()),
                ("as_of", Some(s)) => meta.as_of = Some(s.to_string()),
                ("source", Some(s)) => meta.source = Some(s.to_string()),
                // Null or non-string values for the typed keys carry nothing
                // usable; keeping them in `extra` would duplicate the key on
                // serialization.
                ("ticker" | "as_of" | "source", None) => {}
                _ => {
                    meta.extra.insert(key.clone(), value.clone());
                }
            }
        }
        meta
    }

    /// Shallow merge: the primary's keys override the secondary's, and the
    /// secondary supplies defaults where the primary has none.
    pub(crate) fn merged_over(primary: &Self, secondary: &Self) -> Self {
        let mut merged = secondary.clone();
        if primary.ticker.is_some() {
            merged.ticker = primary.ticker.clone();
        }
        if primary.as_of.is_some() {
            merged.as_of = primary.as_of.clone();
        }
        if primary.source.is_some() {
            merged.source = primary.source.clone();
        }
        for (key, value) in &primary.extra {
            merged.extra.insert(key.clone(), value.clone());
        }
        merged
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportUnits {
    #[schemars(description = "ISO currency code the monetary figures are denominated in, e.g. 'AUD', or null")]
    pub currency: Option<String>,

    #[schemars(
        description = "Divisor applied to monetary totals for display (1, 1000, 1000000, 1000000000). Never applied to per-share or share-count fields."
    )]
    pub scale: f64,

    /// Additional unit keys are carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ReportUnits {
    fn default() -> Self {
        Self {
            currency: None,
            scale: DEFAULT_SCALE,
            extra: Map::new(),
        }
    }
}

impl ReportUnits {
    pub(crate) fn from_raw(raw: Option<&Value>) -> Self {
        let mut units = ReportUnits::default();
        let Some(Value::Object(fields)) = raw else {
            return units;
        };
        for (key, value) in fields {
            match key.as_str() {
                // Providers render "no currency" as an empty string; treat
                // it as absent so it never wins precedence over a real code.
                "currency" => {
                    units.currency = value
                        .as_str()
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                }
                "scale" => units.scale = coerce(value).unwrap_or(DEFAULT_SCALE),
                _ => {
                    units.extra.insert(key.clone(), value.clone());
                }
            }
        }
        units
    }

    /// Currency: primary's if present, else secondary's. Scale: primary's if
    /// set to something other than the unset default, else secondary's, else
    /// the default.
    pub(crate) fn merged_over(primary: &Self, secondary: &Self) -> Self {
        let mut extra = secondary.extra.clone();
        for (key, value) in &primary.extra {
            extra.insert(key.clone(), value.clone());
        }
        Self {
            currency: primary
                .currency
                .clone()
                .or_else(|| secondary.currency.clone()),
            scale: if primary.scale != DEFAULT_SCALE {
                primary.scale
            } else if secondary.scale != DEFAULT_SCALE {
                secondary.scale
            } else {
                DEFAULT_SCALE
            },
            extra,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct IncomeStatement {
    #[schemars(description = "Total revenue for the latest annual period; scaled by units.scale")]
    pub revenue: Option<f64>,

    #[schemars(description = "Revenue less cost of sales; scaled by units.scale")]
    pub gross_profit: Option<f64>,

    #[schemars(description = "Operating income (EBIT); scaled by units.scale")]
    pub operating_income: Option<f64>,

    #[schemars(description = "Net income attributable to shareholders; scaled by units.scale")]
    pub net_income: Option<f64>,

    #[schemars(description = "Basic earnings per share; never scaled")]
    pub eps_basic: Option<f64>,

    #[schemars(description = "Diluted earnings per share; never scaled")]
    pub eps_diluted: Option<f64>,
}

impl IncomeStatement {
    pub const FIELDS: [&'static str; 6] = [
        "revenue",
        "gross_profit",
        "operating_income",
        "net_income",
        "eps_basic",
        "eps_diluted",
    ];

    fn get(&self, field: &str) -> Option<Option<f64>> {
        match field {
            "revenue" => Some(self.revenue),
            "gross_profit" => Some(self.gross_profit),
            "operating_income" => Some(self.operating_income),
            "net_income" => Some(self.net_income),
            "eps_basic" => Some(self.eps_basic),
            "eps_diluted" => Some(self.eps_diluted),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Option<f64>) -> bool {
        match field {
            "revenue" => self.revenue = value,
            "gross_profit" => self.gross_profit = value,
            "operating_income" => self.operating_income = value,
            "net_income" => self.net_income = value,
            "eps_basic" => self.eps_basic = value,
            "eps_diluted" => self.eps_diluted = value,
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BalanceSheet {
    #[schemars(description = "Total assets; scaled by units.scale")]
    pub total_assets: Option<f64>,

    #[schemars(description = "Total liabilities; scaled by units.scale")]
    pub total_liabilities: Option<f64>,

    #[schemars(description = "Total shareholders' equity; scaled by units.scale")]
    pub total_equity: Option<f64>,

    #[schemars(description = "Shares on issue; never scaled")]
    pub shares_outstanding: Option<f64>,
}

impl BalanceSheet {
    pub const FIELDS: [&'static str; 4] = [
        "total_assets",
        "total_liabilities",
        "total_equity",
        "shares_outstanding",
    ];

    fn get(&self, field: &str) -> Option<Option<f64>> {
        match field {
            "total_assets" => Some(self.total_assets),
            "total_liabilities" => Some(self.total_liabilities),
            "total_equity" => Some(self.total_equity),
            "shares_outstanding" => Some(self.shares_outstanding),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Option<f64>) -> bool {
        match field {
            "total_assets" => self.total_assets = value,
            "total_liabilities" => self.total_liabilities = value,
            "total_equity" => self.total_equity = value,
            "shares_outstanding" => self.shares_outstanding = value,
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CashFlow {
    #[schemars(description = "Net cash from operating activities; scaled by units.scale")]
    pub operating_cf: Option<f64>,

    #[schemars(description = "Net cash from investing activities, signed; scaled by units.scale")]
    pub investing_cf: Option<f64>,

    #[schemars(description = "Net cash from financing activities, signed; scaled by units.scale")]
    pub financing_cf: Option<f64>,

    #[schemars(description = "Free cash flow; scaled by units.scale")]
    pub free_cf: Option<f64>,
}

impl CashFlow {
    pub const FIELDS: [&'static str; 4] =
        ["operating_cf", "investing_cf", "financing_cf", "free_cf"];

    fn get(&self, field: &str) -> Option<Option<f64>> {
        match field {
            "operating_cf" => Some(self.operating_cf),
            "investing_cf" => Some(self.investing_cf),
            "financing_cf" => Some(self.financing_cf),
            "free_cf" => Some(self.free_cf),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Option<f64>) -> bool {
        match field {
            "operating_cf" => self.operating_cf = value,
            "investing_cf" => self.investing_cf = value,
            "financing_cf" => self.financing_cf = value,
            "free_cf" => self.free_cf = value,
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DerivedMetrics {
    #[schemars(description = "Net income / revenue, as a decimal fraction")]
    pub profit_margin: Option<f64>,

    #[schemars(description = "Gross profit / revenue, as a decimal fraction")]
    pub gross_margin: Option<f64>,

    #[schemars(description = "Operating income / revenue, as a decimal fraction")]
    pub operating_margin: Option<f64>,

    #[schemars(description = "Free cash flow / revenue, as a decimal fraction")]
    pub free_cash_flow_margin: Option<f64>,

    #[schemars(description = "Net income / total equity, as a decimal fraction")]
    pub return_on_equity: Option<f64>,

    #[schemars(description = "Revenue / total assets")]
    pub asset_turnover: Option<f64>,

    #[schemars(description = "Total liabilities / total equity")]
    pub debt_to_equity: Option<f64>,

    #[schemars(description = "Share price / basic EPS, or null when no price is available")]
    pub pe_ratio_basic: Option<f64>,

    #[schemars(description = "Share price / basic EPS, or null when no price is available")]
    pub pe_ratio_diluted: Option<f64>,
}

impl DerivedMetrics {
    pub const FIELDS: [&'static str; 9] = [
        "profit_margin",
        "gross_margin",
        "operating_margin",
        "free_cash_flow_margin",
        "return_on_equity",
        "asset_turnover",
        "debt_to_equity",
        "pe_ratio_basic",
        "pe_ratio_diluted",
    ];

    fn get(&self, field: &str) -> Option<Option<f64>> {
        match field {
            "profit_margin" => Some(self.profit_margin),
            "gross_margin" => Some(self.gross_margin),
            "operating_margin" => Some(self.operating_margin),
            "free_cash_flow_margin" => Some(self.free_cash_flow_margin),
            "return_on_equity" => Some(self.return_on_equity),
            "asset_turnover" => Some(self.asset_turnover),
            "debt_to_equity" => Some(self.debt_to_equity),
            "pe_ratio_basic" => Some(self.pe_ratio_basic),
            "pe_ratio_diluted" => Some(self.pe_ratio_diluted),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Option<f64>) -> bool {
        match field {
            "profit_margin" => self.profit_margin = value,
            "gross_margin" => self.gross_margin = value,
            "operating_margin" => self.operating_margin = value,
            "free_cash_flow_margin" => self.free_cash_flow_margin = value,
            "return_on_equity" => self.return_on_equity = value,
            "asset_turnover" => self.asset_turnover = value,
            "debt_to_equity" => self.debt_to_equity = value,
            "pe_ratio_basic" => self.pe_ratio_basic = value,
            "pe_ratio_diluted" => self.pe_ratio_diluted = value,
            _ => return false,
        }
        true
    }
}

/// The canonical report every source is normalized into. Each numeric section
/// always carries all of its canonical fields; absent data is null, never a
/// missing key. Serializes directly to the five-top-level-key JSON layout
/// callers persist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CanonicalReport {
    pub metadata: ReportMetadata,
    pub units: ReportUnits,
    pub income_statement: IncomeStatement,
    pub balance_sheet: BalanceSheet,
    pub cash_flow: CashFlow,
    pub derived: DerivedMetrics,
}

impl CanonicalReport {
    /// Look up a field by section and name.
    ///
    /// Requesting a field outside the fixed vocabulary is a caller bug, not a
    /// data condition, and fails fast with `UnknownField`.
    pub fn field(&self, section: Section, field: &str) -> Result<Option<f64>> {
        self.get_value(section, field)
            .ok_or_else(|| ReconcileError::UnknownField {
                section,
                field: field.to_string(),
            })
    }

    /// Total lookup used by internal iteration over `Section::fields()`,
    /// where the field name is known to be canonical.
    pub(crate) fn get_value(&self, section: Section, field: &str) -> Option<Option<f64>> {
        match section {
            Section::IncomeStatement => self.income_statement.get(field),
            Section::BalanceSheet => self.balance_sheet.get(field),
            Section::CashFlow => self.cash_flow.get(field),
            Section::Derived => self.derived.get(field),
        }
    }

    pub(crate) fn set_value(&mut self, section: Section, field: &str, value: Option<f64>) {
        let known = match section {
            Section::IncomeStatement => self.income_statement.set(field, value),
            Section::BalanceSheet => self.balance_sheet.set(field, value),
            Section::CashFlow => self.cash_flow.set(field, value),
            Section::Derived => self.derived.set(field, value),
        };
        debug_assert!(known, "set_value called with unknown field '{}'", field);
    }

    /// Populate one section from a coerced lookup table: every canonical
    /// field is looked up by name, and names outside the vocabulary are
    /// dropped by never being looked up.
    pub(crate) fn set_section_fields(
        &mut self,
        section: Section,
        lookup: &BTreeMap<String, Option<f64>>,
    ) {
        for field in section.fields() {
            let value = lookup.get(*field).copied().flatten();
            self.set_value(section, field, value);
        }
    }

    /// True if any section still has a null field. Used to decide whether a
    /// secondary source is worth consulting at all.
    pub fn has_missing_fields(&self) -> bool {
        Section::ALL.iter().any(|section| {
            section
                .fields()
                .iter()
                .any(|field| self.get_value(*section, field) == Some(None))
        })
    }

    /// Every (section, field) pair that is currently null.
    pub fn missing_fields(&self) -> Vec<(Section, &'static str)> {
        let mut missing = Vec::new();
        for section in Section::ALL {
            for field in section.fields() {
                if self.get_value(section, field) == Some(None) {
                    missing.push((section, *field));
                }
            }
        }
        missing
    }

    /// Fill null numeric fields from `other`, leaving populated fields
    /// untouched. Units follow the same precedence as reconciliation;
    /// metadata is left alone. This is the accumulation step used when a
    /// document is extracted chunk by chunk.
    pub fn fill_missing_from(&mut self, other: &CanonicalReport) {
        for section in Section::ALL {
            for field in section.fields() {
                if self.get_value(section, field) == Some(None) {
                    if let Some(Some(value)) = other.get_value(section, field) {
                        self.set_value(section, field, Some(value));
                    }
                }
            }
        }
        if self.units.currency.is_none() {
            self.units.currency = other.units.currency.clone();
        }
        if self.units.scale == DEFAULT_SCALE && other.units.scale != DEFAULT_SCALE {
            self.units.scale = other.units.scale;
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CanonicalReport)
    }

    /// The stable JSON Schema handed to document-extraction models.
    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_report_serializes_all_keys() {
        let report = CanonicalReport::default();
        let json = serde_json::to_value(&report).unwrap();

        for section in Section::ALL {
            let block = json.get(section.name()).unwrap().as_object().unwrap();
            for field in section.fields() {
                assert!(block.contains_key(*field), "missing {}", field);
                assert!(block.get(*field).unwrap().is_null());
            }
            assert_eq!(block.len(), section.fields().len());
        }
    }

    #[test]
    fn test_field_lookup_fails_fast_on_unknown_field() {
        let report = CanonicalReport::default();
        assert!(report.field(Section::IncomeStatement, "revenue").is_ok());
        assert!(report.field(Section::IncomeStatement, "ebitda").is_err());
    }

    #[test]
    fn test_has_missing_fields() {
        let mut report = CanonicalReport::default();
        assert!(report.has_missing_fields());
        assert_eq!(report.missing_fields().len(), 23);

        for section in Section::ALL {
            for field in section.fields() {
                report.set_value(section, field, Some(1.0));
            }
        }
        assert!(!report.has_missing_fields());
        assert!(report.missing_fields().is_empty());
    }

    #[test]
    fn test_fill_missing_from_never_overwrites() {
        let mut base = CanonicalReport::default();
        base.income_statement.revenue = Some(100.0);
        base.units.scale = 1_000_000.0;

        let mut other = CanonicalReport::default();
        other.income_statement.revenue = Some(999.0);
        other.income_statement.net_income = Some(10.0);
        other.units.currency = Some("AUD".to_string());
        other.units.scale = 1_000.0;

        base.fill_missing_from(&other);

        assert_eq!(base.income_statement.revenue, Some(100.0));
        assert_eq!(base.income_statement.net_income, Some(10.0));
        assert_eq!(base.units.currency.as_deref(), Some("AUD"));
        assert_eq!(base.units.scale, 1_000_000.0);
    }

    #[test]
    fn test_metadata_extra_keys_survive_round_trip() {
        let raw = serde_json::json!({
            "ticker": "HVN.AX",
            "as_of": "2024-06-30",
            "fiscal_year": 2024
        });
        let meta = ReportMetadata::from_raw(Some(&raw));
        assert_eq!(meta.ticker.as_deref(), Some("HVN.AX"));
        assert_eq!(meta.extra.get("fiscal_year"), Some(&serde_json::json!(2024)));

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json.get("fiscal_year"), Some(&serde_json::json!(2024)));
    }

    #[test]
    fn test_units_merge_precedence() {
        let primary = ReportUnits {
            currency: None,
            scale: DEFAULT_SCALE,
            extra: Map::new(),
        };
        let secondary = ReportUnits {
            currency: Some("USD".to_string()),
            scale: 1_000.0,
            extra: Map::new(),
        };

        let merged = ReportUnits::merged_over(&primary, &secondary);
        assert_eq!(merged.currency.as_deref(), Some("USD"));
        assert_eq!(merged.scale, 1_000.0);

        let primary = ReportUnits {
            currency: Some("AUD".to_string()),
            scale: 1_000_000.0,
            extra: Map::new(),
        };
        let merged = ReportUnits::merged_over(&primary, &secondary);
        assert_eq!(merged.currency.as_deref(), Some("AUD"));
        assert_eq!(merged.scale, 1_000_000.0);
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = CanonicalReport::schema_as_json().unwrap();
        assert!(schema_json.contains("income_statement"));
        assert!(schema_json.contains("shares_outstanding"));
        assert!(schema_json.contains("pe_ratio_diluted"));
    }
}
