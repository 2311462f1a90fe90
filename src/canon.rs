use crate::coerce::coerce;
use crate::schema::{CanonicalReport, ReportMetadata, ReportUnits, Section};
use serde_json::Value;
use std::collections::BTreeMap;

/// Map a raw field spelling onto its canonical name.
///
/// Lower-cases, replaces spaces with underscores, then applies the fixed
/// synonym table. Spellings with no synonym entry pass through unchanged and
/// are dropped later if they fall outside the section's vocabulary, so the
/// table only needs entries for spellings the sources actually emit.
pub fn canonical_key(raw: &str) -> String {
    let key = raw.trim().to_lowercase().replace(' ', "_");
    match synonym(&key) {
        Some(canonical) => canonical.to_string(),
        None => key,
    }
}

/// Fixed synonym table covering the spellings observed from the live-data
/// provider (collapsed CamelCase row names) and from document extractions
/// (abbreviations, narrative phrasings). Each spelling maps to exactly one
/// canonical name within its section's vocabulary.
fn synonym(key: &str) -> Option<&'static str> {
    Some(match key {
        // income statement
        "total_revenue" | "totalrevenue" | "sales" | "turnover" => "revenue",
        "grossprofit" => "gross_profit",
        "operatingincome" | "ebit" => "operating_income",
        "netincome" | "net_profit" => "net_income",
        "eps" | "basic_eps" => "eps_basic",
        "diluted_eps" => "eps_diluted",

        // balance sheet
        "totalassets" | "assets_total" => "total_assets",
        "total_liab" | "totalliab" | "totalliabilities" => "total_liabilities",
        "equity" | "shareholders_equity" | "totalequity" => "total_equity",
        "shares" | "shares_out" | "sharesoutstanding" => "shares_outstanding",

        // cash flow
        "operating_cash_flow" | "operatingcashflow" | "cash_from_operations" => "operating_cf",
        "investing_cash_flow" | "investingcashflow" => "investing_cf",
        "financing_cash_flow" | "financingcashflow" => "financing_cf",
        "free_cash_flow" | "fcf" => "free_cf",

        // derived ratios
        "net_margin" => "profit_margin",
        "roe" => "return_on_equity",
        "d_to_e" => "debt_to_equity",
        "pe" => "pe_ratio_basic",

        _ => return None,
    })
}

/// Normalize a raw report into the canonical schema.
///
/// For each numeric section: canonicalize every key, coerce every value,
/// then look up each of the section's fixed fields: unknown keys are
/// silently dropped and absent fields become null. Metadata and units pass
/// through structurally without key filtering. Never fails: anything that is
/// not a JSON object (the whole report or an individual section) yields the
/// all-null shape.
pub fn canonicalize(raw: &Value) -> CanonicalReport {
    let mut report = CanonicalReport::default();
    let Some(sections) = raw.as_object() else {
        return report;
    };

    report.metadata = ReportMetadata::from_raw(sections.get("metadata"));
    report.units = ReportUnits::from_raw(sections.get("units"));

    for section in Section::ALL {
        let coerced = coerce_section(sections.get(section.name()));
        report.set_section_fields(section, &coerced);
    }
    report
}

fn coerce_section(raw: Option<&Value>) -> BTreeMap<String, Option<f64>> {
    let mut lookup = BTreeMap::new();
    if let Some(Value::Object(fields)) = raw {
        for (key, value) in fields {
            lookup.insert(canonical_key(key), coerce(value));
        }
    }
    lookup
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_key_synonyms() {
        assert_eq!(canonical_key("Total Revenue"), "revenue");
        assert_eq!(canonical_key("TotalRevenue"), "revenue");
        assert_eq!(canonical_key("EBIT"), "operating_income");
        assert_eq!(canonical_key("ROE"), "return_on_equity");
        assert_eq!(canonical_key("FCF"), "free_cf");
        assert_eq!(canonical_key("Shareholders Equity"), "total_equity");
    }

    #[test]
    fn test_canonical_key_passes_unknown_through() {
        assert_eq!(canonical_key("Research Spend"), "research_spend");
        assert_eq!(canonical_key("revenue"), "revenue");
    }

    #[test]
    fn test_canonical_keys_are_fixed_points() {
        // Canonicalizing an already-canonical report must not change it.
        for section in Section::ALL {
            for field in section.fields() {
                assert_eq!(canonical_key(field), *field);
            }
        }
    }

    #[test]
    fn test_canonicalize_maps_and_coerces() {
        let raw = json!({
            "income_statement": {
                "Total Revenue": "1,000",
                "EBIT": 250,
                "net_income": "100",
                "one_off_items": 5
            },
            "balance_sheet": {"Total Assets": "2,000.5"},
            "cash_flow": {},
            "derived": {}
        });

        let report = canonicalize(&raw);
        assert_eq!(report.income_statement.revenue, Some(1000.0));
        assert_eq!(report.income_statement.operating_income, Some(250.0));
        assert_eq!(report.income_statement.net_income, Some(100.0));
        assert_eq!(report.income_statement.gross_profit, None);
        assert_eq!(report.balance_sheet.total_assets, Some(2000.5));
    }

    #[test]
    fn test_canonicalize_tolerates_garbage_shapes() {
        for raw in [
            json!(null),
            json!("not a report"),
            json!(42),
            json!({"income_statement": "not a mapping"}),
            json!({}),
        ] {
            let report = canonicalize(&raw);
            assert_eq!(report, CanonicalReport::default());
        }
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let raw = json!({
            "metadata": {"ticker": "HVN.AX", "as_of": "2024-06-30", "source": "scrape"},
            "units": {"currency": "AUD", "scale": 1_000_000.0},
            "income_statement": {"Sales": "5,000", "Net Profit": 400},
            "balance_sheet": {"equity": 1200},
            "cash_flow": {"FCF": "350"},
            "derived": {"ROE": "12.5%"}
        });

        let once = canonicalize(&raw);
        let twice = canonicalize(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
        assert_eq!(once.derived.return_on_equity, Some(0.125));
    }

    #[test]
    fn test_metadata_and_units_pass_through() {
        let raw = json!({
            "metadata": {"ticker": "CBA.AX", "period": "FY24"},
            "units": {"currency": "AUD", "scale": "1,000", "basis": "consolidated"}
        });

        let report = canonicalize(&raw);
        assert_eq!(report.metadata.ticker.as_deref(), Some("CBA.AX"));
        assert_eq!(report.metadata.extra.get("period"), Some(&json!("FY24")));
        assert_eq!(report.units.currency.as_deref(), Some("AUD"));
        assert_eq!(report.units.scale, 1000.0);
        assert_eq!(report.units.extra.get("basis"), Some(&json!("consolidated")));
    }
}
