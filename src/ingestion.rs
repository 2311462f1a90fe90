use chrono::Utc;
use serde_json::{json, Map, Value};

/// One row scraped from a statement table: the sticky row label plus the
/// period columns, most recent first. Cell text arrives exactly as rendered
/// ("1,234.5", "—", "N/A"); coercion happens downstream in the
/// canonicalizer.
#[derive(Debug, Clone)]
pub struct ScrapedRow {
    pub label: String,
    pub values: Vec<String>,
}

impl ScrapedRow {
    pub fn new(label: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }

    /// The most recent period's cell, if the row has any.
    fn latest(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

fn rows_to_section(rows: &[ScrapedRow]) -> Value {
    let mut section = Map::new();
    for row in rows {
        // Untitled rows are scraped as a literal "N/A" label; they carry no
        // usable field name.
        if row.label.is_empty() || row.label == "N/A" {
            continue;
        }
        let cell = match row.latest() {
            Some(text) => Value::String(text.to_string()),
            None => Value::Null,
        };
        section.insert(row.label.clone(), cell);
    }
    Value::Object(section)
}

/// Assemble a raw report from scraped statement tables, ready for the
/// canonicalizer. Row labels keep their scraped spellings; the synonym table
/// resolves them later.
pub fn convert_scrape_to_raw(
    ticker: &str,
    income_rows: &[ScrapedRow],
    balance_rows: &[ScrapedRow],
    cash_flow_rows: &[ScrapedRow],
) -> Value {
    json!({
        "metadata": {
            "ticker": ticker,
            "as_of": Utc::now().date_naive().to_string(),
            "source": "live financial tables",
        },
        "units": {"currency": null, "scale": 1},
        "income_statement": rows_to_section(income_rows),
        "balance_sheet": rows_to_section(balance_rows),
        "cash_flow": rows_to_section(cash_flow_rows),
        "derived": {},
    })
}

/// Uppercase a ticker and append the ASX suffix for bare 2-4 character
/// codes; tickers that already carry an exchange suffix pass through.
pub fn normalize_ticker(ticker: &str) -> String {
    let t = ticker.trim().to_uppercase();
    if t.is_empty() || t.contains('.') {
        return t;
    }
    if (2..=4).contains(&t.len()) {
        format!("{}.AX", t)
    } else {
        t
    }
}

/// Guess a ticker from an uploaded report's filename: "HVN_2024_AR.pdf"
/// yields "HVN". The leading token must be 2-5 letters followed by nothing
/// or a `_`/`-`/space separator.
pub fn guess_ticker_from_filename(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    let stem = match base.rfind('.') {
        Some(idx) => &base[..idx],
        None => base,
    };
    let upper = stem.to_uppercase();

    let head_len = upper
        .chars()
        .take_while(|c| c.is_ascii_uppercase())
        .count();
    if !(2..=5).contains(&head_len) {
        return None;
    }
    match upper[head_len..].chars().next() {
        None | Some('_') | Some('-') | Some(' ') => Some(upper[..head_len].to_string()),
        Some(_) => None,
    }
}
