use chrono::Utc;

/// Upper bound on the text handed to the model per request; longer
/// documents are split into page-tagged chunks.
pub const CHUNK_MAX_CHARS: usize = 40_000;

pub const SCHEMA_INSTRUCTIONS: &str = r#"Return ONLY a JSON object with these exact keys: metadata, units, income_statement, balance_sheet, cash_flow, derived.
metadata: {ticker (string|null), as_of (YYYY-MM-DD), source (string path)}
units: {currency (e.g., AUD/USD) or null, scale (1/1000/1000000/1000000000)}
income_statement: {revenue, gross_profit, operating_income, net_income, eps_basic, eps_diluted}
balance_sheet: {total_assets, total_liabilities, total_equity, shares_outstanding}
cash_flow: {operating_cf, investing_cf, financing_cf, free_cf}
derived: {
  pe_ratio_basic, pe_ratio_diluted, profit_margin, return_on_equity,
  gross_margin, operating_margin, debt_to_equity, asset_turnover, free_cash_flow_margin
}
Rules: use latest annual consolidated figures; apply scaling units to totals (not EPS);
numbers only; if unknown or missing -> null.
"#;

/// Appended to the prompt when the previous response failed to parse.
pub const RETRY_SUFFIX: &str =
    "\nYour previous JSON was invalid. Return EXACT keys with values or null.";

/// Concatenate page texts into chunks no longer than `max_chars`, tagging
/// each page so the model can cite where a figure came from. A single page
/// longer than the limit still becomes its own chunk rather than being
/// truncated.
pub fn chunk_pages(pages: &[String], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    for (i, page) in pages.iter().enumerate() {
        let tag = format!("\n\n[PAGE {}]\n", i + 1);
        if !buf.is_empty() && buf.len() + tag.len() + page.len() > max_chars {
            chunks.push(std::mem::take(&mut buf));
        }
        buf.push_str(&tag);
        buf.push_str(page);
    }
    if !buf.is_empty() {
        chunks.push(buf);
    }
    chunks
}

/// Build the extraction prompt for one chunk of report text.
pub fn build_prompt(chunk: &str, ticker: Option<&str>, source: &str) -> String {
    let today = Utc::now().date_naive();
    let ticker_repr = match ticker {
        Some(t) => format!("'{}'", t),
        None => "null".to_string(),
    };
    format!(
        "Extract the schema below from the report text.\n\n{}\n\
         Assume ticker={}. Use as_of='{}'. Set source='{}'.\n\n\
         TEXT START\n{}\nTEXT END\n",
        SCHEMA_INSTRUCTIONS, ticker_repr, today, source, chunk
    )
}
