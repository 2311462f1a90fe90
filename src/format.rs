use crate::schema::{CanonicalReport, Section, DEFAULT_SCALE};

/// Placeholder rendered for null values, matching the dashes financial
/// tables print for absent figures.
const NULL_DISPLAY: &str = "—";

/// Fields that are quoted per share or as a raw count and therefore never
/// divided by `units.scale`.
const UNSCALED_FIELDS: [&str; 3] = ["eps_basic", "eps_diluted", "shares_outstanding"];

fn group_thousands(integral: &str) -> String {
    let (sign, digits) = match integral.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integral),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}", sign, grouped)
}

/// "1234567.891" -> "1,234,567.89".
fn with_separators(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    match fixed.split_once('.') {
        Some((integral, fraction)) => format!("{}.{}", group_thousands(integral), fraction),
        None => group_thousands(&fixed),
    }
}

/// Format a plain number with two decimals, or the null placeholder.
pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) => with_separators(v),
        None => NULL_DISPLAY.to_string(),
    }
}

/// Format a decimal fraction as a percentage.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => NULL_DISPLAY.to_string(),
    }
}

/// Format a leverage-style ratio with an "x" suffix.
pub fn format_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}x", with_separators(v)),
        None => NULL_DISPLAY.to_string(),
    }
}

/// Format a monetary total: divide by the display scale, prefix the
/// currency, and note the scale in words where it has one.
pub fn format_currency(value: Option<f64>, currency: Option<&str>, scale: f64) -> String {
    let Some(v) = value else {
        return NULL_DISPLAY.to_string();
    };
    let divisor = if scale == 0.0 { DEFAULT_SCALE } else { scale };
    let suffix = if divisor == 1_000_000.0 {
        " (in millions)".to_string()
    } else if divisor == DEFAULT_SCALE {
        String::new()
    } else {
        format!(" (÷{})", group_thousands(&format!("{}", divisor as i64)))
    };
    let prefix = match currency {
        Some(c) if !c.is_empty() => format!("{} ", c),
        _ => String::new(),
    };
    format!("{}{}{}", prefix, with_separators(v / divisor), suffix)
}

fn format_field(report: &CanonicalReport, section: Section, field: &str) -> String {
    let value = report.get_value(section, field).flatten();
    if UNSCALED_FIELDS.contains(&field) {
        return format_number(value);
    }
    match section {
        Section::Derived => match field {
            "pe_ratio_basic" | "pe_ratio_diluted" => format_number(value),
            "debt_to_equity" => format_ratio(value),
            _ => format_percent(value),
        },
        _ => format_currency(value, report.units.currency.as_deref(), report.units.scale),
    }
}

fn title_case(field: &str) -> String {
    field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a whole report as markdown for quick inspection.
pub fn report_to_markdown(report: &CanonicalReport) -> String {
    let meta = &report.metadata;
    let mut output = format!(
        "# {} — as of {}\n\nSource: {}\n\n",
        meta.ticker.as_deref().unwrap_or(NULL_DISPLAY),
        meta.as_of.as_deref().unwrap_or(NULL_DISPLAY),
        meta.source.as_deref().unwrap_or(NULL_DISPLAY),
    );

    for section in Section::ALL {
        output.push_str(&format!("## {}\n\n", title_case(section.name())));
        for field in section.fields() {
            output.push_str(&format!(
                "- {}: {}\n",
                title_case(field),
                format_field(report, section, field)
            ));
        }
        output.push('\n');
    }
    output
}
