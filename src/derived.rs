use crate::schema::{
    BalanceSheet, CanonicalReport, CashFlow, DerivedMetrics, IncomeStatement, Section,
};
use log::debug;

/// Null-propagating, divide-by-zero-safe division. A missing operand, a zero
/// divisor, or a non-finite quotient all yield null rather than an error.
pub fn safe_div(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => {
            let quotient = n / d;
            quotient.is_finite().then_some(quotient)
        }
        _ => None,
    }
}

/// Free cash flow, backfilled as signed operating + investing cash flow when
/// not reported directly. Investing cash flow is already signed, so no
/// sign-flip is applied; the crate deliberately carries no capex-based
/// variant, since capital expenditure is not part of the canonical
/// vocabulary.
pub fn backfilled_free_cf(cash_flow: &CashFlow) -> Option<f64> {
    cash_flow
        .free_cf
        .or(match (cash_flow.operating_cf, cash_flow.investing_cf) {
            (Some(operating), Some(investing)) => Some(operating + investing),
            _ => None,
        })
}

/// Total equity, backfilled as assets minus liabilities when the source did
/// not report it as its own line.
pub fn backfilled_total_equity(balance: &BalanceSheet) -> Option<f64> {
    balance
        .total_equity
        .or(match (balance.total_assets, balance.total_liabilities) {
            (Some(assets), Some(liabilities)) => Some(assets - liabilities),
            _ => None,
        })
}

/// Compute the full derived-ratio block from primary statement figures.
///
/// Pure and idempotent: inputs are never mutated, and the same inputs always
/// produce the same outputs. Ratios whose operands are missing come out
/// null. Both P/E variants use basic EPS (no independent diluted P/E is
/// computed) and are null when no market price is supplied.
pub fn compute_derived(
    income: &IncomeStatement,
    balance: &BalanceSheet,
    cash_flow: &CashFlow,
    price: Option<f64>,
) -> DerivedMetrics {
    let free_cf = backfilled_free_cf(cash_flow);
    let pe_ratio = safe_div(price, income.eps_basic);

    DerivedMetrics {
        profit_margin: safe_div(income.net_income, income.revenue),
        gross_margin: safe_div(income.gross_profit, income.revenue),
        operating_margin: safe_div(income.operating_income, income.revenue),
        free_cash_flow_margin: safe_div(free_cf, income.revenue),
        return_on_equity: safe_div(income.net_income, balance.total_equity),
        asset_turnover: safe_div(income.revenue, balance.total_assets),
        debt_to_equity: safe_div(balance.total_liabilities, balance.total_equity),
        pe_ratio_basic: pe_ratio,
        pe_ratio_diluted: pe_ratio,
    }
}

/// Backfill statement gaps and fill any still-null derived field in place.
///
/// Fields a source already reported are left untouched, so the provenance
/// recorded during reconciliation stays truthful; only gaps neither source
/// covered are computed here.
pub fn fill_missing_derived(report: &mut CanonicalReport, price: Option<f64>) {
    if report.balance_sheet.total_equity.is_none() {
        report.balance_sheet.total_equity = backfilled_total_equity(&report.balance_sheet);
    }
    if report.cash_flow.free_cf.is_none() {
        report.cash_flow.free_cf = backfilled_free_cf(&report.cash_flow);
    }

    let computed = compute_derived(
        &report.income_statement,
        &report.balance_sheet,
        &report.cash_flow,
        price,
    );

    let derived = &mut report.derived;
    derived.profit_margin = derived.profit_margin.or(computed.profit_margin);
    derived.gross_margin = derived.gross_margin.or(computed.gross_margin);
    derived.operating_margin = derived.operating_margin.or(computed.operating_margin);
    derived.free_cash_flow_margin = derived
        .free_cash_flow_margin
        .or(computed.free_cash_flow_margin);
    derived.return_on_equity = derived.return_on_equity.or(computed.return_on_equity);
    derived.asset_turnover = derived.asset_turnover.or(computed.asset_turnover);
    derived.debt_to_equity = derived.debt_to_equity.or(computed.debt_to_equity);
    derived.pe_ratio_basic = derived.pe_ratio_basic.or(computed.pe_ratio_basic);
    derived.pe_ratio_diluted = derived.pe_ratio_diluted.or(computed.pe_ratio_diluted);

    let still_missing = report
        .missing_fields()
        .iter()
        .filter(|(section, _)| *section == Section::Derived)
        .count();
    debug!(
        "derived block after backfill: {} of {} ratios populated",
        DerivedMetrics::FIELDS.len() - still_missing,
        DerivedMetrics::FIELDS.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(Some(10.0), Some(2.0)), Some(5.0));
        assert_eq!(safe_div(Some(10.0), Some(0.0)), None);
        assert_eq!(safe_div(None, Some(5.0)), None);
        assert_eq!(safe_div(Some(5.0), None), None);
        assert_eq!(safe_div(None, None), None);
    }

    #[test]
    fn test_margin_and_roe_scenario() {
        let income = IncomeStatement {
            net_income: Some(50.0),
            revenue: Some(200.0),
            ..Default::default()
        };
        let balance = BalanceSheet {
            total_equity: Some(250.0),
            ..Default::default()
        };
        let derived = compute_derived(&income, &balance, &CashFlow::default(), None);

        assert_eq!(derived.profit_margin, Some(0.25));
        assert_eq!(derived.return_on_equity, Some(0.2));
        assert_eq!(derived.gross_margin, None);
        assert_eq!(derived.pe_ratio_basic, None);
    }

    #[test]
    fn test_free_cf_signed_sum_backfill() {
        let cash_flow = CashFlow {
            operating_cf: Some(500.0),
            investing_cf: Some(-150.0),
            ..Default::default()
        };
        assert_eq!(backfilled_free_cf(&cash_flow), Some(350.0));

        let reported = CashFlow {
            free_cf: Some(400.0),
            ..cash_flow
        };
        assert_eq!(backfilled_free_cf(&reported), Some(400.0));

        let partial = CashFlow {
            operating_cf: Some(500.0),
            ..Default::default()
        };
        assert_eq!(backfilled_free_cf(&partial), None);
    }

    #[test]
    fn test_equity_backfill() {
        let balance = BalanceSheet {
            total_assets: Some(2000.0),
            total_liabilities: Some(800.0),
            ..Default::default()
        };
        assert_eq!(backfilled_total_equity(&balance), Some(1200.0));
    }

    #[test]
    fn test_pe_uses_basic_eps_for_both_variants() {
        let income = IncomeStatement {
            eps_basic: Some(2.0),
            eps_diluted: Some(1.9),
            ..Default::default()
        };
        let derived =
            compute_derived(&income, &BalanceSheet::default(), &CashFlow::default(), Some(30.0));
        assert_eq!(derived.pe_ratio_basic, Some(15.0));
        assert_eq!(derived.pe_ratio_diluted, Some(15.0));
    }

    #[test]
    fn test_fill_missing_derived_preserves_reported_ratios() {
        let mut report = CanonicalReport::default();
        report.income_statement.net_income = Some(50.0);
        report.income_statement.revenue = Some(200.0);
        // A source reported its own (different) margin; it must survive.
        report.derived.profit_margin = Some(0.3);

        fill_missing_derived(&mut report, None);

        assert_eq!(report.derived.profit_margin, Some(0.3));
        assert_eq!(report.derived.asset_turnover, None);
    }

    #[test]
    fn test_fill_missing_derived_is_idempotent() {
        let mut report = CanonicalReport::default();
        report.income_statement.revenue = Some(1000.0);
        report.income_statement.net_income = Some(100.0);
        report.cash_flow.operating_cf = Some(300.0);
        report.cash_flow.investing_cf = Some(-100.0);

        fill_missing_derived(&mut report, None);
        let once = report.clone();
        fill_missing_derived(&mut report, None);

        assert_eq!(report, once);
        assert_eq!(report.cash_flow.free_cf, Some(200.0));
        assert_eq!(report.derived.free_cash_flow_margin, Some(0.2));
    }
}
