use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::LineItemInput;
use crate::money::{percent_of, round_currency, AMOUNT_TOO_LARGE};
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl InvoiceTotals {
    pub fn rounded(&self) -> Self {
        Self {
            subtotal: round_currency(self.subtotal),
            tax: round_currency(self.tax),
            total: round_currency(self.total),
        }
    }
}

/// `quantity * rate`, or `None` when the product overflows.
pub fn line_amount(quantity: Decimal, rate: Decimal) -> Option<Decimal> {
    quantity.checked_mul(rate)
}

/// Tax owed on one line, where `tax_percent` is a percentage of the amount.
pub fn line_tax(amount: Decimal, tax_percent: Option<Decimal>) -> Option<Decimal> {
    match tax_percent {
        Some(pct) => percent_of(amount, pct),
        None => Some(Decimal::ZERO),
    }
}

/// Sums `(amount, tax_percent)` pairs into invoice totals. `None` when a
/// line's tax or a running total overflows.
pub fn invoice_totals<I>(lines: I) -> Option<InvoiceTotals>
where
    I: IntoIterator<Item = (Decimal, Option<Decimal>)>,
{
    let mut totals = InvoiceTotals::default();
    for (amount, tax_percent) in lines {
        totals.subtotal = totals.subtotal.checked_add(amount)?;
        totals.tax = totals.tax.checked_add(line_tax(amount, tax_percent)?)?;
    }
    totals.total = totals.subtotal.checked_add(totals.tax)?;
    Some(totals)
}

pub fn validate_line_item(errors: &mut ValidationErrors, prefix: &str, line: &LineItemInput) {
    errors.require_non_blank(&format!("{prefix}description"), &line.description);
    errors.require_non_negative(&format!("{prefix}quantity"), line.quantity);
    errors.require_non_negative(&format!("{prefix}rate"), line.rate);
    if let Some(tax) = line.tax {
        errors.require_percentage(&format!("{prefix}tax"), tax);
    }
    let taxed = line_amount(line.quantity, line.rate).and_then(|amount| line_tax(amount, line.tax));
    if taxed.is_none() {
        errors.push(format!("{prefix}amount"), AMOUNT_TOO_LARGE);
    }
}

/// Checks each line, then that the lines sum to a representable total.
pub fn validate_line_items(lines: &[LineItemInput]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for (index, line) in lines.iter().enumerate() {
        validate_line_item(&mut errors, &format!("line_items[{index}]."), line);
    }
    if errors.is_empty() && line_totals(lines).is_none() {
        errors.push("line_items", AMOUNT_TOO_LARGE);
    }
    errors
}

/// Totals for a set of line items as submitted.
pub fn line_totals(lines: &[LineItemInput]) -> Option<InvoiceTotals> {
    let mut amounts = Vec::with_capacity(lines.len());
    for line in lines {
        amounts.push((line_amount(line.quantity, line.rate)?, line.tax));
    }
    invoice_totals(amounts)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::{invoice_totals, line_amount, line_totals, validate_line_items};
    use crate::api::LineItemInput;

    #[test]
    fn totals_include_per_line_tax() {
        let design = line_amount(dec!(10), dec!(85)).expect("amount");
        let hosting = line_amount(dec!(1), dec!(120.50)).expect("amount");

        let totals = invoice_totals([(design, Some(dec!(10))), (hosting, None)]).expect("totals");
        assert_eq!(totals.subtotal, dec!(970.50));
        assert_eq!(totals.tax, dec!(85));
        assert_eq!(totals.total, dec!(1055.50));
    }

    #[test]
    fn no_lines_means_zero_totals() {
        let totals = invoice_totals(std::iter::empty()).expect("totals");
        assert!(totals.total.is_zero());
    }

    #[test]
    fn rounding_applies_to_each_figure() {
        let amount = line_amount(dec!(3), dec!(3.333)).expect("amount");
        let totals = invoice_totals([(amount, Some(dec!(7.5)))]).expect("totals");
        let rounded = totals.rounded();
        assert_eq!(rounded.subtotal, dec!(10.00));
        assert_eq!(rounded.tax, dec!(0.75));
        assert_eq!(rounded.total, dec!(10.75));
    }

    #[test]
    fn line_item_problems_are_indexed() {
        let lines = vec![
            LineItemInput {
                description: "Design".to_string(),
                quantity: dec!(1),
                rate: dec!(100),
                tax: None,
            },
            LineItemInput {
                description: "".to_string(),
                quantity: dec!(-1),
                rate: dec!(100),
                tax: Some(dec!(140)),
            },
        ];

        let errors = validate_line_items(&lines);
        assert_eq!(errors.violations().len(), 3);
        assert!(errors.has_field("line_items[1].description"));
        assert!(errors.has_field("line_items[1].quantity"));
        assert!(errors.has_field("line_items[1].tax"));
    }

    fn line(quantity: Decimal, rate: Decimal) -> LineItemInput {
        LineItemInput {
            description: "Hosting".to_string(),
            quantity,
            rate,
            tax: Some(dec!(10)),
        }
    }

    #[test]
    fn oversized_line_is_a_violation() {
        let errors = validate_line_items(&[line(Decimal::MAX, dec!(2))]);
        assert_eq!(errors.violations().len(), 1);
        assert!(errors.has_field("line_items[0].amount"));
    }

    #[test]
    fn lines_that_only_overflow_together_are_rejected() {
        let half = Decimal::MAX / dec!(2);
        let lines = vec![line(half, dec!(1)), line(half, dec!(1))];

        let errors = validate_line_items(&lines);
        assert!(errors.has_field("line_items"));
        assert_eq!(line_totals(&lines), None);
        assert!(line_totals(&lines[..1]).is_some());
    }
}
