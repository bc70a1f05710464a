use chrono::{Datelike, Days, Months, NaiveDate};

use crate::types::RecurringFrequency;

/// Next issue date after `from`. Monthly schedules keep the day of month
/// where it exists and clamp to the last day otherwise, so Jan 31 becomes
/// Feb 28 (or 29). Returns `None` only past the end of the calendar.
pub fn advance(from: NaiveDate, frequency: RecurringFrequency) -> Option<NaiveDate> {
    match frequency {
        RecurringFrequency::Daily => from.checked_add_days(Days::new(1)),
        RecurringFrequency::Weekly => from.checked_add_days(Days::new(7)),
        RecurringFrequency::Monthly => from.checked_add_months(Months::new(1)),
    }
}

pub fn is_due(next_issue_date: NaiveDate, today: NaiveDate) -> bool {
    next_issue_date <= today
}

pub fn due_date(issue_date: NaiveDate, payment_terms_days: u32) -> Option<NaiveDate> {
    issue_date.checked_add_days(Days::new(u64::from(payment_terms_days)))
}

/// `INV-{year}-{sequence:04}`.
pub fn invoice_number(issue_date: NaiveDate, sequence: u32) -> String {
    format!("INV-{}-{:04}", issue_date.year(), sequence)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{advance, due_date, invoice_number, is_due};
    use crate::types::RecurringFrequency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn advances_by_frequency() {
        let start = date(2024, 3, 30);
        assert_eq!(advance(start, RecurringFrequency::Daily), Some(date(2024, 3, 31)));
        assert_eq!(advance(start, RecurringFrequency::Weekly), Some(date(2024, 4, 6)));
        assert_eq!(advance(start, RecurringFrequency::Monthly), Some(date(2024, 4, 30)));
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        assert_eq!(
            advance(date(2024, 1, 31), RecurringFrequency::Monthly),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            advance(date(2023, 1, 31), RecurringFrequency::Monthly),
            Some(date(2023, 2, 28))
        );
        assert_eq!(
            advance(date(2023, 12, 15), RecurringFrequency::Monthly),
            Some(date(2024, 1, 15))
        );
    }

    #[test]
    fn due_includes_today() {
        let today = date(2024, 5, 1);
        assert!(is_due(today, today));
        assert!(is_due(date(2024, 4, 1), today));
        assert!(!is_due(date(2024, 5, 2), today));
    }

    #[test]
    fn payment_terms_and_numbering() {
        assert_eq!(due_date(date(2024, 12, 15), 30), Some(date(2025, 1, 14)));
        assert_eq!(invoice_number(date(2024, 2, 1), 7), "INV-2024-0007");
    }
}
