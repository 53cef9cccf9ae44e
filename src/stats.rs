//! Aggregate statistics over the local collection, free of any
//! presentation concern.

use rust_decimal::Decimal;

use crate::invoice::{Invoice, InvoiceStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceStats {
    pub total_count: usize,
    pub total_amount: Decimal,
    pub paid_count: usize,
    pub paid_amount: Decimal,
    pub pending_count: usize,
    pub pending_amount: Decimal,
    pub overdue_count: usize,
    pub overdue_amount: Decimal,
}

impl InvoiceStats {
    pub fn compute(invoices: &[Invoice]) -> Self {
        let mut stats = Self::default();
        for invoice in invoices {
            stats.total_count += 1;
            stats.total_amount += invoice.amount;
            match invoice.status {
                InvoiceStatus::Paid => {
                    stats.paid_count += 1;
                    stats.paid_amount += invoice.amount;
                }
                InvoiceStatus::Pending => {
                    stats.pending_count += 1;
                    stats.pending_amount += invoice.amount;
                }
                InvoiceStatus::Overdue => {
                    stats.overdue_count += 1;
                    stats.overdue_amount += invoice.amount;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use crate::invoice::{Invoice, InvoiceStatus};

    use super::InvoiceStats;

    fn invoice(id: &str, amount: rust_decimal::Decimal, status: InvoiceStatus) -> Invoice {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
        Invoice {
            id: id.to_string(),
            client_name: "Acme".to_string(),
            amount,
            issue_date: date,
            due_date: date,
            status,
            observations: String::new(),
        }
    }

    #[test]
    fn totals_split_by_status() {
        let invoices = vec![
            invoice("a", dec!(100), InvoiceStatus::Paid),
            invoice("b", dec!(50.50), InvoiceStatus::Pending),
            invoice("c", dec!(25), InvoiceStatus::Overdue),
            invoice("d", dec!(25), InvoiceStatus::Overdue),
        ];
        let stats = InvoiceStats::compute(&invoices);
        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.total_amount, dec!(200.50));
        assert_eq!(stats.paid_amount, dec!(100));
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.overdue_count, 2);
        assert_eq!(stats.overdue_amount, dec!(50));
    }

    #[test]
    fn empty_collection_is_all_zero() {
        assert_eq!(InvoiceStats::compute(&[]), InvoiceStats::default());
    }
}
