//! Invoice balance arithmetic for adding and removing payments.

use crate::format::round_cents;
use crate::model::InvoiceStatus;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub total_amount: f64,
    pub amount_paid: f64,
}

/// New invoice fields after a payment change. Amounts are rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciled {
    pub amount_paid: f64,
    pub amount_due: f64,
    pub status: InvoiceStatus,
}

pub fn apply_payment(balance: Balance, amount: f64) -> Reconciled {
    let amount_paid = round_cents(balance.amount_paid + amount);
    let amount_due = round_cents(balance.total_amount - amount_paid);
    let status = if amount_due <= 0.0 {
        InvoiceStatus::Paid
    } else {
        InvoiceStatus::Partial
    };
    Reconciled { amount_paid, amount_due, status }
}

pub fn revert_payment(balance: Balance, amount: f64) -> Reconciled {
    let amount_paid = round_cents(balance.amount_paid - amount);
    let amount_due = round_cents(balance.total_amount - amount_paid);
    let status = if amount_due <= 0.0 {
        InvoiceStatus::Paid
    } else if amount_paid > 0.0 {
        InvoiceStatus::Partial
    } else {
        InvoiceStatus::Sent
    };
    Reconciled { amount_paid, amount_due, status }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(total: f64, paid: f64) -> Balance {
        Balance { total_amount: total, amount_paid: paid }
    }

    #[test]
    fn payments_move_invoice_to_partial_then_paid() {
        let first = apply_payment(balance(100.0, 0.0), 60.0);
        assert_eq!(
            first,
            Reconciled { amount_paid: 60.0, amount_due: 40.0, status: InvoiceStatus::Partial }
        );
        let second = apply_payment(balance(100.0, first.amount_paid), 40.0);
        assert_eq!(
            second,
            Reconciled { amount_paid: 100.0, amount_due: 0.0, status: InvoiceStatus::Paid }
        );
    }

    #[test]
    fn removing_payments_walks_back_to_sent() {
        let back = revert_payment(balance(100.0, 100.0), 40.0);
        assert_eq!(
            back,
            Reconciled { amount_paid: 60.0, amount_due: 40.0, status: InvoiceStatus::Partial }
        );
        let empty = revert_payment(balance(100.0, back.amount_paid), 60.0);
        assert_eq!(empty.amount_paid, 0.0);
        assert_eq!(empty.amount_due, 100.0);
        assert_eq!(empty.status, InvoiceStatus::Sent);
    }

    #[test]
    fn overpayment_is_paid_with_negative_due() {
        let r = apply_payment(balance(50.0, 0.0), 70.0);
        assert_eq!(r.amount_due, -20.0);
        assert_eq!(r.status, InvoiceStatus::Paid);
    }

    #[test]
    fn cents_do_not_drift() {
        let mut paid = 0.0;
        for _ in 0..3 {
            paid = apply_payment(balance(0.3, paid), 0.1).amount_paid;
        }
        let r = apply_payment(balance(0.3, 0.2), 0.1);
        assert_eq!(paid, 0.3);
        assert_eq!(r.amount_due, 0.0);
        assert_eq!(r.status, InvoiceStatus::Paid);
    }
}
