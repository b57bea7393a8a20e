use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationStatus {
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub total_waived: Decimal,
    /// `total_paid + total_waived`
    pub effective_paid: Decimal,
    /// Never negative; overpayment shows as zero
    pub balance_due: Decimal,
    pub status: PaymentStatus,
}

/// Classifies an obligation. Every paid / partial / unpaid badge goes
/// through here; waived amounts settle an obligation like cash but are
/// reported separately.
///
/// A non-positive `total_due` is degenerate input and resolves to
/// [`PaymentStatus::Paid`] with nothing due.
pub fn resolve(total_due: Decimal, total_paid: Decimal, total_waived: Decimal) -> ObligationStatus {
    let effective_paid = total_paid.saturating_add(total_waived);

    if total_due <= Decimal::ZERO {
        return ObligationStatus {
            total_due,
            total_paid,
            total_waived,
            effective_paid,
            balance_due: Decimal::ZERO,
            status: PaymentStatus::Paid,
        };
    }

    let status = if effective_paid >= total_due {
        PaymentStatus::Paid
    } else if total_paid > Decimal::ZERO || total_waived > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    };

    ObligationStatus {
        total_due,
        total_paid,
        total_waived,
        effective_paid,
        balance_due: total_due.saturating_sub(effective_paid).max(Decimal::ZERO),
        status,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    Payment,
    WaiveOff,
}

/// A payment or waive-off applied against an obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Order or invoice number the settlement applies to
    pub obligation_ref: String,
    pub kind: SettlementKind,
    pub amount: Decimal,
}

impl Settlement {
    pub fn payment(obligation_ref: impl Into<String>, amount: Decimal) -> Self {
        Self {
            obligation_ref: obligation_ref.into(),
            kind: SettlementKind::Payment,
            amount,
        }
    }

    pub fn waive_off(obligation_ref: impl Into<String>, amount: Decimal) -> Self {
        Self {
            obligation_ref: obligation_ref.into(),
            kind: SettlementKind::WaiveOff,
            amount,
        }
    }
}

/// An order or invoice with the amount owed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub reference: String,
    pub total_due: Decimal,
}

#[derive(Default)]
struct Accumulator {
    paid: Decimal,
    waived: Decimal,
}

impl Accumulator {
    fn add(&mut self, settlement: &Settlement) {
        if settlement.amount < Decimal::ZERO {
            warn!(
                "Ignoring negative {:?} of {} against {}",
                settlement.kind, settlement.amount, settlement.obligation_ref
            );
            return;
        }
        match settlement.kind {
            SettlementKind::Payment => self.paid = self.paid.saturating_add(settlement.amount),
            SettlementKind::WaiveOff => self.waived = self.waived.saturating_add(settlement.amount),
        }
    }
}

/// Sums settlements into paid and waived totals and resolves the status.
/// The settlements' `obligation_ref` is not checked.
pub fn resolve_settlements(total_due: Decimal, settlements: &[Settlement]) -> ObligationStatus {
    let mut acc = Accumulator::default();
    for settlement in settlements {
        acc.add(settlement);
    }
    resolve(total_due, acc.paid, acc.waived)
}

/// Resolves a batch of obligations, matching settlements by reference.
///
/// References are expected to be unique; when one repeats, the first
/// obligation carrying it is used and the rest are logged and ignored.
pub fn resolve_obligations(
    obligations: &[Obligation],
    settlements: &[Settlement],
) -> BTreeMap<String, ObligationStatus> {
    let mut dues: BTreeMap<&str, Decimal> = BTreeMap::new();
    for obligation in obligations {
        if dues.contains_key(obligation.reference.as_str()) {
            warn!(
                "Duplicate obligation reference {} (due {}), keeping the first",
                obligation.reference, obligation.total_due
            );
            continue;
        }
        dues.insert(&obligation.reference, obligation.total_due);
    }

    let mut totals: BTreeMap<&str, Accumulator> = dues
        .keys()
        .map(|reference| (*reference, Accumulator::default()))
        .collect();

    for settlement in settlements {
        match totals.get_mut(settlement.obligation_ref.as_str()) {
            Some(acc) => acc.add(settlement),
            None => warn!(
                "Settlement of {} references unknown obligation {}",
                settlement.amount, settlement.obligation_ref
            ),
        }
    }

    totals
        .into_iter()
        .map(|(reference, acc)| {
            let total_due = dues.get(reference).copied().unwrap_or(Decimal::ZERO);
            (reference.to_string(), resolve(total_due, acc.paid, acc.waived))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fully_paid_in_cash() {
        let s = resolve(dec!(1000), dec!(1000), dec!(0));
        assert_eq!(s.status, PaymentStatus::Paid);
        assert_eq!(s.balance_due, dec!(0));
    }

    #[test]
    fn test_partially_paid() {
        let s = resolve(dec!(1000), dec!(400), dec!(0));
        assert_eq!(s.status, PaymentStatus::Partial);
        assert_eq!(s.balance_due, dec!(600));
    }

    #[test]
    fn test_fully_waived() {
        let s = resolve(dec!(1000), dec!(0), dec!(1000));
        assert_eq!(s.status, PaymentStatus::Paid);
        assert_eq!(s.balance_due, dec!(0));
        assert_eq!(s.total_paid, dec!(0));
        assert_eq!(s.total_waived, dec!(1000));
        assert_eq!(s.effective_paid, dec!(1000));
    }

    #[test]
    fn test_paid_and_waived_combine() {
        let s = resolve(dec!(1000), dec!(700), dec!(300));
        assert_eq!(s.status, PaymentStatus::Paid);

        let s = resolve(dec!(1000), dec!(0), dec!(250));
        assert_eq!(s.status, PaymentStatus::Partial);
        assert_eq!(s.balance_due, dec!(750));
    }

    #[test]
    fn test_unpaid() {
        let s = resolve(dec!(1000), dec!(0), dec!(0));
        assert_eq!(s.status, PaymentStatus::Unpaid);
        assert_eq!(s.balance_due, dec!(1000));
    }

    #[test]
    fn test_overpayment_has_no_negative_balance() {
        let s = resolve(dec!(1000), dec!(1200), dec!(0));
        assert_eq!(s.status, PaymentStatus::Paid);
        assert_eq!(s.balance_due, dec!(0));
    }

    #[test]
    fn test_non_positive_due_is_paid() {
        for due in [dec!(0), dec!(-50)] {
            let s = resolve(due, dec!(0), dec!(0));
            assert_eq!(s.status, PaymentStatus::Paid);
            assert_eq!(s.balance_due, dec!(0));
        }
    }

    #[test]
    fn test_status_never_regresses_as_payments_grow() {
        let due = dec!(1000);
        let steps = [dec!(0), dec!(0.01), dec!(250), dec!(999.99), dec!(1000), dec!(1500)];

        for waived in steps {
            let mut previous = PaymentStatus::Unpaid;
            for paid in steps {
                let status = resolve(due, paid, waived).status;
                assert!(status >= previous, "paid={} waived={}", paid, waived);
                previous = status;
            }
        }

        for paid in steps {
            let mut previous = PaymentStatus::Unpaid;
            for waived in steps {
                let status = resolve(due, paid, waived).status;
                assert!(status >= previous, "paid={} waived={}", paid, waived);
                previous = status;
            }
        }
    }

    #[test]
    fn test_resolve_settlements_keeps_waivers_separate() {
        let settlements = vec![
            Settlement::payment("INV-1", dec!(300)),
            Settlement::waive_off("INV-1", dec!(50)),
            Settlement::payment("INV-1", dec!(150)),
            Settlement::payment("INV-1", dec!(-20)),
        ];
        let s = resolve_settlements(dec!(600), &settlements);
        assert_eq!(s.total_paid, dec!(450));
        assert_eq!(s.total_waived, dec!(50));
        assert_eq!(s.balance_due, dec!(100));
        assert_eq!(s.status, PaymentStatus::Partial);
    }

    #[test]
    fn test_resolve_obligations_by_reference() {
        let obligations = vec![
            Obligation { reference: "SO-1".to_string(), total_due: dec!(500) },
            Obligation { reference: "SO-2".to_string(), total_due: dec!(800) },
            Obligation { reference: "SO-3".to_string(), total_due: dec!(120) },
        ];
        let settlements = vec![
            Settlement::payment("SO-1", dec!(500)),
            Settlement::payment("SO-2", dec!(100)),
            Settlement::waive_off("SO-3", dec!(120)),
            Settlement::payment("SO-404", dec!(999)),
        ];

        let statuses = resolve_obligations(&obligations, &settlements);
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses["SO-1"].status, PaymentStatus::Paid);
        assert_eq!(statuses["SO-2"].status, PaymentStatus::Partial);
        assert_eq!(statuses["SO-2"].balance_due, dec!(700));
        assert_eq!(statuses["SO-3"].status, PaymentStatus::Paid);
        assert_eq!(statuses["SO-3"].total_paid, dec!(0));
    }

    #[test]
    fn test_status_serializes_as_badge_text() {
        let json = serde_json::to_string(&PaymentStatus::Partial).unwrap();
        assert_eq!(json, "\"partial\"");
        assert_eq!(PaymentStatus::Unpaid.to_string(), "unpaid");
    }

    #[test]
    fn test_duplicate_reference_keeps_first_obligation() {
        let obligations = vec![
            Obligation { reference: "INV-9".to_string(), total_due: dec!(500) },
            Obligation { reference: "INV-9".to_string(), total_due: dec!(50) },
        ];
        let settlements = vec![Settlement::payment("INV-9", dec!(100))];

        let statuses = resolve_obligations(&obligations, &settlements);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses["INV-9"].total_due, dec!(500));
        assert_eq!(statuses["INV-9"].total_paid, dec!(100));
        assert_eq!(statuses["INV-9"].status, PaymentStatus::Partial);
    }

    #[test]
    fn test_huge_settlements_saturate_instead_of_panicking() {
        let settlements = vec![
            Settlement::payment("INV-1", Decimal::MAX),
            Settlement::payment("INV-1", Decimal::MAX),
            Settlement::waive_off("INV-1", Decimal::MAX),
        ];
        let s = resolve_settlements(dec!(1000), &settlements);
        assert_eq!(s.total_paid, Decimal::MAX);
        assert_eq!(s.effective_paid, Decimal::MAX);
        assert_eq!(s.status, PaymentStatus::Paid);
        assert_eq!(s.balance_due, dec!(0));
    }
}
