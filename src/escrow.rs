//! Escrow bookkeeping rules for payments.
//!
//! Handlers load the payment (and its shipment) inside a transaction, ask
//! these functions what the next state is, and persist the result.

use bigdecimal::BigDecimal;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

use crate::status::{PaymentStatus, ShipmentStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EscrowError {
    #[error("payment has already been made")]
    AlreadyPaid,
    #[error("delivery cannot be confirmed while payment is {0}")]
    NotConfirmable(String),
    #[error("payment has already been transferred to the carrier")]
    AlreadyTransferred,
    #[error("payment status is not delivered ({0})")]
    NotDelivered(String),
    #[error("delivery has not been confirmed by both parties")]
    AwaitingConfirmation,
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
}

/// Platform fee and carrier share for an agreed amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSplit {
    pub platform_fee: BigDecimal,
    pub carrier_amount: BigDecimal,
}

pub fn split_amount(amount: &BigDecimal, fee_percent: &BigDecimal) -> Result<FeeSplit, EscrowError> {
    if amount <= &BigDecimal::from(0) {
        return Err(EscrowError::NonPositiveAmount);
    }
    let platform_fee = (amount * fee_percent / BigDecimal::from(100)).round(2);
    let carrier_amount = (amount - &platform_fee).round(2);
    Ok(FeeSplit {
        platform_fee,
        carrier_amount,
    })
}

/// `TXN-` followed by twelve upper-case hex digits.
pub fn transaction_id() -> String {
    let mut bytes = [0u8; 6];
    OsRng.fill_bytes(&mut bytes);
    format!("TXN-{}", hex::encode_upper(bytes))
}

pub fn ensure_payable(status: PaymentStatus) -> Result<(), EscrowError> {
    if status == PaymentStatus::Pending {
        Ok(())
    } else {
        Err(EscrowError::AlreadyPaid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Shipper,
    Carrier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmations {
    pub payment_status: PaymentStatus,
    pub shipment_status: ShipmentStatus,
    pub shipper_confirmed: bool,
    pub carrier_confirmed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationOutcome {
    pub next: Confirmations,
    /// The caller's flag flipped on this request.
    pub newly_confirmed: bool,
    /// Both parties have now confirmed.
    pub fully_confirmed: bool,
}

/// Applies one party's delivery confirmation.
///
/// Repeat confirmations leave the flags untouched. A carrier confirming an
/// assigned shipment moves shipment and payment to `in_transit`; once both
/// flags are set both move to `delivered`.
pub fn confirm_delivery(
    current: Confirmations,
    party: Party,
) -> Result<ConfirmationOutcome, EscrowError> {
    if !current.payment_status.is_funded() {
        return Err(EscrowError::NotConfirmable(
            current.payment_status.to_string(),
        ));
    }

    let mut next = current;
    let newly_confirmed = match party {
        Party::Shipper if !current.shipper_confirmed => {
            next.shipper_confirmed = true;
            true
        }
        Party::Carrier if !current.carrier_confirmed => {
            next.carrier_confirmed = true;
            if current.shipment_status == ShipmentStatus::Assigned {
                next.shipment_status = ShipmentStatus::InTransit;
                next.payment_status = PaymentStatus::InTransit;
            }
            true
        }
        _ => false,
    };

    let fully_confirmed = next.shipper_confirmed && next.carrier_confirmed;
    if fully_confirmed {
        next.payment_status = PaymentStatus::Delivered;
        next.shipment_status = ShipmentStatus::Delivered;
    }

    Ok(ConfirmationOutcome {
        next,
        newly_confirmed,
        fully_confirmed,
    })
}

/// Whether an administrator may release the held funds to the carrier.
pub fn check_transfer(
    status: PaymentStatus,
    shipper_confirmed: bool,
    carrier_confirmed: bool,
    admin_transferred: bool,
) -> Result<(), EscrowError> {
    if admin_transferred {
        return Err(EscrowError::AlreadyTransferred);
    }
    if status != PaymentStatus::Delivered {
        return Err(EscrowError::NotDelivered(status.to_string()));
    }
    if !(shipper_confirmed && carrier_confirmed) {
        return Err(EscrowError::AwaitingConfirmation);
    }
    Ok(())
}

pub fn can_transfer_to_carrier(
    status: PaymentStatus,
    shipper_confirmed: bool,
    carrier_confirmed: bool,
    admin_transferred: bool,
) -> bool {
    check_transfer(status, shipper_confirmed, carrier_confirmed, admin_transferred).is_ok()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn paid_assigned() -> Confirmations {
        Confirmations {
            payment_status: PaymentStatus::Paid,
            shipment_status: ShipmentStatus::Assigned,
            shipper_confirmed: false,
            carrier_confirmed: false,
        }
    }

    #[test]
    fn ten_percent_fee_is_rounded_to_cents() {
        let split = split_amount(&dec("1234.56"), &dec("10")).unwrap();
        assert_eq!(split.platform_fee, dec("123.46"));
        assert_eq!(split.carrier_amount, dec("1111.10"));
        assert_eq!(&split.platform_fee + &split.carrier_amount, dec("1234.56"));
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert_eq!(
            split_amount(&dec("0"), &dec("10")),
            Err(EscrowError::NonPositiveAmount)
        );
    }

    #[test]
    fn transaction_ids_are_upper_hex() {
        let id = transaction_id();
        assert!(id.starts_with("TXN-"));
        assert_eq!(id.len(), 16);
        assert!(id[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn only_pending_payments_can_be_paid() {
        assert!(ensure_payable(PaymentStatus::Pending).is_ok());
        assert_eq!(
            ensure_payable(PaymentStatus::Paid),
            Err(EscrowError::AlreadyPaid)
        );
    }

    #[test]
    fn carrier_confirmation_starts_transit() {
        let outcome = confirm_delivery(paid_assigned(), Party::Carrier).unwrap();
        assert!(outcome.newly_confirmed);
        assert!(!outcome.fully_confirmed);
        assert_eq!(outcome.next.shipment_status, ShipmentStatus::InTransit);
        assert_eq!(outcome.next.payment_status, PaymentStatus::InTransit);
    }

    #[test]
    fn shipper_confirmation_alone_keeps_status() {
        let outcome = confirm_delivery(paid_assigned(), Party::Shipper).unwrap();
        assert!(outcome.next.shipper_confirmed);
        assert_eq!(outcome.next.payment_status, PaymentStatus::Paid);
        assert_eq!(outcome.next.shipment_status, ShipmentStatus::Assigned);
    }

    #[test]
    fn both_confirmations_deliver() {
        let first = confirm_delivery(paid_assigned(), Party::Shipper).unwrap();
        let second = confirm_delivery(first.next, Party::Carrier).unwrap();
        assert!(second.fully_confirmed);
        assert_eq!(second.next.payment_status, PaymentStatus::Delivered);
        assert_eq!(second.next.shipment_status, ShipmentStatus::Delivered);
    }

    #[test]
    fn repeat_confirmation_is_a_no_op() {
        let first = confirm_delivery(paid_assigned(), Party::Shipper).unwrap();
        let again = confirm_delivery(first.next, Party::Shipper).unwrap();
        assert!(!again.newly_confirmed);
        assert_eq!(again.next, first.next);
    }

    #[test]
    fn unpaid_payment_cannot_be_confirmed() {
        let mut state = paid_assigned();
        state.payment_status = PaymentStatus::Pending;
        assert_eq!(
            confirm_delivery(state, Party::Shipper),
            Err(EscrowError::NotConfirmable("pending".into()))
        );
    }

    #[test]
    fn transfer_requires_delivery_and_both_flags() {
        assert!(!can_transfer_to_carrier(
            PaymentStatus::Paid,
            true,
            true,
            false
        ));
        assert_eq!(
            check_transfer(PaymentStatus::Delivered, true, false, false),
            Err(EscrowError::AwaitingConfirmation)
        );
        assert_eq!(
            check_transfer(PaymentStatus::Delivered, true, true, true),
            Err(EscrowError::AlreadyTransferred)
        );
        assert!(can_transfer_to_carrier(
            PaymentStatus::Delivered,
            true,
            true,
            false
        ));
    }
}
