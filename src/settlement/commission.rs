use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::reservation::PaymentMethod;

pub const DEFAULT_COMMISSION_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum SettlementDirection {
    // Cash trip: the driver already holds the fare, the operator is owed the
    // commission and collects it out-of-band.
    CommissionReceivable,
    // Card or bank transfer: the operator holds the fare and owes the driver
    // their earning through the ledger.
    EarningPayable,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Settlement {
    pub commission: Decimal,
    pub driver_earning: Decimal,
    pub direction: SettlementDirection,
}

pub fn compute(
    trip_price: Decimal,
    commission_rate: Option<Decimal>,
    method: PaymentMethod,
) -> Settlement {
    let direction = if method.operator_collected() {
        SettlementDirection::EarningPayable
    } else {
        SettlementDirection::CommissionReceivable
    };

    if trip_price <= Decimal::ZERO {
        return Settlement {
            commission: Decimal::ZERO,
            driver_earning: Decimal::ZERO,
            direction,
        };
    }

    let rate = commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE);
    let commission = trip_price * rate / Decimal::ONE_HUNDRED;

    Settlement {
        commission,
        driver_earning: trip_price - commission,
        direction,
    }
}
