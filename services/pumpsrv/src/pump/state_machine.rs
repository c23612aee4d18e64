//! Pump state transitions
//!
//! | Current                       | Event             | Next            |
//! |-------------------------------|-------------------|-----------------|
//! | any                           | unreachable       | `NO_CONNECTION` |
//! | `OFFLINE`/`NO_CONNECTION`/`IDLE` | idle status    | `IDLE`          |
//! | `IDLE`/`NOZZLE_UP`            | filling status    | `FILLING`       |
//! | `FILLING`                     | filling status    | `FILLING`       |
//! | `FILLING`                     | idle status       | `IDLE`          |
//!
//! Every other pair is a [`ProtocolViolation`]; the caller keeps the previous
//! record.

use super::model::{Pump, PumpStatus};
use crate::error::ProtocolViolation;
use crate::protocol::{FillingStatus, IdleStatus, PumpReport};

/// Input to [`transition`]
#[derive(Debug, Clone, PartialEq)]
pub enum PumpEvent {
    /// A status result resolved for this pump
    Report(PumpReport),
    /// The round-trip carrying this pump's request failed
    Unreachable,
}

/// Compute the next record for `previous` given `event`.
///
/// Pure: no clock, no I/O. `updated_at` is left for the registry to stamp.
pub fn transition(previous: &Pump, event: &PumpEvent) -> Result<Pump, ProtocolViolation> {
    use PumpStatus::*;

    let report = match event {
        PumpEvent::Unreachable => {
            return Ok(Pump {
                status: NoConnection,
                transaction_id: None,
                ..previous.clone()
            })
        },
        PumpEvent::Report(report) => report,
    };

    match (previous.status, report) {
        (Offline | NoConnection | Idle | Filling, PumpReport::Idle(idle)) => {
            Ok(enter_idle(previous, idle))
        },
        (Idle | NozzleUp, PumpReport::Filling(filling)) => Ok(enter_filling(previous, filling)),
        (Filling, PumpReport::Filling(filling)) => {
            if filling.volume < previous.volume || filling.amount < previous.amount {
                return Err(ProtocolViolation::NonMonotonic {
                    pump: previous.id,
                    previous_volume: previous.volume,
                    volume: filling.volume,
                    previous_amount: previous.amount,
                    amount: filling.amount,
                });
            }
            Ok(Pump {
                volume: filling.volume,
                amount: filling.amount,
                current_user: filling.user.clone().or_else(|| previous.current_user.clone()),
                ..previous.clone()
            })
        },
        (state, report) => Err(ProtocolViolation::UnexpectedResponse {
            pump: previous.id,
            state,
            response: report.packet_type(),
        }),
    }
}

fn enter_idle(previous: &Pump, idle: &IdleStatus) -> Pump {
    Pump {
        status: PumpStatus::Idle,
        nozzle: idle.nozzle_up,
        volume: 0.0,
        amount: 0.0,
        price: idle.last_price,
        last_price: idle.last_price,
        last_volume: idle.last_volume,
        last_amount: idle.last_amount,
        transaction_id: None,
        current_user: idle.user.clone(),
        ..previous.clone()
    }
}

fn enter_filling(previous: &Pump, filling: &FillingStatus) -> Pump {
    Pump {
        status: PumpStatus::Filling,
        nozzle: filling.nozzle,
        volume: filling.volume,
        amount: filling.amount,
        price: filling.price,
        transaction_id: Some(filling.transaction),
        current_user: filling.user.clone().or_else(|| previous.current_user.clone()),
        ..previous.clone()
    }
}
