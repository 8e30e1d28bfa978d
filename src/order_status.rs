//! The order status function (§4.5). Order status is **never stored** — it
//! is always computed from `(order.error, order.expires, authz statuses,
//! beganProcessing, certificateSerial)`. See §9: implementations must not
//! introduce a stored `order.status` column that can drift.

use crate::error::{RaError, Result};
use crate::model::{Authorization, AuthorizationStatus, Order};
use jiff::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

/// Computes an order's status. Pure in `(order, authzs, now)`: equal inputs
/// yield equal outputs (§8 law 7), and the result never retrogrades under
/// monotonic inputs (§8 law 9).
///
/// `authzs` must contain exactly the authorizations referenced by
/// `order.authorization_ids`, in any order; a count mismatch against
/// `order.identifiers` is a fatal internal error.
pub fn compute_order_status(order: &Order, authzs: &[Authorization], now: Timestamp) -> Result<OrderStatus> {
    if authzs.len() != order.identifiers.len() {
        return Err(RaError::internal(format!(
            "order {} has {} identifiers but {} authorizations",
            order.id,
            order.identifiers.len(),
            authzs.len()
        )));
    }

    if order.error.is_some() {
        return Ok(OrderStatus::Invalid);
    }

    if order.expires < now {
        return Ok(OrderStatus::Invalid);
    }

    let any_invalid = authzs.iter().any(|a| {
        a.is_expired(now)
            || matches!(
                a.status,
                AuthorizationStatus::Invalid | AuthorizationStatus::Deactivated | AuthorizationStatus::Revoked
            )
    });
    if any_invalid {
        return Ok(OrderStatus::Invalid);
    }

    let any_pending = authzs.iter().any(|a| a.status == AuthorizationStatus::Pending);
    if any_pending {
        return Ok(OrderStatus::Pending);
    }

    // Every authorization is now Valid and unexpired.
    if !order.certificate_serial.is_empty() {
        return Ok(OrderStatus::Valid);
    }

    if order.began_processing {
        return Ok(OrderStatus::Processing);
    }

    Ok(OrderStatus::Ready)
}
