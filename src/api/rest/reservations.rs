use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::reservation::{
    DriverAssignment, DriverPaymentStatus, ManualDriver, PaymentMethod, Reservation,
    ReservationStatus,
};
use crate::policy;
use crate::settlement::{commission, ledger};
use crate::state::AppState;
use crate::store::adapter;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/reservations",
            post(create_reservation).get(list_reservations),
        )
        .route("/reservations/import", post(import_reservation))
        .route(
            "/reservations/:id",
            get(get_reservation)
                .patch(edit_reservation)
                .delete(remove_reservation),
        )
        .route("/reservations/:id/cancel", post(cancel_reservation))
        .route("/reservations/:id/can-modify", get(can_modify))
        .route("/reservations/:id/status", post(transition_status))
        .route("/reservations/:id/paid", post(mark_paid))
}

#[derive(Deserialize)]
pub struct CreateReservationRequest {
    pub pickup: String,
    pub dropoff: String,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<NaiveTime>,
    pub passenger_name: String,
    pub passenger_phone: String,
    pub payment_method: PaymentMethod,
    pub total_price: Decimal,
}

#[derive(Deserialize)]
pub struct EditReservationRequest {
    pub pickup: Option<String>,
    pub dropoff: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<NaiveTime>,
    pub total_price: Option<Decimal>,
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionRequest {
    Confirm,
    Assign {
        #[serde(default)]
        driver_id: Option<Uuid>,
        #[serde(default)]
        manual_driver: Option<ManualDriver>,
    },
    Start,
    Complete,
    Cancel,
}

#[derive(Serialize)]
struct CanModifyResponse {
    can_modify: bool,
}

async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateReservationRequest>,
) -> Result<Json<Reservation>, AppError> {
    if payload.pickup.trim().is_empty() || payload.dropoff.trim().is_empty() {
        return Err(AppError::Validation(
            "pickup and dropoff cannot be empty".to_string(),
        ));
    }

    if payload.total_price < Decimal::ZERO {
        return Err(AppError::Validation(
            "total price cannot be negative".to_string(),
        ));
    }

    let now = Utc::now();
    let reservation = Reservation {
        id: Uuid::new_v4(),
        status: ReservationStatus::Pending,
        payment_method: payload.payment_method,
        total_price: payload.total_price,
        assigned_driver: DriverAssignment::Unassigned,
        driver_payment_status: None,
        pickup: payload.pickup,
        dropoff: payload.dropoff,
        pickup_date: payload.pickup_date,
        pickup_time: payload.pickup_time,
        passenger_name: payload.passenger_name,
        passenger_phone: payload.passenger_phone,
        created_at: now,
        updated_at: now,
        completed_at: None,
        cancelled_at: None,
        last_edited_at: None,
    };

    state.store.insert_reservation(reservation.clone());
    info!(reservation_id = %reservation.id, "reservation created");

    Ok(Json(reservation))
}

async fn import_reservation(
    State(state): State<Arc<AppState>>,
    Json(document): Json<Value>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = adapter::reservation_from_document(&document)?;

    state.store.insert_reservation(reservation.clone());
    info!(reservation_id = %reservation.id, "reservation imported from store document");

    Ok(Json(reservation))
}

async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.store.get_reservation(id)?))
}

async fn list_reservations(State(state): State<Arc<AppState>>) -> Json<Vec<Reservation>> {
    Json(state.store.list_reservations())
}

async fn edit_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EditReservationRequest>,
) -> Result<Json<Reservation>, AppError> {
    if let Some(price) = payload.total_price {
        if price < Decimal::ZERO {
            return Err(AppError::Validation(
                "total price cannot be negative".to_string(),
            ));
        }
    }

    let now = Utc::now();
    let updated = state.store.update_reservation(id, |reservation| {
        if !policy::can_modify(reservation, now) {
            return Err(AppError::Validation(
                "reservation can no longer be modified".to_string(),
            ));
        }

        if let Some(pickup) = payload.pickup {
            reservation.pickup = pickup;
        }
        if let Some(dropoff) = payload.dropoff {
            reservation.dropoff = dropoff;
        }
        if let Some(date) = payload.pickup_date {
            reservation.pickup_date = Some(date);
        }
        if let Some(time) = payload.pickup_time {
            reservation.pickup_time = Some(time);
        }
        if let Some(price) = payload.total_price {
            reservation.total_price = price;
        }

        reservation.last_edited_at = Some(now);
        Ok(())
    })?;

    info!(reservation_id = %id, "reservation edited");
    Ok(Json(updated))
}

async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    let now = Utc::now();
    let updated = state.store.update_reservation(id, |reservation| {
        if !policy::can_modify(reservation, now) {
            return Err(AppError::Validation(
                "reservation can no longer be cancelled".to_string(),
            ));
        }

        reservation.status = ReservationStatus::Cancelled;
        reservation.cancelled_at = Some(now);
        Ok(())
    })?;

    info!(reservation_id = %id, "reservation cancelled by customer");
    Ok(Json(updated))
}

async fn can_modify(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CanModifyResponse>, AppError> {
    let reservation = state.store.get_reservation(id)?;

    Ok(Json(CanModifyResponse {
        can_modify: policy::can_modify(&reservation, Utc::now()),
    }))
}

async fn transition_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<Reservation>, AppError> {
    if let TransitionRequest::Assign {
        driver_id: Some(driver_id),
        ..
    } = &payload
    {
        if !state.store.driver_exists(*driver_id) {
            return Err(AppError::NotFound(format!("driver {} not found", driver_id)));
        }
    }

    let now = Utc::now();
    let updated = state.store.update_reservation(id, |reservation| {
        match payload {
            TransitionRequest::Confirm => {
                require_status(reservation, &[ReservationStatus::Pending], "confirm")?;
                reservation.status = ReservationStatus::Confirmed;
            }
            TransitionRequest::Assign {
                driver_id,
                manual_driver,
            } => {
                require_status(
                    reservation,
                    &[ReservationStatus::Pending, ReservationStatus::Confirmed],
                    "assign",
                )?;
                reservation.assigned_driver = match (driver_id, manual_driver) {
                    (Some(driver_id), None) => DriverAssignment::Driver(driver_id),
                    (None, Some(manual)) => DriverAssignment::Manual(manual),
                    _ => {
                        return Err(AppError::Validation(
                            "assign requires exactly one of driver_id or manual_driver"
                                .to_string(),
                        ))
                    }
                };
                reservation.status = ReservationStatus::Assigned;
            }
            TransitionRequest::Start => {
                require_status(reservation, &[ReservationStatus::Assigned], "start")?;
                reservation.status = ReservationStatus::InProgress;
            }
            TransitionRequest::Complete => {
                require_status(reservation, &[ReservationStatus::InProgress], "complete")?;
                reservation.status = ReservationStatus::Completed;
                reservation.completed_at = Some(now);
                // Settlement tracking only applies to ledger-tracked drivers;
                // manually dispatched trips are settled entirely off-platform.
                if reservation.assigned_driver.driver_id().is_some() {
                    reservation.driver_payment_status = Some(DriverPaymentStatus::Pending);
                }
            }
            TransitionRequest::Cancel => {
                if reservation.status.is_terminal() {
                    return Err(AppError::Validation(format!(
                        "cannot cancel a {:?} reservation",
                        reservation.status
                    )));
                }
                reservation.status = ReservationStatus::Cancelled;
                reservation.cancelled_at = Some(now);
            }
        }
        Ok(())
    })?;

    info!(reservation_id = %id, status = ?updated.status, "reservation status changed");
    Ok(Json(updated))
}

async fn mark_paid(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.store.get_reservation(id)?;

    if reservation.status != ReservationStatus::Completed {
        return Err(AppError::Validation(
            "only completed reservations can be marked paid".to_string(),
        ));
    }

    let Some(driver_id) = reservation.assigned_driver.driver_id() else {
        return Err(AppError::Validation(
            "reservation is not assigned to a ledger-tracked driver".to_string(),
        ));
    };

    if reservation.driver_payment_status == Some(DriverPaymentStatus::Paid) {
        return Ok(Json(reservation));
    }

    let driver = state.store.get_driver(driver_id)?;
    let settlement = commission::compute(
        reservation.total_price,
        Some(driver.commission_rate),
        reservation.payment_method,
    );

    // The pending-to-paid flip happens under the reservation's entry lock, so
    // racing callers see the edge fire exactly once.
    let mut fired = false;
    let updated = state.store.update_reservation(id, |reservation| {
        if reservation.driver_payment_status == Some(DriverPaymentStatus::Paid) {
            return Ok(());
        }
        reservation.driver_payment_status = Some(DriverPaymentStatus::Paid);
        fired = true;
        Ok(())
    })?;

    if fired {
        match ledger::apply_settlement(&state, driver_id, id, &settlement) {
            Ok(Some(entry)) => {
                state
                    .metrics
                    .settlements_total
                    .with_label_values(&["credited"])
                    .inc();
                info!(
                    reservation_id = %id,
                    driver_id = %driver_id,
                    amount = %entry.amount,
                    "trip settled into driver ledger"
                );
            }
            Ok(None) => {
                state
                    .metrics
                    .settlements_total
                    .with_label_values(&["cash"])
                    .inc();
                info!(
                    reservation_id = %id,
                    driver_id = %driver_id,
                    commission = %settlement.commission,
                    "cash trip marked paid; commission collected out-of-band"
                );
            }
            Err(err) => {
                state
                    .metrics
                    .settlements_total
                    .with_label_values(&["error"])
                    .inc();
                return Err(err);
            }
        }
    }

    Ok(Json(updated))
}

async fn remove_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    let removed = state.store.remove_reservation(id)?;
    info!(reservation_id = %id, "reservation removed");
    Ok(Json(removed))
}

fn require_status(
    reservation: &Reservation,
    allowed: &[ReservationStatus],
    action: &str,
) -> Result<(), AppError> {
    if allowed.contains(&reservation.status) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "cannot {action} a {:?} reservation",
            reservation.status
        )))
    }
}
