use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Driver, LedgerEntry};
use crate::settlement::commission::DEFAULT_COMMISSION_RATE;
use crate::settlement::ledger::{self, ManualKind};
use crate::settlement::reconcile::{self, DriverFinancialSummary};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/summary", get(all_summaries))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/summary", get(driver_summary))
        .route(
            "/drivers/:id/transactions",
            post(record_transaction).get(transaction_history),
        )
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub phone: String,
    pub commission_rate: Option<Decimal>,
}

#[derive(Deserialize)]
pub struct ManualTransactionRequest {
    pub kind: ManualKind,
    pub amount: Decimal,
    pub note: String,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let commission_rate = payload.commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE);
    if commission_rate < Decimal::ZERO || commission_rate > Decimal::ONE_HUNDRED {
        return Err(AppError::Validation(
            "commission rate must be between 0 and 100".to_string(),
        ));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        phone: payload.phone,
        commission_rate,
        balance: Decimal::ZERO,
        transactions: Vec::new(),
    };

    state.store.insert_driver(driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.store.list_drivers())
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(state.store.get_driver(id)?))
}

async fn record_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ManualTransactionRequest>,
) -> Result<Json<LedgerEntry>, AppError> {
    let entry = ledger::record_manual(&state, id, payload.kind, payload.amount, &payload.note)?;
    Ok(Json(entry))
}

async fn transaction_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    Ok(Json(ledger::history(&state, id)?))
}

async fn driver_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverFinancialSummary>, AppError> {
    Ok(Json(reconcile::summarize(&state, id)?))
}

async fn all_summaries(State(state): State<Arc<AppState>>) -> Json<Vec<DriverFinancialSummary>> {
    Json(reconcile::summarize_all(&state))
}
