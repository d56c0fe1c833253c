use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::reservation::{
    DriverAssignment, DriverPaymentStatus, ManualDriver, PaymentMethod, Reservation,
    ReservationStatus,
};

// Hosted-store documents come in two shapes: an early flat layout and a later
// one nesting trip fields under `tripDetails` and passenger fields under
// `customerInfo`. Both normalize to the same canonical Reservation here, so
// nothing past this boundary ever sees a raw document.
pub fn reservation_from_document(doc: &Value) -> Result<Reservation, AppError> {
    let id = match doc.get("id").and_then(Value::as_str) {
        Some(raw) => Uuid::from_str(raw)
            .map_err(|err| AppError::Validation(format!("invalid reservation id: {err}")))?,
        None => Uuid::new_v4(),
    };

    let status_raw = required_str(doc, "status")?;
    let status = ReservationStatus::parse(status_raw)
        .ok_or_else(|| AppError::Validation(format!("unknown status: {status_raw}")))?;

    let method_raw = required_str(doc, "paymentMethod")?;
    let payment_method = PaymentMethod::parse(method_raw)
        .ok_or_else(|| AppError::Validation(format!("unknown payment method: {method_raw}")))?;

    let total_price = decimal_field(doc, "totalPrice")?
        .ok_or_else(|| AppError::Validation("missing totalPrice".to_string()))?;

    let trip = doc.get("tripDetails");
    let customer = doc.get("customerInfo");

    let pickup = flat_or_nested_str(doc, "pickup", trip, "pickup")
        .ok_or_else(|| AppError::Validation("missing pickup".to_string()))?;
    let dropoff = flat_or_nested_str(doc, "dropoff", trip, "dropoff")
        .ok_or_else(|| AppError::Validation("missing dropoff".to_string()))?;

    let passenger_name =
        flat_or_nested_str(doc, "name", customer, "name").unwrap_or_default();
    let passenger_phone =
        flat_or_nested_str(doc, "phone", customer, "phone").unwrap_or_default();

    let pickup_date = flat_or_nested_str(doc, "pickupDate", trip, "date")
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|err| AppError::Validation(format!("invalid pickup date: {err}")))
        })
        .transpose()?;

    let pickup_time = flat_or_nested_str(doc, "pickupTime", trip, "time")
        .map(|raw| parse_time(&raw))
        .transpose()?;

    let assigned_driver = parse_assignment(doc)?;

    let driver_payment_status = match doc.get("driverPaymentStatus").and_then(Value::as_str) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(DriverPaymentStatus::Pending),
            "paid" => Some(DriverPaymentStatus::Paid),
            other => {
                return Err(AppError::Validation(format!(
                    "unknown driver payment status: {other}"
                )))
            }
        },
        None => None,
    };

    let now = Utc::now();

    Ok(Reservation {
        id,
        status,
        payment_method,
        total_price,
        assigned_driver,
        driver_payment_status,
        pickup,
        dropoff,
        pickup_date,
        pickup_time,
        passenger_name,
        passenger_phone,
        created_at: timestamp_field(doc, "createdAt")?.unwrap_or(now),
        updated_at: timestamp_field(doc, "updatedAt")?.unwrap_or(now),
        completed_at: timestamp_field(doc, "completedAt")?,
        cancelled_at: timestamp_field(doc, "cancelledAt")?,
        last_edited_at: timestamp_field(doc, "lastEditedAt")?,
    })
}

fn parse_assignment(doc: &Value) -> Result<DriverAssignment, AppError> {
    let Some(raw) = doc.get("assignedDriverId").and_then(Value::as_str) else {
        return Ok(DriverAssignment::Unassigned);
    };

    if raw.eq_ignore_ascii_case("manual") {
        let manual = doc
            .get("manualDriver")
            .ok_or_else(|| AppError::Validation("missing manualDriver record".to_string()))?;
        return Ok(DriverAssignment::Manual(ManualDriver {
            name: manual
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            phone: manual
                .get("phone")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }));
    }

    let id = Uuid::from_str(raw)
        .map_err(|err| AppError::Validation(format!("invalid assigned driver id: {err}")))?;
    Ok(DriverAssignment::Driver(id))
}

fn required_str<'a>(doc: &'a Value, key: &str) -> Result<&'a str, AppError> {
    doc.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation(format!("missing {key}")))
}

fn flat_or_nested_str(
    doc: &Value,
    flat_key: &str,
    nested: Option<&Value>,
    nested_key: &str,
) -> Option<String> {
    doc.get(flat_key)
        .and_then(Value::as_str)
        .or_else(|| nested.and_then(|n| n.get(nested_key)).and_then(Value::as_str))
        .map(str::to_string)
}

fn decimal_field(doc: &Value, key: &str) -> Result<Option<Decimal>, AppError> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .map(Some)
            .map_err(|err| AppError::Validation(format!("invalid {key}: {err}"))),
        Some(Value::String(s)) => Decimal::from_str(s)
            .map(Some)
            .map_err(|err| AppError::Validation(format!("invalid {key}: {err}"))),
        Some(other) => Err(AppError::Validation(format!(
            "invalid {key}: expected number, got {other}"
        ))),
    }
}

fn timestamp_field(doc: &Value, key: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    match doc.get(key).and_then(Value::as_str) {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|err| AppError::Validation(format!("invalid {key}: {err}"))),
        None => Ok(None),
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|err| AppError::Validation(format!("invalid pickup time: {err}")))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::reservation_from_document;
    use crate::models::reservation::{
        DriverAssignment, PaymentMethod, ReservationStatus,
    };

    #[test]
    fn flat_and_nested_documents_normalize_to_same_shape() {
        let flat = json!({
            "status": "pending",
            "paymentMethod": "cash",
            "totalPrice": "42.50",
            "pickup": "Airport T2",
            "dropoff": "Hotel Plaza",
            "pickupDate": "2026-09-01",
            "pickupTime": "14:30",
            "name": "Ada",
            "phone": "+49123",
        });

        let nested = json!({
            "status": "PENDING",
            "paymentMethod": "cash",
            "totalPrice": 42.5,
            "tripDetails": {
                "pickup": "Airport T2",
                "dropoff": "Hotel Plaza",
                "date": "2026-09-01",
                "time": "14:30:00",
            },
            "customerInfo": { "name": "Ada", "phone": "+49123" },
        });

        let a = reservation_from_document(&flat).unwrap();
        let b = reservation_from_document(&nested).unwrap();

        assert_eq!(a.status, ReservationStatus::Pending);
        assert_eq!(a.status, b.status);
        assert_eq!(a.total_price, dec!(42.50));
        assert_eq!(a.total_price, b.total_price);
        assert_eq!(a.pickup, b.pickup);
        assert_eq!(a.dropoff, b.dropoff);
        assert_eq!(a.pickup_date, b.pickup_date);
        assert_eq!(a.pickup_time, b.pickup_time);
        assert_eq!(a.passenger_name, b.passenger_name);
    }

    #[test]
    fn status_parsing_is_case_insensitive_and_accepts_legacy_spellings() {
        for (raw, expected) in [
            ("Completed", ReservationStatus::Completed),
            ("IN_PROGRESS", ReservationStatus::InProgress),
            ("started", ReservationStatus::InProgress),
            ("canceled", ReservationStatus::Cancelled),
        ] {
            let doc = json!({
                "status": raw,
                "paymentMethod": "card",
                "totalPrice": 10,
                "pickup": "A",
                "dropoff": "B",
            });
            let reservation = reservation_from_document(&doc).unwrap();
            assert_eq!(reservation.status, expected, "status {raw}");
        }
    }

    #[test]
    fn manual_driver_sentinel_yields_embedded_record() {
        let doc = json!({
            "status": "completed",
            "paymentMethod": "card",
            "totalPrice": 80,
            "pickup": "A",
            "dropoff": "B",
            "assignedDriverId": "manual",
            "manualDriver": { "name": "Ferry", "phone": "+301" },
        });

        let reservation = reservation_from_document(&doc).unwrap();
        match reservation.assigned_driver {
            DriverAssignment::Manual(ref m) => assert_eq!(m.name, "Ferry"),
            ref other => panic!("expected manual assignment, got {other:?}"),
        }
        assert_eq!(reservation.payment_method, PaymentMethod::Card);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let doc = json!({
            "status": "parked",
            "paymentMethod": "cash",
            "totalPrice": 10,
            "pickup": "A",
            "dropoff": "B",
        });

        assert!(reservation_from_document(&doc).is_err());
    }
}
