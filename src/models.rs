// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::AppointmentStatus;
use crate::util::full_name;

/* -------------------------
   Catalog entities
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub document_number: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialist {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub specialty: String,
    pub license_number: String,
    #[serde(default)]
    pub phone: String,
    pub is_active: bool,
}

impl Specialist {
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub duration_minutes: i64,
    pub is_active: bool,
}

/* -------------------------
   Appointments
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub patient: Patient,
    pub specialist_id: i64,
    #[serde(default)]
    pub specialist: Option<Specialist>,
    pub service_id: i64,
    #[serde(default)]
    pub service: Option<Service>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    /// Price snapshot taken at creation; never re-derived from the service
    /// catalog, so later price changes do not rewrite past billing.
    pub historical_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_notes: Option<String>,
    #[serde(default)]
    pub modification_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Summary {
    pub total: i64,
    pub pending: i64,
    pub scheduled: i64,
    pub completed: i64,
    pub cancelled: i64,
}

/// Body for `PUT /admin/appointments/{id}`. Absent fields are omitted from
/// the request entirely, never sent as null or empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_notes: Option<String>,
}

impl AppointmentPatch {
    pub fn status_only(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/* -------------------------
   Booking
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingPatient {
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingRequest {
    pub patient: BookingPatient,
    pub specialist_id: i64,
    pub service_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/* -------------------------
   Payments
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pending,
    Cash,
    Nequi,
    Loyalty,
}

impl PaymentMethod {
    /// Traceable external methods need a reference code at capture time.
    pub fn requires_reference(self) -> bool {
        matches!(self, PaymentMethod::Nequi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Refunded,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payment {
    pub id: i64,
    #[serde(default)]
    pub appointment_id: Option<i64>,
    #[serde(default)]
    pub patient: Option<Patient>,
    #[serde(default)]
    pub service: Option<Service>,
    pub amount: f64,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Effective date for monthly grouping: explicit payment date, falling
    /// back to the record's creation time.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.payment_date.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub appointment_id: i64,
    pub amount: f64,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceStatus {
    Paid,
    Partial,
    Pending,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Balance {
    pub total_cost: f64,
    pub total_paid: f64,
    pub pending_balance: f64,
    pub status: BalanceStatus,
}

/* -------------------------
   Medical histories
--------------------------*/

#[derive(Debug, Clone, Deserialize)]
pub struct MedicalHistoryRecord {
    pub id: i64,
    pub appointment_id: i64,
    pub diagnosis: String,
    pub treatment: String,
    #[serde(default)]
    pub doctor_notes: Option<String>,
    #[serde(default)]
    pub attachments: Option<String>,
    #[serde(default)]
    pub next_appointment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicalHistoryRequest {
    pub appointment_id: i64,
    pub diagnosis: String,
    pub treatment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_appointment_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = AppointmentPatch {
            status: Some(AppointmentStatus::Cancelled),
            cancellation_reason: Some("no_show".into()),
            ..AppointmentPatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "cancelled", "cancellation_reason": "no_show"})
        );
    }

    #[test]
    fn test_empty_patch_serializes_to_empty_object() {
        let patch = AppointmentPatch::default();
        assert!(patch.is_empty());
        assert_eq!(serde_json::to_string(&patch).unwrap(), "{}");
    }

    #[test]
    fn test_booking_omits_blank_optionals() {
        let req = BookingRequest {
            patient: BookingPatient {
                document_number: "1234567890".into(),
                first_name: "Juan".into(),
                last_name: "Pérez".into(),
                phone: "3001234567".into(),
                email: None,
            },
            specialist_id: 2,
            service_id: 5,
            start_time: "2025-06-12T14:00:00Z".parse().unwrap(),
            end_time: "2025-06-12T14:30:00Z".parse().unwrap(),
            notes: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json["patient"].get("email").is_none());
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn test_payment_method_vocabulary() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Nequi).unwrap(),
            "\"nequi\""
        );
        assert!(PaymentMethod::Nequi.requires_reference());
        assert!(!PaymentMethod::Cash.requires_reference());
        assert!(!PaymentMethod::Pending.requires_reference());
        assert!(!PaymentMethod::Loyalty.requires_reference());
    }

    #[test]
    fn test_balance_status_wire_format() {
        let b: Balance = serde_json::from_str(
            r#"{"total_cost":85000,"total_paid":40000,"pending_balance":45000,"status":"PARTIAL"}"#,
        )
        .unwrap();
        assert_eq!(b.status, BalanceStatus::Partial);
    }
}
