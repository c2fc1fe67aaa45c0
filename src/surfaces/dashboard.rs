// src/surfaces/dashboard.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::api::ClinicApi;
use crate::models::{Appointment, Payment, PaymentStatus};
use crate::reasons::label_for;
use crate::status::AppointmentStatus;
use crate::util::{month_abbrev, months_back};

/* ============================================================
   Dashboard surface
   ============================================================ */

/// Read-only snapshot for the dashboard. Both collections are refetched in
/// full on every refresh; all derivations below recompute from scratch.
pub struct DashboardSurface {
    api: Arc<dyn ClinicApi>,
    pub appointments: Vec<Appointment>,
    pub payments: Vec<Payment>,
    pub loading: bool,
}

impl DashboardSurface {
    pub fn new(api: Arc<dyn ClinicApi>) -> Self {
        Self {
            api,
            appointments: Vec::new(),
            payments: Vec::new(),
            loading: false,
        }
    }

    pub async fn refresh(&mut self) {
        self.loading = true;
        self.appointments = match self.api.appointments_all().await {
            Ok(appointments) => appointments,
            Err(err) => {
                tracing::warn!("dashboard appointment fetch failed: {err}");
                Vec::new()
            }
        };
        self.payments = match self.api.payments().await {
            Ok(payments) => payments,
            Err(err) => {
                tracing::warn!("dashboard payment fetch failed: {err}");
                Vec::new()
            }
        };
        self.loading = false;
    }
}

/* ============================================================
   Pure aggregations
   ============================================================ */

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub label: &'static str,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub patient_id: i64,
    pub patient_name: String,
    pub appointment_count: usize,
}

/// Unique patients seen across the appointment collection.
pub fn distinct_patient_count(appointments: &[Appointment]) -> usize {
    let mut ids: Vec<i64> = appointments.iter().map(|a| a.patient_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}

pub fn count_in_month<Tz: TimeZone>(
    appointments: &[Appointment],
    tz: &Tz,
    year: i32,
    month: u32,
) -> usize {
    appointments
        .iter()
        .filter(|a| {
            let d = a.start_time.with_timezone(tz);
            d.year() == year && d.month() == month
        })
        .count()
}

pub fn pending_count(appointments: &[Appointment]) -> usize {
    appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Pending)
        .count()
}

/// Paid income per calendar month for the trailing six months, oldest first.
pub fn monthly_income<Tz: TimeZone>(
    payments: &[Payment],
    tz: &Tz,
    now_year: i32,
    now_month: u32,
) -> Vec<MonthlyTotal> {
    (0..6u32)
        .rev()
        .map(|back| {
            let (year, month) = months_back(now_year, now_month, back);
            let total = payments
                .iter()
                .filter(|p| p.status == PaymentStatus::Paid)
                .filter(|p| {
                    let d = p.effective_date().with_timezone(tz);
                    d.year() == year && d.month() == month
                })
                .map(|p| p.amount)
                .sum();
            MonthlyTotal {
                year,
                month,
                label: month_abbrev(month),
                total,
            }
        })
        .collect()
}

/// Appointment counts per service name, busiest first.
pub fn appointments_per_service(appointments: &[Appointment]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for a in appointments {
        let name = a
            .service
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| format!("Servicio {}", a.service_id));
        *counts.entry(name).or_insert(0) += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// Cancellations grouped by the month the appointment was last touched,
/// which for a frozen appointment is the cancellation itself.
pub fn cancellations_by_month<Tz: TimeZone>(
    appointments: &[Appointment],
    tz: &Tz,
) -> Vec<((i32, u32), usize)> {
    let mut counts: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for a in appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Cancelled)
    {
        let d = a.updated_at.with_timezone(tz);
        *counts.entry((d.year(), d.month())).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

pub fn cancellations_by_reason(appointments: &[Appointment]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for a in appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Cancelled)
    {
        let code = a.cancellation_reason.as_deref().unwrap_or("other");
        let label = label_for(code).map(str::to_string).unwrap_or_else(|| code.to_string());
        *counts.entry(label).or_insert(0) += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// Patients ranked by appointment count; ties resolve by patient id.
pub fn patient_leaderboard(appointments: &[Appointment], top: usize) -> Vec<LeaderboardEntry> {
    let mut counts: BTreeMap<i64, (String, usize)> = BTreeMap::new();
    for a in appointments {
        let entry = counts
            .entry(a.patient_id)
            .or_insert_with(|| (a.patient.full_name(), 0));
        entry.1 += 1;
    }
    let mut out: Vec<LeaderboardEntry> = counts
        .into_iter()
        .map(|(patient_id, (patient_name, appointment_count))| LeaderboardEntry {
            patient_id,
            patient_name,
            appointment_count,
        })
        .collect();
    out.sort_by(|a, b| {
        b.appointment_count
            .cmp(&a.appointment_count)
            .then_with(|| a.patient_id.cmp(&b.patient_id))
    });
    out.truncate(top);
    out
}

/// Appointments starting on the given local calendar day.
pub fn on_local_day<'a, Tz: TimeZone>(
    appointments: &'a [Appointment],
    tz: &Tz,
    day: NaiveDate,
) -> Vec<&'a Appointment> {
    appointments
        .iter()
        .filter(|a| a.start_time.with_timezone(tz).date_naive() == day)
        .collect()
}

/// Convenience for callers that only have an instant.
pub fn local_year_month<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> (i32, u32) {
    let d = now.with_timezone(tz);
    (d.year(), d.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{sample_appointment, sample_patient, ts, MockApi};
    use chrono::FixedOffset;
    use AppointmentStatus::*;

    fn bogota() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn paid(id: i64, amount: f64, date: &str) -> Payment {
        Payment {
            id,
            appointment_id: Some(id),
            patient: None,
            service: None,
            amount,
            payment_date: Some(ts(date)),
            payment_method: Some(crate::models::PaymentMethod::Cash),
            status: PaymentStatus::Paid,
            created_at: ts(date),
        }
    }

    fn cancelled(id: i64, reason: &str, updated_at: &str) -> Appointment {
        let mut a = sample_appointment(id, Cancelled);
        a.cancellation_reason = Some(reason.to_string());
        a.updated_at = ts(updated_at);
        a
    }

    #[test]
    fn test_distinct_patients_counts_unique_references() {
        let mut a = sample_appointment(1, Pending);
        let mut b = sample_appointment(2, Pending);
        let c = sample_appointment(3, Pending);
        // two appointments for the same patient
        b.patient_id = 1;
        b.patient = sample_patient(1);
        a.patient_id = 1;
        assert_eq!(distinct_patient_count(&[a, b, c]), 2);
    }

    #[test]
    fn test_monthly_income_sums_paid_only() {
        let payments = vec![
            paid(1, 85_000.0, "2025-06-10T15:00:00Z"),
            paid(2, 40_000.0, "2025-06-20T15:00:00Z"),
            paid(3, 99_000.0, "2025-05-02T15:00:00Z"),
            Payment {
                status: PaymentStatus::Pending,
                ..paid(4, 1_000_000.0, "2025-06-15T15:00:00Z")
            },
            Payment {
                status: PaymentStatus::Refunded,
                ..paid(5, 500_000.0, "2025-06-16T15:00:00Z")
            },
        ];
        let months = monthly_income(&payments, &bogota(), 2025, 6);
        assert_eq!(months.len(), 6);
        assert_eq!(months[0].month, 1);
        assert_eq!(months[0].label, "ene");
        assert_eq!(months[5].month, 6);
        assert_eq!(months[5].total, 125_000.0);
        assert_eq!(months[4].total, 99_000.0);
    }

    #[test]
    fn test_monthly_income_groups_by_local_month() {
        // 02:00 UTC on July 1 is still June 30 in Bogotá
        let payments = vec![paid(1, 10_000.0, "2025-07-01T02:00:00Z")];
        let months = monthly_income(&payments, &bogota(), 2025, 7);
        assert_eq!(months[4].month, 6);
        assert_eq!(months[4].total, 10_000.0);
        assert_eq!(months[5].total, 0.0);
    }

    #[test]
    fn test_appointments_per_service_falls_back_to_id() {
        let mut a = sample_appointment(1, Pending);
        let b = sample_appointment(2, Pending);
        a.service = None;
        a.service_id = 9;
        let counts = appointments_per_service(&[a, b]);
        assert_eq!(counts.len(), 2);
        assert!(counts.contains(&("Servicio 9".to_string(), 1)));
        assert!(counts.contains(&("Servicio 1".to_string(), 1)));
    }

    #[test]
    fn test_cancellation_groupings() {
        let appointments = vec![
            cancelled(1, "no_show", "2025-05-10T15:00:00Z"),
            cancelled(2, "no_show", "2025-06-02T15:00:00Z"),
            cancelled(3, "emergency", "2025-06-03T15:00:00Z"),
            sample_appointment(4, Completed),
        ];

        let by_month = cancellations_by_month(&appointments, &bogota());
        assert_eq!(by_month, vec![((2025, 5), 1), ((2025, 6), 2)]);

        let by_reason = cancellations_by_reason(&appointments);
        assert_eq!(by_reason[0], ("No se presentó".to_string(), 2));
        assert_eq!(by_reason[1], ("Emergencia del paciente".to_string(), 1));
    }

    #[test]
    fn test_patient_leaderboard_orders_and_truncates() {
        let mut appointments = vec![
            sample_appointment(1, Completed),
            sample_appointment(2, Completed),
            sample_appointment(3, Completed),
        ];
        // patient 2 shows up twice
        appointments.push({
            let mut a = sample_appointment(4, Pending);
            a.patient_id = 2;
            a.patient = sample_patient(2);
            a
        });

        let board = patient_leaderboard(&appointments, 2);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].patient_id, 2);
        assert_eq!(board[0].appointment_count, 2);
        // tie between patients 1 and 3 resolves by id
        assert_eq!(board[1].patient_id, 1);
    }

    #[test]
    fn test_on_local_day() {
        let mut a = sample_appointment(1, Scheduled);
        let mut b = sample_appointment(2, Scheduled);
        a.start_time = ts("2025-06-12T14:00:00Z");
        // 03:00 UTC on June 13 is still June 12 in Bogotá
        b.start_time = ts("2025-06-13T03:00:00Z");
        let appointments = vec![a, b];

        let day = NaiveDate::from_ymd_opt(2025, 6, 12).unwrap();
        let todays = on_local_day(&appointments, &bogota(), day);
        assert_eq!(todays.len(), 2);

        let next = NaiveDate::from_ymd_opt(2025, 6, 13).unwrap();
        assert!(on_local_day(&appointments, &bogota(), next).is_empty());
    }

    #[tokio::test]
    async fn test_refresh_degrades_to_empty_collections() {
        let mock = Arc::new(MockApi::with_appointments(vec![sample_appointment(
            1, Pending,
        )]));
        let mut s = DashboardSurface::new(mock.clone());
        s.refresh().await;
        assert_eq!(s.appointments.len(), 1);
        assert!(s.payments.is_empty());
        assert!(!s.loading);
        assert_eq!(pending_count(&s.appointments), 1);
    }
}
