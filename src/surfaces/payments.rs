// src/surfaces/payments.rs

use std::sync::Arc;

use crate::api::ClinicApi;
use crate::error::ApiError;
use crate::models::{Balance, BalanceStatus, Payment, PaymentMethod, PaymentRequest, PaymentStatus};
use crate::surfaces::Notice;

/* ============================================================
   Payments surface
   ============================================================ */

pub struct PaymentsSurface {
    api: Arc<dyn ClinicApi>,
    pub payments: Vec<Payment>,
    pub loading: bool,
    pub saving: bool,
    notices: Vec<Notice>,
}

/// Manual payment capture form. The zero-amount pending record created when
/// an appointment completes lives alongside anything captured here; it never
/// blocks manual registration.
#[derive(Debug, Clone, Default)]
pub struct PaymentForm {
    pub appointment_id: Option<i64>,
    pub amount: f64,
    pub method: Option<PaymentMethod>,
    pub reference: String,
    pub notes: String,
}

impl PaymentsSurface {
    pub fn new(api: Arc<dyn ClinicApi>) -> Self {
        Self {
            api,
            payments: Vec::new(),
            loading: false,
            saving: false,
            notices: Vec::new(),
        }
    }

    pub async fn refresh(&mut self) {
        self.loading = true;
        match self.api.payments().await {
            Ok(payments) => self.payments = payments,
            Err(err) => {
                tracing::warn!("payment fetch failed: {err}");
                self.payments.clear();
            }
        }
        self.loading = false;
    }

    pub fn filtered(
        &self,
        search: &str,
        status: Option<PaymentStatus>,
    ) -> Vec<&Payment> {
        let q = search.trim().to_lowercase();
        self.payments
            .iter()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .filter(|p| {
                if q.is_empty() {
                    return true;
                }
                let patient = p
                    .patient
                    .as_ref()
                    .map(|pt| pt.full_name().to_lowercase())
                    .unwrap_or_default();
                let service = p
                    .service
                    .as_ref()
                    .map(|s| s.name.to_lowercase())
                    .unwrap_or_default();
                patient.contains(&q) || service.contains(&q)
            })
            .collect()
    }

    /// Sum of paid amounts in the given view.
    pub fn paid_total(payments: &[&Payment]) -> f64 {
        payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .map(|p| p.amount)
            .sum()
    }

    pub async fn register_payment(&mut self, form: &PaymentForm) -> bool {
        let request = match validate_payment_form(form) {
            Ok(request) => request,
            Err(message) => {
                self.push(Notice::error(message));
                return false;
            }
        };

        self.saving = true;
        let result = self.api.create_payment(&request).await;
        let created = match result {
            Ok(()) => {
                self.refresh().await;
                self.push(Notice::success("Pago registrado correctamente"));
                true
            }
            Err(ApiError::Validation { message, .. }) => {
                self.push(Notice::error(if message.is_empty() {
                    "Datos inválidos".to_string()
                } else {
                    message
                }));
                false
            }
            Err(err) => {
                tracing::warn!("payment registration failed: {err}");
                self.push(Notice::error("Error al registrar el pago"));
                false
            }
        };
        self.saving = false;
        created
    }

    pub async fn balance(&self, appointment_id: i64) -> Result<Balance, ApiError> {
        self.api.appointment_balance(appointment_id).await
    }

    fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

/// Local mirror of the server's balance rule: everything covered is PAID,
/// anything on top of a partial payment is PARTIAL, untouched is PENDING.
pub fn derive_balance_status(total_cost: f64, total_paid: f64) -> BalanceStatus {
    if total_paid >= total_cost {
        BalanceStatus::Paid
    } else if total_paid > 0.0 {
        BalanceStatus::Partial
    } else {
        BalanceStatus::Pending
    }
}

fn validate_payment_form(form: &PaymentForm) -> Result<PaymentRequest, String> {
    let Some(appointment_id) = form.appointment_id else {
        return Err("Selecciona la cita a pagar".to_string());
    };
    let Some(method) = form.method else {
        return Err("Selecciona un método de pago".to_string());
    };
    if form.amount <= 0.0 {
        return Err("El monto debe ser mayor a cero".to_string());
    }
    let reference = form.reference.trim();
    if method.requires_reference() && reference.is_empty() {
        return Err("El método seleccionado requiere un código de referencia".to_string());
    }
    let notes = form.notes.trim();
    Ok(PaymentRequest {
        appointment_id,
        amount: form.amount,
        method,
        reference: (!reference.is_empty()).then(|| reference.to_string()),
        notes: (!notes.is_empty()).then(|| notes.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::MockApi;
    use crate::surfaces::NoticeKind;

    fn form(method: PaymentMethod, amount: f64) -> PaymentForm {
        PaymentForm {
            appointment_id: Some(4),
            amount,
            method: Some(method),
            ..PaymentForm::default()
        }
    }

    #[test]
    fn test_balance_status_derivation() {
        assert_eq!(derive_balance_status(85_000.0, 85_000.0), BalanceStatus::Paid);
        assert_eq!(
            derive_balance_status(85_000.0, 40_000.0),
            BalanceStatus::Partial
        );
        assert_eq!(derive_balance_status(85_000.0, 0.0), BalanceStatus::Pending);
        // a fully zero-cost appointment counts as covered
        assert_eq!(derive_balance_status(0.0, 0.0), BalanceStatus::Paid);
    }

    #[test]
    fn test_nequi_requires_reference() {
        let err = validate_payment_form(&form(PaymentMethod::Nequi, 50_000.0)).unwrap_err();
        assert!(err.contains("referencia"));

        let mut ok = form(PaymentMethod::Nequi, 50_000.0);
        ok.reference = "NQ-12345".into();
        let request = validate_payment_form(&ok).unwrap();
        assert_eq!(request.reference.as_deref(), Some("NQ-12345"));

        // cash needs no reference
        assert!(validate_payment_form(&form(PaymentMethod::Cash, 50_000.0)).is_ok());
    }

    #[test]
    fn test_amount_must_be_positive() {
        assert!(validate_payment_form(&form(PaymentMethod::Cash, 0.0)).is_err());
        assert!(validate_payment_form(&form(PaymentMethod::Cash, -5.0)).is_err());
    }

    #[tokio::test]
    async fn test_register_payment_happy_path() {
        let mock = Arc::new(MockApi::with_appointments(vec![]));
        let mut s = PaymentsSurface::new(mock.clone());

        let created = s.register_payment(&form(PaymentMethod::Cash, 85_000.0)).await;

        assert!(created);
        let captured = mock.payments_created.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].appointment_id, 4);
        assert_eq!(captured[0].method, PaymentMethod::Cash);
        drop(captured);
        assert_eq!(s.notices()[0].kind, NoticeKind::Success);
        assert!(!s.saving);
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_the_network() {
        let mock = Arc::new(MockApi::with_appointments(vec![]));
        let mut s = PaymentsSurface::new(mock.clone());

        let created = s.register_payment(&form(PaymentMethod::Nequi, 85_000.0)).await;

        assert!(!created);
        assert!(mock.payments_created.lock().unwrap().is_empty());
        assert_eq!(s.notices()[0].kind, NoticeKind::Error);
    }

    #[tokio::test]
    async fn test_filtering_and_paid_total() {
        let mock = Arc::new(MockApi::with_appointments(vec![]));
        mock.add_payment_record(1, 4, 85_000.0, PaymentStatus::Paid);
        mock.add_payment_record(2, 5, 40_000.0, PaymentStatus::Paid);
        mock.add_payment_record(3, 6, 0.0, PaymentStatus::Pending);
        let mut s = PaymentsSurface::new(mock.clone());
        s.refresh().await;

        let all = s.filtered("", None);
        assert_eq!(all.len(), 3);
        assert_eq!(PaymentsSurface::paid_total(&all), 125_000.0);

        let paid = s.filtered("", Some(PaymentStatus::Paid));
        assert_eq!(paid.len(), 2);

        let by_patient = s.filtered("paciente5", None);
        assert_eq!(by_patient.len(), 1);
        assert_eq!(by_patient[0].id, 2);
    }

    #[tokio::test]
    async fn test_auto_pending_record_does_not_block_manual_capture() {
        let mock = Arc::new(MockApi::with_appointments(vec![]));
        // the side-effect record from completing the appointment
        mock.add_payment_record(1, 4, 0.0, PaymentStatus::Pending);
        mock.balance_for(4, 85_000.0, 0.0);
        let mut s = PaymentsSurface::new(mock.clone());
        s.refresh().await;

        let created = s.register_payment(&form(PaymentMethod::Cash, 85_000.0)).await;
        assert!(created);

        // the pending record contributed nothing to the balance
        let balance = s.balance(4).await.unwrap();
        assert_eq!(balance.status, BalanceStatus::Pending);
        assert_eq!(balance.total_paid, 0.0);
    }
}
