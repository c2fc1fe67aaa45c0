// src/surfaces/appointments.rs

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime};

use crate::api::ClinicApi;
use crate::error::ApiError;
use crate::models::{
    Appointment, AppointmentPatch, BookingPatient, BookingRequest, MedicalHistoryRequest,
    PaymentMethod, PaymentRequest, Service, Specialist, Summary,
};
use crate::reasons::{CancellationReason, fallback_reasons};
use crate::status::{ALL_STATUSES, AppointmentStatus, can_transition};
use crate::surfaces::Notice;
use crate::util::{from_edit_value, to_edit_value};

/* ============================================================
   Forms and controls
   ============================================================ */

#[derive(Debug, Clone, Default)]
pub struct CancelForm {
    pub reason: String,
    pub notes: String,
}

/// Open cancellation capture for one appointment. The guard admitted
/// `current_status → cancelled` before this exists.
#[derive(Debug, Clone)]
pub struct CancelWorkflow {
    pub appointment_id: i64,
    pub current_status: AppointmentStatus,
    pub form: CancelForm,
    pub field_error: Option<String>,
    pub saving: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EditForm {
    pub specialist_id: Option<i64>,
    pub service_id: Option<i64>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub status: Option<AppointmentStatus>,
}

/// One option of a status-change control. Illegal targets render disabled,
/// never merely warned about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOption {
    pub status: AppointmentStatus,
    pub current: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatientLookup {
    #[default]
    Idle,
    Found,
    New,
}

#[derive(Debug, Clone, Default)]
pub struct BookingForm {
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub specialist_id: Option<i64>,
    pub service_id: Option<i64>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub notes: String,
    pub lookup: PatientLookup,
    pub locked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryForm {
    pub diagnosis: String,
    pub treatment: String,
    pub doctor_notes: String,
    pub attachments: String,
    pub next_appointment_date: Option<NaiveDateTime>,
}

/* ============================================================
   Appointments surface
   ============================================================ */

/*
Single mutation path for appointments. Every status change passes the
transition guard before anything touches the network; cancellations detour
through the reason workflow; after any confirmed mutation the local page is
reconciled against the active filter and the summary is refetched from the
server (never adjusted locally).
*/
pub struct AppointmentsSurface {
    api: Arc<dyn ClinicApi>,

    pub appointments: Vec<Appointment>,
    pub summary: Summary,
    pub services: Vec<Service>,
    pub specialists: Vec<Specialist>,
    pub reasons: Vec<CancellationReason>,
    pub histories_done: HashSet<i64>,

    pub filter: Option<AppointmentStatus>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,

    pub loading: bool,
    pub saving: bool,
    pub cancel_workflow: Option<CancelWorkflow>,

    notices: Vec<Notice>,
}

impl AppointmentsSurface {
    pub fn new(api: Arc<dyn ClinicApi>) -> Self {
        Self {
            api,
            appointments: Vec::new(),
            summary: Summary::default(),
            services: Vec::new(),
            specialists: Vec::new(),
            reasons: Vec::new(),
            histories_done: HashSet::new(),
            filter: None,
            page: 1,
            limit: 10,
            total: 0,
            total_pages: 1,
            loading: false,
            saving: false,
            cancel_workflow: None,
            notices: Vec::new(),
        }
    }

    pub async fn refresh(&mut self) {
        self.fetch_summary().await;
        self.fetch_page(1, self.limit).await;
        self.load_catalogs().await;
        self.load_histories().await;
        self.load_reasons().await;
    }

    /* ============================================================
       Fetching and reconciliation
       ============================================================ */

    pub async fn fetch_page(&mut self, page: i64, limit: i64) {
        self.loading = true;
        self.limit = limit;
        match self.api.appointments_page(page, limit, self.filter).await {
            Ok(fetched) => {
                self.appointments = fetched.data;
                self.total = fetched.total;
                self.total_pages = fetched.total_pages;
                self.page = fetched.page;
            }
            Err(err) => {
                // Paginated endpoint unavailable: degrade to the unfiltered
                // collection shown as a single page.
                tracing::warn!("paginated fetch failed ({err}), using full collection");
                match self.api.appointments_all().await {
                    Ok(all) => {
                        self.total = all.len() as i64;
                        self.appointments = all;
                        self.page = 1;
                        self.total_pages = 1;
                    }
                    Err(err) => {
                        tracing::warn!("appointment fetch failed: {err}");
                        self.appointments.clear();
                        self.total = 0;
                        self.page = 1;
                        self.total_pages = 1;
                    }
                }
            }
        }
        self.loading = false;
    }

    /// Summary counts always come from the server; adjusting them locally
    /// would compound drift across concurrent operators.
    pub async fn fetch_summary(&mut self) {
        match self.api.appointments_summary().await {
            Ok(summary) => self.summary = summary,
            Err(err) => tracing::debug!("summary refresh failed: {err}"),
        }
    }

    pub async fn apply_filter(&mut self, filter: Option<AppointmentStatus>) {
        self.filter = filter;
        self.fetch_page(1, self.limit).await;
    }

    async fn load_catalogs(&mut self) {
        match self.api.services().await {
            Ok(services) => {
                self.services = services.into_iter().filter(|s| s.is_active).collect();
            }
            Err(err) => tracing::debug!("service catalog load failed: {err}"),
        }
        match self.api.specialists().await {
            Ok(specialists) => {
                self.specialists = specialists.into_iter().filter(|s| s.is_active).collect();
            }
            Err(err) => tracing::debug!("specialist catalog load failed: {err}"),
        }
    }

    async fn load_histories(&mut self) {
        match self.api.medical_history().await {
            Ok(records) => {
                self.histories_done = records.iter().map(|r| r.appointment_id).collect();
            }
            Err(err) => tracing::debug!("medical history load failed: {err}"),
        }
    }

    async fn load_reasons(&mut self) {
        match self.api.cancellation_reasons().await {
            Ok(list) => self.reasons = list,
            Err(err) => {
                tracing::warn!("cancellation-reason catalog unavailable ({err}), using built-in list");
                self.reasons = fallback_reasons();
            }
        }
    }

    /// Display-only correction: an appointment whose new status no longer
    /// matches the active filter leaves the current page. The next full
    /// fetch of that filter is authoritative.
    fn strip_filtered(&mut self) {
        if let Some(filter) = self.filter {
            self.appointments.retain(|a| a.status == filter);
        }
    }

    fn apply_local_status(
        &mut self,
        id: i64,
        status: AppointmentStatus,
        cancellation: Option<&CancelForm>,
    ) {
        if let Some(entry) = self.appointments.iter_mut().find(|a| a.id == id) {
            entry.status = status;
            if let Some(form) = cancellation {
                entry.cancellation_reason = Some(form.reason.clone());
                let notes = form.notes.trim();
                entry.cancellation_notes = (!notes.is_empty()).then(|| notes.to_string());
            }
        }
        self.strip_filtered();
    }

    /* ============================================================
       Status transitions
       ============================================================ */

    pub fn is_editable(&self, appointment: &Appointment) -> bool {
        !appointment.status.is_frozen()
    }

    pub fn status_options(&self, appointment: &Appointment) -> Vec<StatusOption> {
        let frozen = appointment.status.is_frozen();
        ALL_STATUSES
            .iter()
            .map(|&status| StatusOption {
                status,
                current: status == appointment.status,
                enabled: !frozen && can_transition(appointment.status, status),
            })
            .collect()
    }

    pub async fn change_status(&mut self, id: i64, new_status: AppointmentStatus) {
        let Some(current) = self
            .appointments
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.status)
        else {
            return;
        };
        if !can_transition(current, new_status) {
            tracing::debug!("transition {current} -> {new_status} rejected for appointment {id}");
            return;
        }
        if new_status == AppointmentStatus::Cancelled {
            // Cancelling always requires a reason first.
            self.open_cancel_workflow(id);
            return;
        }

        self.saving = true;
        let result = self
            .api
            .update_appointment(id, &AppointmentPatch::status_only(new_status))
            .await;
        match result {
            Ok(()) => {
                self.apply_local_status(id, new_status, None);
                self.fetch_summary().await;
                self.push(Notice::success("Estado actualizado correctamente"));
                if new_status == AppointmentStatus::Completed {
                    self.auto_pending_payment(id).await;
                }
            }
            Err(err) => {
                tracing::warn!("status update failed for appointment {id}: {err}");
                self.push(Notice::error("Error al actualizar el estado"));
            }
        }
        self.saving = false;
    }

    /// Best-effort side effect of completion: a zero-amount pending payment
    /// so the payment queue picks the appointment up. Failure never rolls
    /// back the completed status.
    async fn auto_pending_payment(&mut self, appointment_id: i64) {
        let req = PaymentRequest {
            appointment_id,
            amount: 0.0,
            method: PaymentMethod::Pending,
            reference: None,
            notes: Some("Pago pendiente - generado al completar cita".to_string()),
        };
        match self.api.create_payment(&req).await {
            Ok(()) => self.push(Notice::info(format!(
                "Nuevo registro de pago generado para la cita #{appointment_id}"
            ))),
            Err(err) => tracing::warn!(
                "pending payment creation failed for appointment {appointment_id}: {err}"
            ),
        }
    }

    /* ============================================================
       Cancellation workflow
       ============================================================ */

    pub fn open_cancel_workflow(&mut self, id: i64) {
        let Some(current) = self
            .appointments
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.status)
        else {
            return;
        };
        if !can_transition(current, AppointmentStatus::Cancelled) {
            tracing::debug!("cancellation not available from {current} for appointment {id}");
            return;
        }
        self.cancel_workflow = Some(CancelWorkflow {
            appointment_id: id,
            current_status: current,
            form: CancelForm::default(),
            field_error: None,
            saving: false,
        });
    }

    pub fn set_cancel_reason(&mut self, code: &str) {
        if let Some(wf) = self.cancel_workflow.as_mut() {
            wf.form.reason = code.to_string();
            wf.field_error = None;
        }
    }

    pub fn set_cancel_notes(&mut self, notes: &str) {
        if let Some(wf) = self.cancel_workflow.as_mut() {
            wf.form.notes = notes.to_string();
        }
    }

    pub fn close_cancel_workflow(&mut self) {
        self.cancel_workflow = None;
    }

    pub async fn confirm_cancel(&mut self) {
        let (id, form) = match self.cancel_workflow.as_mut() {
            None => return,
            Some(wf) => {
                if wf.form.reason.trim().is_empty() {
                    wf.field_error =
                        Some("Debes seleccionar un motivo de cancelación".to_string());
                    return;
                }
                wf.saving = true;
                (wf.appointment_id, wf.form.clone())
            }
        };

        let notes = form.notes.trim();
        let patch = AppointmentPatch {
            status: Some(AppointmentStatus::Cancelled),
            cancellation_reason: Some(form.reason.clone()),
            cancellation_notes: (!notes.is_empty()).then(|| notes.to_string()),
            ..AppointmentPatch::default()
        };

        let result = self.api.update_appointment(id, &patch).await;
        if let Some(wf) = self.cancel_workflow.as_mut() {
            wf.saving = false;
        }

        match result {
            Ok(()) => {
                self.apply_local_status(id, AppointmentStatus::Cancelled, Some(&form));
                self.fetch_summary().await;
                self.cancel_workflow = None;
                self.push(Notice::success("Cita cancelada correctamente"));
            }
            Err(err) if err.is_already_cancelled() => {
                // Another operator got there first; the server state is
                // already what we wanted.
                self.cancel_workflow = None;
                self.push(Notice::info("Esta cita ya se encuentra cancelada"));
            }
            Err(ApiError::Validation { message, .. }) => {
                if let Some(wf) = self.cancel_workflow.as_mut() {
                    wf.field_error = Some(if message.is_empty() {
                        "Debes seleccionar un motivo de cancelación".to_string()
                    } else {
                        message
                    });
                }
            }
            Err(ApiError::Server(err)) => {
                tracing::warn!("cancellation failed for appointment {id}: {err}");
                self.push(Notice::error("Error interno del servidor"));
            }
            Err(err) => {
                tracing::warn!("cancellation failed for appointment {id}: {err}");
                self.push(Notice::error("Error al cancelar la cita"));
            }
        }
    }

    /* ============================================================
       Field edits
       ============================================================ */

    /// Edit values for reopening the detail form; instants become local
    /// wall-clock values, lossless at whole-minute precision.
    pub fn edit_form_for(&self, appointment: &Appointment) -> EditForm {
        EditForm {
            specialist_id: Some(appointment.specialist_id),
            service_id: Some(appointment.service_id),
            start_time: Some(to_edit_value(appointment.start_time, &Local)),
            end_time: Some(to_edit_value(appointment.end_time, &Local)),
            status: Some(appointment.status),
        }
    }

    pub async fn save_edit(&mut self, id: i64, form: &EditForm) {
        let Some(appointment) = self.appointments.iter().find(|a| a.id == id).cloned() else {
            return;
        };
        if appointment.status.is_frozen() {
            tracing::debug!(
                "edit rejected: appointment {id} is {status}",
                status = appointment.status
            );
            return;
        }

        // Only fields that actually changed go on the wire.
        let mut patch = AppointmentPatch::default();
        if let Some(specialist_id) = form.specialist_id {
            if specialist_id != appointment.specialist_id {
                patch.specialist_id = Some(specialist_id);
            }
        }
        if let Some(service_id) = form.service_id {
            if service_id != appointment.service_id {
                patch.service_id = Some(service_id);
            }
        }
        if let Some(start) = form.start_time.and_then(|v| from_edit_value(v, &Local)) {
            if start != appointment.start_time {
                patch.start_time = Some(start);
            }
        }
        if let Some(end) = form.end_time.and_then(|v| from_edit_value(v, &Local)) {
            if end != appointment.end_time {
                patch.end_time = Some(end);
            }
        }
        if let Some(status) = form.status {
            if status != appointment.status {
                if !can_transition(appointment.status, status) {
                    tracing::debug!(
                        "transition {from} -> {status} rejected for appointment {id}",
                        from = appointment.status
                    );
                    return;
                }
                if status == AppointmentStatus::Cancelled {
                    self.open_cancel_workflow(id);
                    return;
                }
                patch.status = Some(status);
            }
        }

        if patch.is_empty() {
            // Nothing changed; re-confirming the current state is suppressed.
            return;
        }

        self.saving = true;
        let result = self.api.update_appointment(id, &patch).await;
        match result {
            Ok(()) => {
                self.apply_patch_locally(id, &patch);
                self.fetch_summary().await;
                self.push(Notice::success("Cambios guardados correctamente"));
            }
            Err(err) => {
                tracing::warn!("edit failed for appointment {id}: {err}");
                self.push(Notice::error("Error al guardar los cambios"));
            }
        }
        self.saving = false;
    }

    fn apply_patch_locally(&mut self, id: i64, patch: &AppointmentPatch) {
        if let Some(entry) = self.appointments.iter_mut().find(|a| a.id == id) {
            if let Some(specialist_id) = patch.specialist_id {
                entry.specialist_id = specialist_id;
                entry.specialist = self
                    .specialists
                    .iter()
                    .find(|s| s.id == specialist_id)
                    .cloned();
            }
            if let Some(service_id) = patch.service_id {
                entry.service_id = service_id;
                entry.service = self.services.iter().find(|s| s.id == service_id).cloned();
            }
            if let Some(start) = patch.start_time {
                entry.start_time = start;
            }
            if let Some(end) = patch.end_time {
                entry.end_time = end;
            }
            if let Some(status) = patch.status {
                entry.status = status;
            }
        }
        self.strip_filtered();
    }

    /* ============================================================
       Booking
       ============================================================ */

    /// Document lookup for the new-appointment form: a match autofills and
    /// locks the patient block, a miss clears it for manual entry.
    pub async fn lookup_patient(&mut self, form: &mut BookingForm) {
        let document = form.document_number.trim().to_string();
        if document.is_empty() {
            return;
        }
        match self.api.patient_by_document(&document).await {
            Ok(Some(patient)) => {
                form.first_name = patient.first_name;
                form.last_name = patient.last_name;
                form.phone = patient.phone;
                form.email = patient.email;
                form.lookup = PatientLookup::Found;
                form.locked = true;
            }
            Ok(None) => {
                form.first_name.clear();
                form.last_name.clear();
                form.phone.clear();
                form.email.clear();
                form.lookup = PatientLookup::New;
                form.locked = false;
            }
            Err(err) => {
                tracing::debug!("patient lookup failed: {err}");
                form.lookup = PatientLookup::New;
                form.locked = false;
            }
        }
    }

    /// End time follows the selected service's duration whenever the start
    /// time is known.
    pub fn apply_service_duration(&self, form: &mut BookingForm) {
        let Some(service) = form
            .service_id
            .and_then(|id| self.services.iter().find(|s| s.id == id))
        else {
            return;
        };
        if let Some(start) = form.start_time {
            form.end_time = Some(start + Duration::minutes(service.duration_minutes));
        }
    }

    pub async fn create_appointment(&mut self, form: &BookingForm) -> bool {
        let required_missing = form.document_number.trim().is_empty()
            || form.first_name.trim().is_empty()
            || form.last_name.trim().is_empty()
            || form.phone.trim().is_empty();
        let (Some(specialist_id), Some(service_id), Some(start), Some(end)) = (
            form.specialist_id,
            form.service_id,
            form.start_time,
            form.end_time,
        ) else {
            self.push(Notice::error("Completa todos los campos obligatorios"));
            return false;
        };
        if required_missing {
            self.push(Notice::error("Completa todos los campos obligatorios"));
            return false;
        }
        let (Some(start_time), Some(end_time)) =
            (from_edit_value(start, &Local), from_edit_value(end, &Local))
        else {
            self.push(Notice::error("Completa todos los campos obligatorios"));
            return false;
        };

        let email = form.email.trim();
        let notes = form.notes.trim();
        let request = BookingRequest {
            patient: BookingPatient {
                document_number: form.document_number.trim().to_string(),
                first_name: form.first_name.trim().to_string(),
                last_name: form.last_name.trim().to_string(),
                phone: form.phone.trim().to_string(),
                email: (!email.is_empty()).then(|| email.to_string()),
            },
            specialist_id,
            service_id,
            start_time,
            end_time,
            notes: (!notes.is_empty()).then(|| notes.to_string()),
        };

        self.saving = true;
        let result = self.api.create_appointment(&request).await;
        let created = match result {
            Ok(()) => {
                self.fetch_page(1, self.limit).await;
                self.fetch_summary().await;
                self.push(Notice::success("Cita creada correctamente"));
                true
            }
            Err(err) => {
                tracing::warn!("booking failed: {err}");
                self.push(Notice::error("Error al crear la cita"));
                false
            }
        };
        self.saving = false;
        created
    }

    /* ============================================================
       Medical histories
       ============================================================ */

    pub fn can_record_history(&self, appointment: &Appointment) -> bool {
        appointment.status == AppointmentStatus::Completed
            && !self.histories_done.contains(&appointment.id)
    }

    pub async fn create_history(&mut self, appointment_id: i64, form: &HistoryForm) -> bool {
        let available = self
            .appointments
            .iter()
            .find(|a| a.id == appointment_id)
            .map(|a| self.can_record_history(a))
            .unwrap_or(false);
        if !available {
            tracing::debug!("medical history not available for appointment {appointment_id}");
            return false;
        }
        if form.diagnosis.trim().is_empty() || form.treatment.trim().is_empty() {
            self.push(Notice::error("Diagnóstico y tratamiento son obligatorios"));
            return false;
        }

        let doctor_notes = form.doctor_notes.trim();
        let attachments = form.attachments.trim();
        let request = MedicalHistoryRequest {
            appointment_id,
            diagnosis: form.diagnosis.trim().to_string(),
            treatment: form.treatment.trim().to_string(),
            doctor_notes: (!doctor_notes.is_empty()).then(|| doctor_notes.to_string()),
            attachments: (!attachments.is_empty()).then(|| attachments.to_string()),
            next_appointment_date: form
                .next_appointment_date
                .and_then(|v| from_edit_value(v, &Local)),
        };

        self.saving = true;
        let result = self.api.create_medical_history(&request).await;
        let created = match result {
            Ok(()) => {
                self.histories_done.insert(appointment_id);
                self.push(Notice::success("Historia clínica creada correctamente"));
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
                tracing::warn!("medical history creation failed: {err}");
                self.push(Notice::error("Error al crear la historia clínica"));
                false
            }
        };
        self.saving = false;
        created
    }

    /* ============================================================
       Display helpers and notices
       ============================================================ */

    pub fn filtered(&self, search: &str) -> Vec<&Appointment> {
        let q = search.trim().to_lowercase();
        if q.is_empty() {
            return self.appointments.iter().collect();
        }
        self.appointments
            .iter()
            .filter(|a| {
                a.patient.full_name().to_lowercase().contains(&q)
                    || a.patient.document_number.contains(&q)
                    || a.patient.email.to_lowercase().contains(&q)
            })
            .collect()
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

/* ============================================================
   Tests
   ============================================================ */
