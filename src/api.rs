// src/api.rs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    Appointment, AppointmentPatch, Balance, BookingRequest, MedicalHistoryRecord,
    MedicalHistoryRequest, Paginated, Patient, Payment, PaymentRequest, Service, Specialist,
    Summary,
};
use crate::reasons::CancellationReason;
use crate::session::{AuthUser, Session, TokenPair, TokenRefresher};
use crate::status::AppointmentStatus;

/*
Every surface talks to the clinic API through this trait; the REST client
below is the production implementation and tests swap in an in-memory mock.
The server owns all persisted state; these calls either read it or propose
mutations the caller already validated.
*/

#[async_trait]
pub trait ClinicApi: Send + Sync {
    async fn appointments_page(
        &self,
        page: i64,
        limit: i64,
        status: Option<AppointmentStatus>,
    ) -> Result<Paginated<Appointment>, ApiError>;
    async fn appointments_all(&self) -> Result<Vec<Appointment>, ApiError>;
    async fn appointments_summary(&self) -> Result<Summary, ApiError>;
    async fn cancellation_reasons(&self) -> Result<Vec<CancellationReason>, ApiError>;
    async fn update_appointment(&self, id: i64, patch: &AppointmentPatch)
    -> Result<(), ApiError>;
    async fn create_appointment(&self, booking: &BookingRequest) -> Result<(), ApiError>;
    async fn patient_by_document(&self, document: &str) -> Result<Option<Patient>, ApiError>;
    async fn services(&self) -> Result<Vec<Service>, ApiError>;
    async fn specialists(&self) -> Result<Vec<Specialist>, ApiError>;
    async fn payments(&self) -> Result<Vec<Payment>, ApiError>;
    async fn create_payment(&self, req: &PaymentRequest) -> Result<(), ApiError>;
    async fn appointment_balance(&self, id: i64) -> Result<Balance, ApiError>;
    async fn medical_history(&self) -> Result<Vec<MedicalHistoryRecord>, ApiError>;
    async fn create_medical_history(&self, req: &MedicalHistoryRequest) -> Result<(), ApiError>;
}

/* ============================================================
   REST client
   ============================================================ */

pub struct RestClient {
    http: reqwest::Client,
    base: String,
    session: Arc<Session>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    admin_id: Option<i64>,
}

impl RestClient {
    pub fn new(cfg: &Config, session: Arc<Session>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base: format!("{}/api/v1", cfg.api_base_url.trim_end_matches('/')),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut req = self.http.request(method.clone(), self.url(path));
        if let Some(body) = body {
            req = req.json(body);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }

    /// Authenticated request: one attempt, and on 401 one coordinated
    /// refresh followed by a single retry.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let snapshot = self.session.snapshot();
        let resp = self
            .dispatch(&method, path, body.as_ref(), snapshot.access_token.as_deref())
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED || snapshot.access_token.is_none() {
            return Ok(resp);
        }

        let token = self
            .session
            .refresh_after_401(snapshot.generation, self)
            .await?;
        self.dispatch(&method, path, body.as_ref(), Some(&token))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.request(Method::GET, path, None).await?;
        Self::into_json(resp).await
    }

    async fn into_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        if status.is_success() {
            resp.json::<T>().await.map_err(ApiError::from)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ApiError::from_response(status.as_u16(), &body))
        }
    }

    async fn into_unit(resp: reqwest::Response) -> Result<(), ApiError> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ApiError::from_response(status.as_u16(), &body))
        }
    }

    /// `POST /auth/login`. Installs the token pair into the session and
    /// resolves the operator profile from `/auth/me`, best-effort.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser, ApiError> {
        let body = json!({ "email": email, "password": password });
        let resp = self
            .dispatch(&Method::POST, "/auth/login", Some(&body), None)
            .await?;
        let login: LoginResponse = Self::into_json(resp).await?;
        self.session.install(TokenPair {
            access_token: login.access_token,
            refresh_token: login.refresh_token,
        });

        let fallback = AuthUser {
            id: login.admin_id.unwrap_or(1),
            name: "Administrador".to_string(),
            email: email.to_string(),
        };
        match self.get_json::<Value>("/auth/me").await {
            Ok(me) => Ok(AuthUser {
                id: me
                    .get("admin_id")
                    .and_then(Value::as_i64)
                    .unwrap_or(fallback.id),
                name: me
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(&fallback.name)
                    .to_string(),
                email: me
                    .get("email")
                    .and_then(Value::as_str)
                    .unwrap_or(&fallback.email)
                    .to_string(),
            }),
            Err(err) => {
                tracing::debug!("could not load operator profile: {err}");
                Ok(fallback)
            }
        }
    }
}

#[async_trait]
impl TokenRefresher for RestClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let body = json!({ "refresh_token": refresh_token });
        let resp = self
            .dispatch(&Method::POST, "/auth/refresh", Some(&body), None)
            .await?;
        Self::into_json(resp).await
    }
}

#[async_trait]
impl ClinicApi for RestClient {
    async fn appointments_page(
        &self,
        page: i64,
        limit: i64,
        status: Option<AppointmentStatus>,
    ) -> Result<Paginated<Appointment>, ApiError> {
        let mut path = format!("/appointments/paginated?page={page}&limit={limit}");
        if let Some(status) = status {
            path.push_str(&format!("&status={status}"));
        }
        self.get_json(&path).await
    }

    async fn appointments_all(&self) -> Result<Vec<Appointment>, ApiError> {
        self.get_json("/appointments").await
    }

    async fn appointments_summary(&self) -> Result<Summary, ApiError> {
        self.get_json("/appointments/summary").await
    }

    async fn cancellation_reasons(&self) -> Result<Vec<CancellationReason>, ApiError> {
        self.get_json("/appointments/cancellation-reasons").await
    }

    async fn update_appointment(
        &self,
        id: i64,
        patch: &AppointmentPatch,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(patch).map_err(|e| ApiError::Decode(e.to_string()))?;
        let resp = self
            .request(Method::PUT, &format!("/admin/appointments/{id}"), Some(body))
            .await?;
        Self::into_unit(resp).await
    }

    async fn create_appointment(&self, booking: &BookingRequest) -> Result<(), ApiError> {
        let body = serde_json::to_value(booking).map_err(|e| ApiError::Decode(e.to_string()))?;
        let resp = self.request(Method::POST, "/appointments", Some(body)).await?;
        Self::into_unit(resp).await
    }

    async fn patient_by_document(&self, document: &str) -> Result<Option<Patient>, ApiError> {
        let resp = self
            .request(Method::GET, &format!("/patients/document/{document}"), None)
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::into_json(resp).await.map(Some)
    }

    async fn services(&self) -> Result<Vec<Service>, ApiError> {
        self.get_json("/services").await
    }

    async fn specialists(&self) -> Result<Vec<Specialist>, ApiError> {
        self.get_json("/specialists").await
    }

    async fn payments(&self) -> Result<Vec<Payment>, ApiError> {
        self.get_json("/payments").await
    }

    async fn create_payment(&self, req: &PaymentRequest) -> Result<(), ApiError> {
        let body = serde_json::to_value(req).map_err(|e| ApiError::Decode(e.to_string()))?;
        let resp = self.request(Method::POST, "/payments", Some(body)).await?;
        Self::into_unit(resp).await
    }

    async fn appointment_balance(&self, id: i64) -> Result<Balance, ApiError> {
        self.get_json(&format!("/appointments/{id}/balance")).await
    }

    async fn medical_history(&self) -> Result<Vec<MedicalHistoryRecord>, ApiError> {
        self.get_json("/medical-history").await
    }

    async fn create_medical_history(&self, req: &MedicalHistoryRequest) -> Result<(), ApiError> {
        let body = serde_json::to_value(req).map_err(|e| ApiError::Decode(e.to_string()))?;
        let resp = self
            .request(Method::POST, "/medical-history", Some(body))
            .await?;
        Self::into_unit(resp).await
    }
}

/* ============================================================
   In-memory mock for surface tests
   ============================================================ */
