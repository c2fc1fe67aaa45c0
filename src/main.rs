use std::sync::Arc;

use chrono::{Local, Utc};
use tracing_subscriber::EnvFilter;

use dcms_admin::api::{ClinicApi, RestClient};
use dcms_admin::config::Config;
use dcms_admin::session::Session;
use dcms_admin::surfaces::appointments::AppointmentsSurface;
use dcms_admin::surfaces::dashboard::{self, DashboardSurface};
use dcms_admin::surfaces::payments::PaymentsSurface;
use dcms_admin::util::format_cop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let session = Arc::new(Session::new());
    let client = Arc::new(RestClient::new(&cfg, session.clone())?);

    match (&cfg.admin_email, &cfg.admin_password) {
        (Some(email), Some(password)) => {
            let user = client.login(email, password).await?;
            tracing::info!("sesión iniciada como {} <{}>", user.name, user.email);
        }
        _ => tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set, continuing unauthenticated"),
    }

    let api: Arc<dyn ClinicApi> = client;

    let mut appointments = AppointmentsSurface::new(api.clone());
    appointments.refresh().await;

    let mut board = DashboardSurface::new(api.clone());
    board.refresh().await;

    let mut payments = PaymentsSurface::new(api);
    payments.refresh().await;

    let summary = &appointments.summary;
    println!(
        "Citas: {} total | {} pendientes | {} aprobadas | {} completadas | {} canceladas",
        summary.total, summary.pending, summary.scheduled, summary.completed, summary.cancelled
    );
    println!(
        "Pacientes únicos: {}",
        dashboard::distinct_patient_count(&board.appointments)
    );

    let all_payments = payments.filtered("", None);
    println!(
        "Pagos registrados: {} — Total pagado: {}",
        all_payments.len(),
        format_cop(PaymentsSurface::paid_total(&all_payments))
    );

    let now = Utc::now();
    let (year, month) = dashboard::local_year_month(now, &Local);
    if let Some(current) = dashboard::monthly_income(&board.payments, &Local, year, month).last() {
        println!("Ingresos de {}: {}", current.label, format_cop(current.total));
    }

    let today = now.with_timezone(&Local).date_naive();
    let todays = dashboard::on_local_day(&board.appointments, &Local, today);
    println!("Citas de hoy: {}", todays.len());
    for a in todays {
        println!(
            "  {} — {} ({})",
            a.start_time.with_timezone(&Local).format("%H:%M"),
            a.patient.full_name(),
            a.status.label()
        );
    }

    Ok(())
}
