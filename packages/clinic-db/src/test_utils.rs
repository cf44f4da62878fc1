//! Utilitários de teste: banco em memória já migrado e fábricas de contas

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use crate::accounts::{self, NewAdmin, NewDoctor, NewPatient, NewProfile, NewUser};
use crate::appointments::AppointmentInput;
use crate::billing::BillingInput;
use crate::migrations;
use crate::models::{
    Account, AdminRole, AppointmentStatus, Gender, Money, PaymentMethod, PaymentStatus, VisitType,
};
use crate::reports::ReportInput;

/// Cria um pool SQLite em memória com todas as migrações aplicadas.
///
/// O pool mantém uma única conexão viva; cada conexão `:memory:` é um banco
/// independente.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    migrations::run_migrations(&pool).await?;
    Ok(pool)
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@clinica.test"),
        first_name: username.to_string(),
        last_name: "Silva".to_string(),
        phone_number: Some("+5511999990000".to_string()),
        password_hash: "hash-de-teste".to_string(),
    }
}

pub fn new_patient_profile() -> NewProfile {
    NewProfile::Patient(NewPatient {
        date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap_or_default(),
        gender: Gender::Female,
        address: "Rua das Flores, 100".to_string(),
        emergency_contact_name: "Maria Silva".to_string(),
        emergency_contact_phone: "+5511988887777".to_string(),
        general_medical_history: String::new(),
        insurance_provider: "Unimed".to_string(),
        photo_url: String::new(),
    })
}

pub fn new_doctor_profile() -> NewProfile {
    NewProfile::Doctor(NewDoctor {
        license_number: "CRM-12345".to_string(),
        specialization: "Oftalmologia".to_string(),
        about: String::new(),
        photo_url: String::new(),
        first_visit_fee: Money::from_cents(25000),
        follow_up_fee: Money::from_cents(15000),
        education: String::new(),
        experiences: String::new(),
    })
}

pub fn new_admin_profile(role: AdminRole) -> NewProfile {
    NewProfile::Admin(NewAdmin { role })
}

pub async fn create_patient(pool: &SqlitePool, username: &str) -> anyhow::Result<Account> {
    Ok(accounts::create_account(pool, &new_user(username), &new_patient_profile()).await?)
}

pub async fn create_doctor(pool: &SqlitePool, username: &str) -> anyhow::Result<Account> {
    Ok(accounts::create_account(pool, &new_user(username), &new_doctor_profile()).await?)
}

pub async fn create_admin(pool: &SqlitePool, username: &str) -> anyhow::Result<Account> {
    Ok(accounts::create_account(
        pool,
        &new_user(username),
        &new_admin_profile(AdminRole::Manager),
    )
    .await?)
}

pub fn appointment_input(patient_id: Uuid, doctor_id: Uuid, when: DateTime<Utc>) -> AppointmentInput {
    AppointmentInput {
        patient_id,
        doctor_id,
        appointment_date: when,
        duration_minutes: 30,
        reason: "Revisão anual".to_string(),
        status: AppointmentStatus::Scheduled,
        covered_by_insurance: false,
        visit_type: VisitType::Routine,
    }
}

pub fn report_input(patient_id: Uuid, doctor_id: Uuid) -> ReportInput {
    ReportInput {
        patient_id,
        doctor_id,
        appointment_id: None,
        diagnosis_summary: "Miopia leve".to_string(),
        recommendations: "Uso de lentes corretivas".to_string(),
        follow_up_date: None,
    }
}

pub fn billing_input(report_id: Uuid, amount: Money, status: PaymentStatus) -> BillingInput {
    BillingInput {
        report_id,
        amount,
        insurance_coverage: Money::ZERO,
        payment_method: PaymentMethod::Cash,
        payment_status: status,
        billing_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap_or_default(),
    }
}
