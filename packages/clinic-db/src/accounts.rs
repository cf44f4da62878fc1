//! Repositório de contas: identidade e perfis por papel
//!
//! Um usuário e o seu perfil são sempre criados na mesma transação, e o tipo
//! do usuário é derivado da variante de [`NewProfile`], o que impede cadastrar
//! um papel sem o perfil correspondente.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    Account, Admin, AdminRole, Doctor, Gender, Money, Patient, RoleProfile, User, UserType,
};

/// Dados de identidade para cadastro
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub general_medical_history: String,
    pub insurance_provider: String,
    pub photo_url: String,
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub license_number: String,
    pub specialization: String,
    pub about: String,
    pub photo_url: String,
    pub first_visit_fee: Money,
    pub follow_up_fee: Money,
    pub education: String,
    pub experiences: String,
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub role: AdminRole,
}

/// Perfil a ser criado junto com o usuário
#[derive(Debug, Clone)]
pub enum NewProfile {
    Patient(NewPatient),
    Doctor(NewDoctor),
    Admin(NewAdmin),
}

impl NewProfile {
    pub fn user_type(&self) -> UserType {
        match self {
            NewProfile::Patient(_) => UserType::Patient,
            NewProfile::Doctor(_) => UserType::Doctor,
            NewProfile::Admin(_) => UserType::Admin,
        }
    }
}

/// Campos de identidade editáveis no perfil
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PatientUpdate {
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub general_medical_history: String,
    pub insurance_provider: String,
}

#[derive(Debug, Clone)]
pub struct DoctorUpdate {
    pub license_number: String,
    pub specialization: String,
    pub about: String,
    pub first_visit_fee: Money,
    pub follow_up_fee: Money,
    pub education: String,
    pub experiences: String,
}

/// Quais identificadores já estão em uso
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TakenIdentifiers {
    pub username: bool,
    pub email: bool,
}

impl TakenIdentifiers {
    pub fn any(&self) -> bool {
        self.username || self.email
    }
}

/// Médico com a sua identidade, para listagens
#[derive(Debug, Clone, serde::Serialize)]
pub struct DoctorListing {
    pub user: User,
    pub doctor: Doctor,
}

/// Cria usuário e perfil atomicamente
pub async fn create_account(
    pool: &SqlitePool,
    new_user: &NewUser,
    profile: &NewProfile,
) -> Result<Account, DbError> {
    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let user_type = profile.user_type();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, username, email, first_name, last_name, phone_number, \
         user_type, password_hash, is_superuser, is_active, date_joined) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 1, ?)",
    )
    .bind(user_id)
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(&new_user.phone_number)
    .bind(user_type.as_str())
    .bind(&new_user.password_hash)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    match profile {
        NewProfile::Patient(p) => {
            sqlx::query(
                "INSERT INTO patients (user_id, date_of_birth, gender, address, \
                 emergency_contact_name, emergency_contact_phone, general_medical_history, \
                 insurance_provider, photo_url) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(p.date_of_birth)
            .bind(p.gender.as_str())
            .bind(&p.address)
            .bind(&p.emergency_contact_name)
            .bind(&p.emergency_contact_phone)
            .bind(&p.general_medical_history)
            .bind(&p.insurance_provider)
            .bind(&p.photo_url)
            .execute(&mut *tx)
            .await?;
        }
        NewProfile::Doctor(d) => {
            sqlx::query(
                "INSERT INTO doctors (user_id, license_number, specialization, about, photo_url, \
                 first_visit_fee_cents, follow_up_fee_cents, education, experiences) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(&d.license_number)
            .bind(&d.specialization)
            .bind(&d.about)
            .bind(&d.photo_url)
            .bind(d.first_visit_fee.cents())
            .bind(d.follow_up_fee.cents())
            .bind(&d.education)
            .bind(&d.experiences)
            .execute(&mut *tx)
            .await?;
        }
        NewProfile::Admin(a) => {
            sqlx::query("INSERT INTO admins (user_id, role, updated_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(a.role.as_str())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }
    }

    let account = load_account(&mut tx, user_id).await?;
    tx.commit().await?;

    info!(user_id = %user_id, user_type = %user_type, "Conta criada");
    Ok(account)
}

/// Verifica se username ou email já estão em uso (email sem distinção de caixa)
pub async fn find_taken_identifiers(
    pool: &SqlitePool,
    username: &str,
    email: &str,
) -> Result<TakenIdentifiers, DbError> {
    let (username_taken, email_taken): (bool, bool) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?), \
                EXISTS(SELECT 1 FROM users WHERE email = ? COLLATE NOCASE)",
    )
    .bind(username)
    .bind(email)
    .fetch_one(pool)
    .await?;

    Ok(TakenIdentifiers {
        username: username_taken,
        email: email_taken,
    })
}

pub async fn get_user(pool: &SqlitePool, user_id: Uuid) -> Result<User, DbError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("usuário"))
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, DbError> {
    Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, DbError> {
    Ok(
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? COLLATE NOCASE")
            .bind(email)
            .fetch_optional(pool)
            .await?,
    )
}

/// Carrega o usuário e o perfil correspondente ao seu papel
pub async fn get_account(pool: &SqlitePool, user_id: Uuid) -> Result<Account, DbError> {
    let mut conn = pool.acquire().await?;
    load_account(&mut conn, user_id).await
}

async fn load_account(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Account, DbError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("usuário"))?;

    let profile = match user.user_type {
        UserType::Patient => RoleProfile::Patient(
            sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| DbError::not_found("perfil de paciente"))?,
        ),
        UserType::Doctor => RoleProfile::Doctor(
            sqlx::query_as::<_, Doctor>("SELECT * FROM doctors WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| DbError::not_found("perfil de médico"))?,
        ),
        UserType::Admin => RoleProfile::Admin(
            sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| DbError::not_found("perfil de administrador"))?,
        ),
    };

    Ok(Account { user, profile })
}

pub async fn get_patient(pool: &SqlitePool, user_id: Uuid) -> Result<Patient, DbError> {
    sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("paciente"))
}

pub async fn get_doctor(pool: &SqlitePool, user_id: Uuid) -> Result<Doctor, DbError> {
    sqlx::query_as::<_, Doctor>("SELECT * FROM doctors WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("médico"))
}

pub async fn get_admin(pool: &SqlitePool, user_id: Uuid) -> Result<Admin, DbError> {
    sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("administrador"))
}

/// Todos os médicos com seus dados de identidade, ordenados por nome
pub async fn list_doctors(pool: &SqlitePool) -> Result<Vec<DoctorListing>, DbError> {
    let doctors = sqlx::query_as::<_, Doctor>("SELECT * FROM doctors")
        .fetch_all(pool)
        .await?;
    let mut users: HashMap<Uuid, User> =
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_type = 'doctor'")
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

    let mut listings: Vec<DoctorListing> = doctors
        .into_iter()
        .filter_map(|doctor| {
            users
                .remove(&doctor.user_id)
                .map(|user| DoctorListing { user, doctor })
        })
        .collect();
    listings.sort_by(|a, b| {
        (&a.user.last_name, &a.user.first_name).cmp(&(&b.user.last_name, &b.user.first_name))
    });
    Ok(listings)
}

async fn update_user_fields(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    update: &UserUpdate,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE users SET first_name = ?, last_name = ?, email = ?, phone_number = ? WHERE id = ?",
    )
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(&update.email)
    .bind(&update.phone_number)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("usuário"));
    }
    Ok(())
}

/// Atualiza identidade e perfil de paciente na mesma transação
pub async fn update_patient_profile(
    pool: &SqlitePool,
    user_id: Uuid,
    user: &UserUpdate,
    patient: &PatientUpdate,
) -> Result<Account, DbError> {
    let mut tx = pool.begin().await?;

    update_user_fields(&mut tx, user_id, user).await?;

    let result = sqlx::query(
        "UPDATE patients SET date_of_birth = ?, gender = ?, address = ?, \
         emergency_contact_name = ?, emergency_contact_phone = ?, general_medical_history = ?, \
         insurance_provider = ? WHERE user_id = ?",
    )
    .bind(patient.date_of_birth)
    .bind(patient.gender.as_str())
    .bind(&patient.address)
    .bind(&patient.emergency_contact_name)
    .bind(&patient.emergency_contact_phone)
    .bind(&patient.general_medical_history)
    .bind(&patient.insurance_provider)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("paciente"));
    }

    let account = load_account(&mut tx, user_id).await?;
    tx.commit().await?;
    Ok(account)
}

/// Atualiza identidade e perfil de médico na mesma transação. A avaliação não
/// é alterada.
pub async fn update_doctor_profile(
    pool: &SqlitePool,
    user_id: Uuid,
    user: &UserUpdate,
    doctor: &DoctorUpdate,
) -> Result<Account, DbError> {
    let mut tx = pool.begin().await?;

    update_user_fields(&mut tx, user_id, user).await?;

    let result = sqlx::query(
        "UPDATE doctors SET license_number = ?, specialization = ?, about = ?, \
         first_visit_fee_cents = ?, follow_up_fee_cents = ?, education = ?, experiences = ? \
         WHERE user_id = ?",
    )
    .bind(&doctor.license_number)
    .bind(&doctor.specialization)
    .bind(&doctor.about)
    .bind(doctor.first_visit_fee.cents())
    .bind(doctor.follow_up_fee.cents())
    .bind(&doctor.education)
    .bind(&doctor.experiences)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("médico"));
    }

    let account = load_account(&mut tx, user_id).await?;
    tx.commit().await?;
    Ok(account)
}

pub async fn update_admin_role(
    pool: &SqlitePool,
    user_id: Uuid,
    role: AdminRole,
) -> Result<Admin, DbError> {
    let result = sqlx::query("UPDATE admins SET role = ?, updated_at = ? WHERE user_id = ?")
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("administrador"));
    }
    get_admin(pool, user_id).await
}

pub async fn set_patient_photo(pool: &SqlitePool, user_id: Uuid, url: &str) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE patients SET photo_url = ? WHERE user_id = ?")
        .bind(url)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("paciente"));
    }
    Ok(())
}

pub async fn set_doctor_photo(pool: &SqlitePool, user_id: Uuid, url: &str) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE doctors SET photo_url = ? WHERE user_id = ?")
        .bind(url)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("médico"));
    }
    Ok(())
}

pub async fn set_password_hash(
    pool: &SqlitePool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("usuário"));
    }
    Ok(())
}

pub async fn record_login(
    pool: &SqlitePool,
    user_id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(at)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Concede ou revoga o acesso de superusuário
pub async fn set_superuser(
    pool: &SqlitePool,
    username: &str,
    is_superuser: bool,
) -> Result<User, DbError> {
    let result = sqlx::query("UPDATE users SET is_superuser = ? WHERE username = ?")
        .bind(is_superuser)
        .bind(username)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("usuário"));
    }
    find_user_by_username(pool, username)
        .await?
        .ok_or_else(|| DbError::not_found("usuário"))
}

/// Remove o usuário; perfil, registros clínicos, sessões e códigos caem em cascata
pub async fn delete_user(pool: &SqlitePool, user_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("usuário"));
    }
    info!(user_id = %user_id, "Usuário removido");
    Ok(())
}
