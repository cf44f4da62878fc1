//! Modelos de dados compartilhados entre aplicações
//!
//! Este módulo define as estruturas de dados principais da clínica: identidade,
//! perfis por papel e registros clínicos.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use thiserror::Error;
use uuid::Uuid;

/// Valor textual desconhecido para um enum persistido como TEXT
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Valor inválido para {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Declara um enum persistido como TEXT, com a mesma grafia no banco e no JSON
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum! {
    /// Papel do usuário, fixado no cadastro
    pub enum UserType {
        Patient => "patient",
        Doctor => "doctor",
        Admin => "admin",
    }
}

text_enum! {
    pub enum Gender {
        Male => "male",
        Female => "female",
        Other => "other",
    }
}

text_enum! {
    /// Nível de acesso de um administrador
    pub enum AdminRole {
        SuperAdmin => "super_admin",
        Manager => "manager",
        Staff => "staff",
    }
}

text_enum! {
    /// Status de um agendamento. Qualquer transição é permitida.
    pub enum AppointmentStatus {
        Scheduled => "scheduled",
        Completed => "completed",
        Cancelled => "cancelled",
        /// Paciente não compareceu
        NoShow => "no_show",
    }
}

text_enum! {
    pub enum VisitType {
        Routine => "routine",
        FollowUp => "follow_up",
    }
}

text_enum! {
    /// Finalidade da lente prescrita
    pub enum LensType {
        Distance => "distance",
        Read => "read",
    }
}

text_enum! {
    pub enum PaymentMethod {
        Cash => "cash",
        Credit => "credit",
        Insurance => "insurance",
        Check => "check",
    }
}

text_enum! {
    pub enum PaymentStatus {
        Paid => "paid",
        Pending => "pending",
        Denied => "denied",
    }
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Scheduled
    }
}

impl Default for VisitType {
    fn default() -> Self {
        VisitType::Routine
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

/// Lê uma coluna TEXT e converte para o enum correspondente
pub(crate) fn decode_text<T>(row: &SqliteRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: ParseEnumError| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Valor monetário em centavos.
///
/// Serializado como texto decimal com duas casas (`"120.50"`); aceita texto ou
/// número na entrada.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Valor monetário inválido: {0}")]
pub struct ParseMoneyError(pub String);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    fn from_f64(value: f64) -> Result<Self, ParseMoneyError> {
        let cents = (value * 100.0).round();
        if !cents.is_finite() || cents.abs() > i64::MAX as f64 {
            return Err(ParseMoneyError(value.to_string()));
        }
        Ok(Money(cents as i64))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseMoneyError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (units, fraction) = match digits.split_once('.') {
            Some((u, f)) => (u, f),
            None => (digits, ""),
        };
        if units.is_empty()
            || fraction.len() > 2
            || !units.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let units: i64 = units.parse().map_err(|_| invalid())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        let cents = units
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(invalid)?;
        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Integer(i64),
            Number(f64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            Repr::Integer(units) => units
                .checked_mul(100)
                .map(Money)
                .ok_or_else(|| serde::de::Error::custom("valor monetário fora do intervalo")),
            Repr::Number(value) => Money::from_f64(value).map_err(serde::de::Error::custom),
        }
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).sum())
    }
}

/// Identidade de um usuário
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub user_type: UserType,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl FromRow<'_, SqliteRow> for User {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            phone_number: row.try_get("phone_number")?,
            user_type: decode_text(row, "user_type")?,
            password_hash: row.try_get("password_hash")?,
            is_superuser: row.try_get("is_superuser")?,
            is_active: row.try_get("is_active")?,
            date_joined: row.try_get("date_joined")?,
            last_login: row.try_get("last_login")?,
        })
    }
}

/// Perfil de paciente; a chave primária é o id do usuário
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub user_id: Uuid,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub general_medical_history: String,
    pub insurance_provider: String,
    pub photo_url: String,
}

impl Patient {
    /// Idade em anos completos na data informada
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        let born = self.date_of_birth;
        let mut age = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            age -= 1;
        }
        age
    }
}

impl FromRow<'_, SqliteRow> for Patient {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            date_of_birth: row.try_get("date_of_birth")?,
            gender: decode_text(row, "gender")?,
            address: row.try_get("address")?,
            emergency_contact_name: row.try_get("emergency_contact_name")?,
            emergency_contact_phone: row.try_get("emergency_contact_phone")?,
            general_medical_history: row.try_get("general_medical_history")?,
            insurance_provider: row.try_get("insurance_provider")?,
            photo_url: row.try_get("photo_url")?,
        })
    }
}

/// Perfil de médico. `rating` é derivado e nunca gravado pela API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub user_id: Uuid,
    pub license_number: String,
    pub specialization: String,
    pub about: String,
    pub rating: f64,
    pub photo_url: String,
    pub first_visit_fee: Money,
    pub follow_up_fee: Money,
    pub education: String,
    pub experiences: String,
}

impl FromRow<'_, SqliteRow> for Doctor {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            license_number: row.try_get("license_number")?,
            specialization: row.try_get("specialization")?,
            about: row.try_get("about")?,
            rating: row.try_get("rating")?,
            photo_url: row.try_get("photo_url")?,
            first_visit_fee: Money::from_cents(row.try_get("first_visit_fee_cents")?),
            follow_up_fee: Money::from_cents(row.try_get("follow_up_fee_cents")?),
            education: row.try_get("education")?,
            experiences: row.try_get("experiences")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub user_id: Uuid,
    pub role: AdminRole,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Admin {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            role: decode_text(row, "role")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Perfil específico do papel, exatamente um por usuário
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "profile", rename_all = "snake_case")]
pub enum RoleProfile {
    Patient(Patient),
    Doctor(Doctor),
    Admin(Admin),
}

impl RoleProfile {
    pub fn user_type(&self) -> UserType {
        match self {
            RoleProfile::Patient(_) => UserType::Patient,
            RoleProfile::Doctor(_) => UserType::Doctor,
            RoleProfile::Admin(_) => UserType::Admin,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            RoleProfile::Patient(p) => p.user_id,
            RoleProfile::Doctor(d) => d.user_id,
            RoleProfile::Admin(a) => a.user_id,
        }
    }
}

/// Usuário com o seu perfil de papel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user: User,
    pub profile: RoleProfile,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        matches!(self.profile, RoleProfile::Admin(_))
    }

    pub fn is_staff(&self) -> bool {
        self.user.is_superuser || self.is_admin()
    }
}

/// Quais registros clínicos uma consulta de listagem deve enxergar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    All,
    Patient(Uuid),
    Doctor(Uuid),
}

/// Representa uma consulta/agendamento
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    /// Duração prevista em minutos
    pub duration_minutes: i64,
    pub reason: String,
    pub status: AppointmentStatus,
    pub covered_by_insurance: bool,
    pub visit_type: VisitType,
}

impl FromRow<'_, SqliteRow> for Appointment {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            doctor_id: row.try_get("doctor_id")?,
            appointment_date: row.try_get("appointment_date")?,
            duration_minutes: row.try_get("duration_minutes")?,
            reason: row.try_get("reason")?,
            status: decode_text(row, "status")?,
            covered_by_insurance: row.try_get("covered_by_insurance")?,
            visit_type: decode_text(row, "visit_type")?,
        })
    }
}

/// Medidas de um olho
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyePrescription {
    pub sphere: f64,
    pub cylinder: f64,
    pub axis: i64,
}

/// Receita de óculos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionGlasses {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub lens_type: LensType,
    pub left: EyePrescription,
    pub right: EyePrescription,
    pub prescription_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub notes: Option<String>,
}

impl FromRow<'_, SqliteRow> for PrescriptionGlasses {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            doctor_id: row.try_get("doctor_id")?,
            lens_type: decode_text(row, "lens_type")?,
            left: EyePrescription {
                sphere: row.try_get("left_sphere")?,
                cylinder: row.try_get("left_cylinder")?,
                axis: row.try_get("left_axis")?,
            },
            right: EyePrescription {
                sphere: row.try_get("right_sphere")?,
                cylinder: row.try_get("right_cylinder")?,
                axis: row.try_get("right_axis")?,
            },
            prescription_date: row.try_get("prescription_date")?,
            expiration_date: row.try_get("expiration_date")?,
            notes: row.try_get("notes")?,
        })
    }
}

/// Laudo diagnóstico
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// Anulado quando o agendamento é removido
    pub appointment_id: Option<Uuid>,
    pub diagnosis_summary: String,
    pub recommendations: String,
    pub follow_up_date: Option<NaiveDate>,
}

impl FromRow<'_, SqliteRow> for Report {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            doctor_id: row.try_get("doctor_id")?,
            appointment_id: row.try_get("appointment_id")?,
            diagnosis_summary: row.try_get("diagnosis_summary")?,
            recommendations: row.try_get("recommendations")?,
            follow_up_date: row.try_get("follow_up_date")?,
        })
    }
}

/// Cobrança vinculada a um laudo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Billing {
    pub id: Uuid,
    pub report_id: Uuid,
    pub amount: Money,
    pub insurance_coverage: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub billing_date: NaiveDate,
}

impl FromRow<'_, SqliteRow> for Billing {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            report_id: row.try_get("report_id")?,
            amount: Money::from_cents(row.try_get("amount_cents")?),
            insurance_coverage: Money::from_cents(row.try_get("insurance_coverage_cents")?),
            payment_method: decode_text(row, "payment_method")?,
            payment_status: decode_text(row, "payment_status")?,
            billing_date: row.try_get("billing_date")?,
        })
    }
}

/// Código de redefinição de senha, armazenado apenas como HMAC
#[derive(Debug, Clone)]
pub struct PasswordResetCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl PasswordResetCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl FromRow<'_, SqliteRow> for PasswordResetCode {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            code_hash: row.try_get("code_hash")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            verified_at: row.try_get("verified_at")?,
        })
    }
}

/// Sessão de login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Session {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_matches_serde() {
        for status in AppointmentStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().to_string()));
        }
        for role in AdminRole::ALL {
            let json = serde_json::to_value(role).unwrap();
            assert_eq!(json, serde_json::Value::String(role.as_str().to_string()));
        }
        assert_eq!("follow_up".parse::<VisitType>(), Ok(VisitType::FollowUp));
        assert!("No-show".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn test_money_parsing() {
        assert_eq!("120.5".parse::<Money>(), Ok(Money::from_cents(12050)));
        assert_eq!("120".parse::<Money>(), Ok(Money::from_cents(12000)));
        assert_eq!("-0.07".parse::<Money>(), Ok(Money::from_cents(-7)));
        assert!("1.234".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
        assert_eq!(Money::from_cents(-705).to_string(), "-7.05");
    }

    #[test]
    fn test_money_json_accepts_text_and_numbers() {
        let from_text: Money = serde_json::from_str("\"99.90\"").unwrap();
        let from_float: Money = serde_json::from_str("99.9").unwrap();
        let from_int: Money = serde_json::from_str("99").unwrap();
        assert_eq!(from_text, Money::from_cents(9990));
        assert_eq!(from_float, Money::from_cents(9990));
        assert_eq!(from_int, Money::from_cents(9900));
        assert_eq!(serde_json::to_string(&from_text).unwrap(), "\"99.90\"");
    }

    #[test]
    fn test_patient_age() {
        let patient = Patient {
            user_id: Uuid::new_v4(),
            date_of_birth: NaiveDate::from_ymd_opt(2000, 6, 15).unwrap(),
            gender: Gender::Other,
            address: String::new(),
            emergency_contact_name: String::new(),
            emergency_contact_phone: String::new(),
            general_medical_history: String::new(),
            insurance_provider: String::new(),
            photo_url: String::new(),
        };
        assert_eq!(patient.age_on(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), 23);
        assert_eq!(patient.age_on(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), 24);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "ana".to_string(),
            email: "ana@clinica.test".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Souza".to_string(),
            phone_number: None,
            user_type: UserType::Patient,
            password_hash: "segredo".to_string(),
            is_superuser: false,
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["user_type"], "patient");
    }
}
