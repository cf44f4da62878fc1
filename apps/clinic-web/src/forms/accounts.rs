//! Formulários de contas: cadastro, login, perfis e senhas

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use clinic_db::accounts::{
    DoctorUpdate, NewAdmin, NewDoctor, NewPatient, NewProfile, NewUser, PatientUpdate, UserUpdate,
};
use clinic_db::models::{AdminRole, Gender, Money, UserType};
use serde::Deserialize;
use validator::Validate;

use super::{blank_as_none, validate_non_negative, validate_phone, validate_username, REQUIRED};
use crate::auth::password::password_problems;
use crate::error::FieldErrors;

fn default_specialization() -> String {
    "General".to_string()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Identidade informada no cadastro
#[derive(Debug, Clone, Validate)]
pub struct UserForm {
    #[validate(
        length(min = 1, max = 150, message = "Ensure this value has between 1 and 150 characters."),
        custom = "validate_username"
    )]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(max = 150))]
    pub first_name: String,
    #[validate(length(max = 150))]
    pub last_name: String,
    #[validate(custom = "validate_phone")]
    pub phone_number: Option<String>,
    pub password1: String,
    pub password2: String,
}

impl UserForm {
    pub fn errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::of(self);
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
        for problem in password_problems(&self.password1, &self.username) {
            errors.add("password1", problem);
        }
        errors
    }

    pub fn to_new_user(&self, password_hash: String) -> NewUser {
        NewUser {
            username: self.username.clone(),
            email: self.email.trim().to_string(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            password_hash,
        }
    }
}

/// Campos de identidade editáveis no perfil
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserUpdateForm {
    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(custom = "validate_phone")]
    #[serde(default, deserialize_with = "blank_as_none")]
    pub phone_number: Option<String>,
}

impl UserUpdateForm {
    pub fn to_update(&self) -> UserUpdate {
        UserUpdate {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.trim().to_string(),
            phone_number: self.phone_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PatientForm {
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[validate(length(min = 1, message = "This field is required."))]
    pub address: String,
    #[validate(length(min = 1, max = 100, message = "This field is required."))]
    pub emergency_contact_name: String,
    #[validate(custom = "validate_phone")]
    pub emergency_contact_phone: String,
    #[serde(default)]
    pub general_medical_history: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub insurance_provider: String,
}

impl PatientForm {
    pub fn errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::of(self);
        if self.date_of_birth > Utc::now().date_naive() {
            errors.add("date_of_birth", "Date of birth cannot be in the future.");
        }
        errors
    }

    pub fn to_new_patient(&self, photo_url: String) -> NewPatient {
        NewPatient {
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            address: self.address.clone(),
            emergency_contact_name: self.emergency_contact_name.clone(),
            emergency_contact_phone: self.emergency_contact_phone.clone(),
            general_medical_history: self.general_medical_history.clone(),
            insurance_provider: self.insurance_provider.clone(),
            photo_url,
        }
    }

    pub fn to_update(&self) -> PatientUpdate {
        PatientUpdate {
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            address: self.address.clone(),
            emergency_contact_name: self.emergency_contact_name.clone(),
            emergency_contact_phone: self.emergency_contact_phone.clone(),
            general_medical_history: self.general_medical_history.clone(),
            insurance_provider: self.insurance_provider.clone(),
        }
    }
}

/// Perfil de médico. A avaliação não faz parte do formulário: um `rating`
/// enviado é ignorado.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DoctorForm {
    #[validate(length(min = 1, max = 50, message = "This field is required."))]
    pub license_number: String,
    #[validate(length(min = 1, max = 100))]
    #[serde(default = "default_specialization")]
    pub specialization: String,
    #[serde(default)]
    pub about: String,
    #[validate(custom = "validate_non_negative")]
    #[serde(default)]
    pub first_visit_fee: Money,
    #[validate(custom = "validate_non_negative")]
    #[serde(default)]
    pub follow_up_fee: Money,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub experiences: String,
}

impl DoctorForm {
    pub fn to_new_doctor(&self, photo_url: String) -> NewDoctor {
        NewDoctor {
            license_number: self.license_number.clone(),
            specialization: self.specialization.clone(),
            about: self.about.clone(),
            photo_url,
            first_visit_fee: self.first_visit_fee,
            follow_up_fee: self.follow_up_fee,
            education: self.education.clone(),
            experiences: self.experiences.clone(),
        }
    }

    pub fn to_update(&self) -> DoctorUpdate {
        DoctorUpdate {
            license_number: self.license_number.clone(),
            specialization: self.specialization.clone(),
            about: self.about.clone(),
            first_visit_fee: self.first_visit_fee,
            follow_up_fee: self.follow_up_fee,
            education: self.education.clone(),
            experiences: self.experiences.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminForm {
    pub role: AdminRole,
}

/// Edição do perfil de paciente: identidade e perfil validados em conjunto
#[derive(Debug, Clone, Deserialize)]
pub struct PatientProfileForm {
    pub user: UserUpdateForm,
    pub patient: PatientForm,
}

impl PatientProfileForm {
    pub fn errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::of(&self.user);
        errors.merge(self.patient.errors());
        errors
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorProfileForm {
    pub user: UserUpdateForm,
    pub doctor: DoctorForm,
}

impl DoctorProfileForm {
    pub fn errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::of(&self.user);
        errors.merge(FieldErrors::of(&self.doctor));
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordForm {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeForm {
    pub reset_token: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub reset_token: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Confere confirmação e força de uma nova senha
pub fn new_password_errors(new_password: &str, confirm: &str, username: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if new_password != confirm {
        errors.add("confirm_password", "Passwords don't match");
    }
    for problem in password_problems(new_password, username) {
        errors.add("new_password", problem);
    }
    errors
}

/// Cadastro completo já validado
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: UserForm,
    pub user_type: UserType,
    pub profile: ProfileForm,
}

#[derive(Debug, Clone)]
pub enum ProfileForm {
    Patient(PatientForm),
    Doctor(DoctorForm),
    Admin(AdminForm),
}

impl ProfileForm {
    pub fn into_new_profile(self, photo_url: String) -> NewProfile {
        match self {
            ProfileForm::Patient(p) => NewProfile::Patient(p.to_new_patient(photo_url)),
            ProfileForm::Doctor(d) => NewProfile::Doctor(d.to_new_doctor(photo_url)),
            ProfileForm::Admin(a) => NewProfile::Admin(NewAdmin { role: a.role }),
        }
    }
}

/// Leitor dos campos textuais do cadastro, acumulando erros por campo
struct FieldReader<'a> {
    fields: &'a HashMap<String, String>,
    errors: FieldErrors,
}

impl<'a> FieldReader<'a> {
    fn value(&self, name: &str) -> Option<&'a str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Valor sem `trim`, para senhas; só a string vazia conta como ausente
    fn required_raw(&mut self, name: &str) -> String {
        match self.fields.get(name).filter(|v| !v.is_empty()) {
            Some(v) => v.clone(),
            None => {
                self.errors.add(name, REQUIRED);
                String::new()
            }
        }
    }

    fn optional(&self, name: &str) -> String {
        self.value(name).unwrap_or_default().to_string()
    }

    fn required(&mut self, name: &str) -> String {
        match self.value(name) {
            Some(v) => v.to_string(),
            None => {
                self.errors.add(name, REQUIRED);
                String::new()
            }
        }
    }

    /// Converte um valor obrigatório; nomes de enums aceitam qualquer caixa
    fn parse<T: std::str::FromStr>(&mut self, name: &str, message: &str) -> Option<T> {
        let raw = self.value(name);
        match raw {
            None => {
                self.errors.add(name, REQUIRED);
                None
            }
            Some(raw) => match raw.parse::<T>().or_else(|_| raw.to_lowercase().parse::<T>()) {
                Ok(value) => Some(value),
                Err(_) => {
                    self.errors.add(name, message);
                    None
                }
            },
        }
    }

    fn money(&mut self, name: &str) -> Money {
        match self.value(name) {
            None => Money::ZERO,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                self.errors.add(name, "Enter a number.");
                Money::ZERO
            }),
        }
    }
}

/// Lê e valida os campos de cadastro. Todos os erros são acumulados; nada é
/// devolvido parcialmente.
pub fn parse_registration(fields: &HashMap<String, String>) -> Result<Registration, FieldErrors> {
    let mut reader = FieldReader {
        fields,
        errors: FieldErrors::new(),
    };

    let user = UserForm {
        username: reader.required("username"),
        email: reader.required("email"),
        first_name: reader.optional("first_name"),
        last_name: reader.optional("last_name"),
        phone_number: reader.value("phone_number").map(str::to_string),
        password1: reader.required_raw("password1"),
        password2: reader.required_raw("password2"),
    };
    let user_type: Option<UserType> = reader.parse("user_type", "Select a valid choice.");

    let profile = match user_type {
        Some(UserType::Patient) => {
            let date_of_birth: Option<NaiveDate> =
                reader.parse("date_of_birth", "Enter a valid date (YYYY-MM-DD).");
            let gender: Option<Gender> = reader.parse("gender", "Select a valid choice.");
            let address = reader.required("address");
            let emergency_contact_name = reader.required("emergency_contact_name");
            let emergency_contact_phone = reader.required("emergency_contact_phone");
            match (date_of_birth, gender) {
                (Some(date_of_birth), Some(gender)) => Some(ProfileForm::Patient(PatientForm {
                    date_of_birth,
                    gender,
                    address,
                    emergency_contact_name,
                    emergency_contact_phone,
                    general_medical_history: reader.optional("general_medical_history"),
                    insurance_provider: reader.optional("insurance_provider"),
                })),
                _ => None,
            }
        }
        Some(UserType::Doctor) => Some(ProfileForm::Doctor(DoctorForm {
            license_number: reader.required("license_number"),
            specialization: reader
                .value("specialization")
                .map(str::to_string)
                .unwrap_or_else(default_specialization),
            about: reader.optional("about"),
            first_visit_fee: reader.money("fees"),
            follow_up_fee: reader.money("follow_up_fees"),
            education: reader.optional("education"),
            experiences: reader.optional("experiences"),
        })),
        Some(UserType::Admin) => reader
            .parse::<AdminRole>("role", "Select a valid choice.")
            .map(|role| ProfileForm::Admin(AdminForm { role })),
        None => None,
    };

    let mut errors = reader.errors;
    errors.merge(user.errors());
    match &profile {
        Some(ProfileForm::Patient(p)) => errors.merge(p.errors()),
        Some(ProfileForm::Doctor(d)) => {
            // Os campos do formulário de cadastro têm nomes próprios
            let mut doctor_errors = FieldErrors::of(d);
            for (field, renamed) in [("first_visit_fee", "fees"), ("follow_up_fee", "follow_up_fees")] {
                for message in doctor_errors.remove(field).unwrap_or_default() {
                    errors.add(renamed, message);
                }
            }
            errors.merge(doctor_errors);
        }
        Some(ProfileForm::Admin(_)) | None => {}
    }

    match (user_type, profile) {
        (Some(user_type), Some(profile)) if errors.is_empty() => Ok(Registration {
            user,
            user_type,
            profile,
        }),
        _ => Err(errors),
    }
}
