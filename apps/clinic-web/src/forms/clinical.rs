//! Formulários dos registros clínicos (corpo JSON)

use chrono::{DateTime, NaiveDate, Utc};
use clinic_db::appointments::AppointmentInput;
use clinic_db::billing::BillingInput;
use clinic_db::models::{
    AppointmentStatus, EyePrescription, LensType, Money, PaymentMethod, PaymentStatus, VisitType,
};
use clinic_db::prescriptions::PrescriptionInput;
use clinic_db::reports::ReportInput;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::validate_non_negative;
use crate::error::FieldErrors;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppointmentForm {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes."))]
    pub duration_minutes: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub covered_by_insurance: bool,
    #[serde(default)]
    pub visit_type: VisitType,
}

impl AppointmentForm {
    pub fn to_input(&self) -> AppointmentInput {
        AppointmentInput {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            appointment_date: self.appointment_date,
            duration_minutes: self.duration_minutes,
            reason: self.reason.clone(),
            status: self.status,
            covered_by_insurance: self.covered_by_insurance,
            visit_type: self.visit_type,
        }
    }
}

/// Receita com as medidas de cada olho em campos planos
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PrescriptionForm {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub lens_type: LensType,
    pub left_sphere: f64,
    pub left_cylinder: f64,
    #[validate(range(min = 0, max = 180, message = "Axis must be between 0 and 180."))]
    pub left_axis: i64,
    pub right_sphere: f64,
    pub right_cylinder: f64,
    #[validate(range(min = 0, max = 180, message = "Axis must be between 0 and 180."))]
    pub right_axis: i64,
    pub prescription_date: NaiveDate,
    pub expiration_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PrescriptionForm {
    pub fn errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::of(self);
        for (field, value) in [
            ("left_sphere", self.left_sphere),
            ("left_cylinder", self.left_cylinder),
            ("right_sphere", self.right_sphere),
            ("right_cylinder", self.right_cylinder),
        ] {
            if !value.is_finite() {
                errors.add(field, "Enter a number.");
            }
        }
        if self.expiration_date < self.prescription_date {
            errors.add(
                "expiration_date",
                "Expiration date cannot be before the prescription date.",
            );
        }
        errors
    }

    pub fn to_input(&self) -> PrescriptionInput {
        PrescriptionInput {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            lens_type: self.lens_type,
            left: EyePrescription {
                sphere: self.left_sphere,
                cylinder: self.left_cylinder,
                axis: self.left_axis,
            },
            right: EyePrescription {
                sphere: self.right_sphere,
                cylinder: self.right_cylinder,
                axis: self.right_axis,
            },
            prescription_date: self.prescription_date,
            expiration_date: self.expiration_date,
            notes: self.notes.clone().filter(|n| !n.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReportForm {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    #[validate(length(min = 1, message = "This field is required."))]
    pub diagnosis_summary: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub recommendations: String,
    #[serde(default)]
    pub follow_up_date: Option<NaiveDate>,
}

impl ReportForm {
    pub fn to_input(&self) -> ReportInput {
        ReportInput {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            appointment_id: self.appointment_id,
            diagnosis_summary: self.diagnosis_summary.clone(),
            recommendations: self.recommendations.clone(),
            follow_up_date: self.follow_up_date,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BillingForm {
    pub report_id: Uuid,
    #[validate(custom = "validate_non_negative")]
    pub amount: Money,
    #[validate(custom = "validate_non_negative")]
    #[serde(default)]
    pub insurance_coverage: Money,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// Hoje, quando omitida
    #[serde(default)]
    pub billing_date: Option<NaiveDate>,
}

impl BillingForm {
    pub fn to_input(&self) -> BillingInput {
        BillingInput {
            report_id: self.report_id,
            amount: self.amount,
            insurance_coverage: self.insurance_coverage,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            billing_date: self.billing_date.unwrap_or_else(|| Utc::now().date_naive()),
        }
    }
}
