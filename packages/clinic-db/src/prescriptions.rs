//! Repositório de receitas de óculos

use chrono::NaiveDate;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{EyePrescription, LensType, PrescriptionGlasses, RecordScope};

#[derive(Debug, Clone)]
pub struct PrescriptionInput {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub lens_type: LensType,
    pub left: EyePrescription,
    pub right: EyePrescription,
    pub prescription_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub notes: Option<String>,
}

pub async fn create_prescription(
    pool: &SqlitePool,
    input: &PrescriptionInput,
) -> Result<PrescriptionGlasses, DbError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO prescription_glasses (id, patient_id, doctor_id, lens_type, \
         left_sphere, left_cylinder, left_axis, right_sphere, right_cylinder, right_axis, \
         prescription_date, expiration_date, notes) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(input.patient_id)
    .bind(input.doctor_id)
    .bind(input.lens_type.as_str())
    .bind(input.left.sphere)
    .bind(input.left.cylinder)
    .bind(input.left.axis)
    .bind(input.right.sphere)
    .bind(input.right.cylinder)
    .bind(input.right.axis)
    .bind(input.prescription_date)
    .bind(input.expiration_date)
    .bind(&input.notes)
    .execute(pool)
    .await?;

    get_prescription(pool, id).await
}

pub async fn get_prescription(
    pool: &SqlitePool,
    id: Uuid,
) -> Result<PrescriptionGlasses, DbError> {
    sqlx::query_as::<_, PrescriptionGlasses>("SELECT * FROM prescription_glasses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("receita"))
}

pub async fn update_prescription(
    pool: &SqlitePool,
    id: Uuid,
    input: &PrescriptionInput,
) -> Result<PrescriptionGlasses, DbError> {
    let result = sqlx::query(
        "UPDATE prescription_glasses SET patient_id = ?, doctor_id = ?, lens_type = ?, \
         left_sphere = ?, left_cylinder = ?, left_axis = ?, right_sphere = ?, right_cylinder = ?, \
         right_axis = ?, prescription_date = ?, expiration_date = ?, notes = ? WHERE id = ?",
    )
    .bind(input.patient_id)
    .bind(input.doctor_id)
    .bind(input.lens_type.as_str())
    .bind(input.left.sphere)
    .bind(input.left.cylinder)
    .bind(input.left.axis)
    .bind(input.right.sphere)
    .bind(input.right.cylinder)
    .bind(input.right.axis)
    .bind(input.prescription_date)
    .bind(input.expiration_date)
    .bind(&input.notes)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("receita"));
    }
    get_prescription(pool, id).await
}

pub async fn list_prescriptions(
    pool: &SqlitePool,
    scope: RecordScope,
) -> Result<Vec<PrescriptionGlasses>, DbError> {
    let query = match scope {
        RecordScope::All => sqlx::query_as::<_, PrescriptionGlasses>(
            "SELECT * FROM prescription_glasses ORDER BY prescription_date DESC",
        ),
        RecordScope::Patient(id) => sqlx::query_as::<_, PrescriptionGlasses>(
            "SELECT * FROM prescription_glasses WHERE patient_id = ? \
             ORDER BY prescription_date DESC",
        )
        .bind(id),
        RecordScope::Doctor(id) => sqlx::query_as::<_, PrescriptionGlasses>(
            "SELECT * FROM prescription_glasses WHERE doctor_id = ? \
             ORDER BY prescription_date DESC",
        )
        .bind(id),
    };
    Ok(query.fetch_all(pool).await?)
}

pub async fn count_for_patient(pool: &SqlitePool, patient_id: Uuid) -> Result<i64, DbError> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM prescription_glasses WHERE patient_id = ?")
            .bind(patient_id)
            .fetch_one(pool)
            .await?,
    )
}
