//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite. A versão
//! aplicada fica registrada em `PRAGMA user_version`.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_accounts.sql
    r#"
    -- Identidade de todos os usuários; o papel é fixado na criação
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY NOT NULL,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT '',
        phone_number TEXT,
        user_type TEXT NOT NULL CHECK (user_type IN ('patient', 'doctor', 'admin')),
        password_hash TEXT NOT NULL,
        is_superuser BOOLEAN NOT NULL DEFAULT 0,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        date_joined TIMESTAMP NOT NULL,
        last_login TIMESTAMP
    );

    CREATE TRIGGER IF NOT EXISTS users_user_type_immutable
    BEFORE UPDATE OF user_type ON users
    WHEN NEW.user_type <> OLD.user_type
    BEGIN
        SELECT RAISE(ABORT, 'user_type is immutable');
    END;

    CREATE TABLE IF NOT EXISTS patients (
        user_id BLOB PRIMARY KEY NOT NULL,
        date_of_birth DATE NOT NULL,
        gender TEXT NOT NULL CHECK (gender IN ('male', 'female', 'other')),
        address TEXT NOT NULL,
        emergency_contact_name TEXT NOT NULL,
        emergency_contact_phone TEXT NOT NULL,
        general_medical_history TEXT NOT NULL DEFAULT '',
        insurance_provider TEXT NOT NULL DEFAULT '',
        photo_url TEXT NOT NULL DEFAULT '',
        FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS doctors (
        user_id BLOB PRIMARY KEY NOT NULL,
        license_number TEXT NOT NULL,
        specialization TEXT NOT NULL DEFAULT 'General',
        about TEXT NOT NULL DEFAULT '',
        rating REAL NOT NULL DEFAULT 0.0,
        photo_url TEXT NOT NULL DEFAULT '',
        first_visit_fee_cents INTEGER NOT NULL DEFAULT 0,
        follow_up_fee_cents INTEGER NOT NULL DEFAULT 0,
        education TEXT NOT NULL DEFAULT '',
        experiences TEXT NOT NULL DEFAULT '',
        FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS admins (
        user_id BLOB PRIMARY KEY NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('super_admin', 'manager', 'staff')),
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NOT NULL,
        created_at TIMESTAMP NOT NULL,
        expires_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS password_reset_codes (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NOT NULL,
        code_hash BLOB NOT NULL,
        created_at TIMESTAMP NOT NULL,
        expires_at TIMESTAMP NOT NULL,
        verified_at TIMESTAMP,
        FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions (user_id);
    CREATE INDEX IF NOT EXISTS idx_password_reset_codes_user_id ON password_reset_codes (user_id);
    "#,

    // 002_clinical_records.sql
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        doctor_id BLOB NOT NULL,
        appointment_date TIMESTAMP NOT NULL,
        duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
        reason TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'scheduled'
            CHECK (status IN ('scheduled', 'completed', 'cancelled', 'no_show')),
        covered_by_insurance BOOLEAN NOT NULL DEFAULT 0,
        visit_type TEXT NOT NULL DEFAULT 'routine' CHECK (visit_type IN ('routine', 'follow_up')),
        FOREIGN KEY (patient_id) REFERENCES patients (user_id) ON DELETE CASCADE,
        FOREIGN KEY (doctor_id) REFERENCES doctors (user_id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS prescription_glasses (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        doctor_id BLOB NOT NULL,
        lens_type TEXT NOT NULL CHECK (lens_type IN ('distance', 'read')),
        left_sphere REAL NOT NULL,
        left_cylinder REAL NOT NULL,
        left_axis INTEGER NOT NULL,
        right_sphere REAL NOT NULL,
        right_cylinder REAL NOT NULL,
        right_axis INTEGER NOT NULL,
        prescription_date DATE NOT NULL,
        expiration_date DATE NOT NULL,
        notes TEXT,
        FOREIGN KEY (patient_id) REFERENCES patients (user_id) ON DELETE CASCADE,
        FOREIGN KEY (doctor_id) REFERENCES doctors (user_id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS reports (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        doctor_id BLOB NOT NULL,
        appointment_id BLOB,
        diagnosis_summary TEXT NOT NULL,
        recommendations TEXT NOT NULL,
        follow_up_date DATE,
        FOREIGN KEY (patient_id) REFERENCES patients (user_id) ON DELETE CASCADE,
        FOREIGN KEY (doctor_id) REFERENCES doctors (user_id) ON DELETE CASCADE,
        FOREIGN KEY (appointment_id) REFERENCES appointments (id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS billings (
        id BLOB PRIMARY KEY NOT NULL,
        report_id BLOB NOT NULL,
        amount_cents INTEGER NOT NULL,
        insurance_coverage_cents INTEGER NOT NULL DEFAULT 0,
        payment_method TEXT NOT NULL CHECK (payment_method IN ('cash', 'credit', 'insurance', 'check')),
        payment_status TEXT NOT NULL DEFAULT 'pending'
            CHECK (payment_status IN ('paid', 'pending', 'denied')),
        billing_date DATE NOT NULL,
        FOREIGN KEY (report_id) REFERENCES reports (id) ON DELETE CASCADE
    );

    -- Índices para otimização
    CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_doctor_id ON appointments (doctor_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments (appointment_date);
    CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments (status);
    CREATE INDEX IF NOT EXISTS idx_prescription_glasses_patient_id ON prescription_glasses (patient_id);
    CREATE INDEX IF NOT EXISTS idx_reports_doctor_id ON reports (doctor_id);
    CREATE INDEX IF NOT EXISTS idx_reports_appointment_id ON reports (appointment_id);
    CREATE INDEX IF NOT EXISTS idx_billings_report_id ON billings (report_id);
    CREATE INDEX IF NOT EXISTS idx_billings_status ON billings (payment_status);
    "#,
];

/// Versão do esquema após aplicar todas as migrações
pub fn schema_version() -> i64 {
    MIGRATIONS.len() as i64
}

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    let version: i64 = match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            // Pode ser a primeira execução
            error!("Erro ao obter versão do banco: {}", e);
            0
        }
    };

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool.begin().await.with_context(|| {
            format!("Falha ao iniciar transação para migração {}", migration_version)
        })?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction.commit().await.with_context(|| {
            format!("Falha ao confirmar transação para migração {}", migration_version)
        })?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", MIGRATIONS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::migrate::MigrateDatabase;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::Sqlite;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_migrations() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test_migrations.db");
        let db_url = format!("sqlite:{}", db_path.display());

        Sqlite::create_database(&db_url).await?;

        let conn_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(conn_options).await?;

        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        assert_eq!(version, MIGRATIONS.len() as i64);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&pool)
        .await?;

        for expected in [
            "users",
            "patients",
            "doctors",
            "admins",
            "sessions",
            "password_reset_codes",
            "appointments",
            "prescription_glasses",
            "reports",
            "billings",
        ] {
            assert!(tables.contains(&expected.to_string()), "faltando tabela {expected}");
        }

        // Reaplicar é idempotente
        run_migrations(&pool).await?;

        Ok(())
    }
}
