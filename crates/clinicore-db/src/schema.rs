//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Uniqueness rules that must hold
//! under concurrent writes are unique indexes, not application checks.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "clinic_records",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Clinics (tenancy root)
-- =======================================================================
DEFINE TABLE clinic SCHEMAFULL;
DEFINE FIELD name ON TABLE clinic TYPE string;
DEFINE FIELD phone ON TABLE clinic TYPE string DEFAULT '';
DEFINE FIELD address ON TABLE clinic TYPE string DEFAULT '';
DEFINE FIELD admin_guard_seq ON TABLE clinic TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE clinic TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE clinic TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Staff (clinic scope; clinic_id is NONE for platform operators)
-- =======================================================================
DEFINE TABLE staff SCHEMAFULL;
DEFINE FIELD clinic_id ON TABLE staff TYPE option<string>;
DEFINE FIELD username ON TABLE staff TYPE string;
DEFINE FIELD email ON TABLE staff TYPE string DEFAULT '';
DEFINE FIELD password_hash ON TABLE staff TYPE string;
DEFINE FIELD role ON TABLE staff TYPE string \
    ASSERT $value IN ['doctor', 'assistant', 'admin'];
DEFINE FIELD is_active ON TABLE staff TYPE bool DEFAULT true;
DEFINE FIELD is_superuser ON TABLE staff TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE staff TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE staff TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_staff_clinic_username ON TABLE staff \
    COLUMNS clinic_id, username UNIQUE;
DEFINE INDEX idx_staff_clinic_role ON TABLE staff \
    COLUMNS clinic_id, role, is_active;

-- =======================================================================
-- Patients (clinic scope)
-- =======================================================================
DEFINE TABLE patient SCHEMAFULL;
DEFINE FIELD clinic_id ON TABLE patient TYPE string;
DEFINE FIELD full_name ON TABLE patient TYPE string;
DEFINE FIELD normalized_name ON TABLE patient TYPE string;
DEFINE FIELD phone ON TABLE patient TYPE string DEFAULT '';
DEFINE FIELD phone_normalized ON TABLE patient TYPE string DEFAULT '';
DEFINE FIELD national_id ON TABLE patient TYPE string DEFAULT '';
-- Lowercased national ID, or a per-row placeholder when empty so that
-- patients without a national ID never collide.
DEFINE FIELD national_id_key ON TABLE patient TYPE string;
DEFINE FIELD sex ON TABLE patient TYPE string \
    ASSERT $value IN ['M', 'F', 'U'];
DEFINE FIELD date_of_birth ON TABLE patient TYPE option<string>;
DEFINE FIELD address ON TABLE patient TYPE string DEFAULT '';
DEFINE FIELD notes ON TABLE patient TYPE string DEFAULT '';
DEFINE FIELD created_at ON TABLE patient TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE patient TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_patient_clinic_national_id ON TABLE patient \
    COLUMNS clinic_id, national_id_key UNIQUE;
DEFINE INDEX idx_patient_clinic_name ON TABLE patient \
    COLUMNS clinic_id, normalized_name;
DEFINE INDEX idx_patient_clinic_phone ON TABLE patient \
    COLUMNS clinic_id, phone_normalized;

-- =======================================================================
-- Visits (clinic derived from patient)
-- =======================================================================
DEFINE TABLE visit SCHEMAFULL;
DEFINE FIELD clinic_id ON TABLE visit TYPE string;
DEFINE FIELD patient_id ON TABLE visit TYPE string;
DEFINE FIELD doctor_id ON TABLE visit TYPE option<string>;
DEFINE FIELD visit_datetime ON TABLE visit TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD chief_complaint ON TABLE visit TYPE string DEFAULT '';
DEFINE FIELD clinical_notes ON TABLE visit TYPE string DEFAULT '';
DEFINE FIELD diagnosis ON TABLE visit TYPE string DEFAULT '';
DEFINE FIELD treatment_plan ON TABLE visit TYPE string DEFAULT '';
DEFINE FIELD follow_up_date ON TABLE visit TYPE option<string>;
DEFINE FIELD created_at ON TABLE visit TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE visit TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_visit_clinic_patient ON TABLE visit \
    COLUMNS clinic_id, patient_id;
DEFINE INDEX idx_visit_clinic_datetime ON TABLE visit \
    COLUMNS clinic_id, visit_datetime;

-- =======================================================================
-- Attachments (clinic derived from patient)
-- =======================================================================
DEFINE TABLE attachment SCHEMAFULL;
DEFINE FIELD clinic_id ON TABLE attachment TYPE string;
DEFINE FIELD patient_id ON TABLE attachment TYPE string;
DEFINE FIELD visit_id ON TABLE attachment TYPE option<string>;
DEFINE FIELD uploaded_by ON TABLE attachment TYPE option<string>;
DEFINE FIELD stored_path ON TABLE attachment TYPE string;
DEFINE FIELD original_filename ON TABLE attachment TYPE string;
DEFINE FIELD file_type ON TABLE attachment TYPE string \
    ASSERT $value IN ['xray', 'lab', 'prescription', 'report', 'other'];
DEFINE FIELD file_size ON TABLE attachment TYPE int;
DEFINE FIELD mime_type ON TABLE attachment TYPE string;
DEFINE FIELD sha256 ON TABLE attachment TYPE string;
DEFINE FIELD title ON TABLE attachment TYPE string DEFAULT '';
DEFINE FIELD notes ON TABLE attachment TYPE string DEFAULT '';
DEFINE FIELD uploaded_at ON TABLE attachment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_attachment_clinic_patient ON TABLE attachment \
    COLUMNS clinic_id, patient_id;
DEFINE INDEX idx_attachment_stored_path ON TABLE attachment \
    COLUMNS stored_path UNIQUE;

-- Patients take their visits and attachments with them; a deleted visit
-- only unlinks its attachments.
DEFINE EVENT patient_cascade ON TABLE patient WHEN $event = 'DELETE' THEN { \
    DELETE visit WHERE patient_id = meta::id($before.id); \
    DELETE attachment WHERE patient_id = meta::id($before.id); \
};
DEFINE EVENT visit_unlink ON TABLE visit WHEN $event = 'DELETE' THEN { \
    UPDATE attachment SET visit_id = NONE WHERE visit_id = meta::id($before.id); \
};

-- =======================================================================
-- Audit events (append-only; every field is READONLY)
-- =======================================================================
DEFINE TABLE audit_event SCHEMAFULL;
DEFINE FIELD clinic_id ON TABLE audit_event TYPE option<string> READONLY;
DEFINE FIELD actor_id ON TABLE audit_event TYPE option<string> READONLY;
DEFINE FIELD action ON TABLE audit_event TYPE string READONLY \
    ASSERT $value IN ['patient_created', 'patient_viewed', \
    'patient_edited', 'visit_created', 'visit_edited', 'file_uploaded', \
    'file_downloaded', 'file_deleted', 'user_created', 'user_edited', \
    'user_deactivated', 'clinic_updated'];
DEFINE FIELD object_type ON TABLE audit_event TYPE string READONLY;
DEFINE FIELD object_id ON TABLE audit_event TYPE string READONLY;
DEFINE FIELD patient_id ON TABLE audit_event TYPE option<string> READONLY;
DEFINE FIELD visit_id ON TABLE audit_event TYPE option<string> READONLY;
DEFINE FIELD ip_address ON TABLE audit_event TYPE option<string> READONLY;
DEFINE FIELD user_agent ON TABLE audit_event TYPE string DEFAULT '' \
    READONLY;
DEFINE FIELD metadata ON TABLE audit_event TYPE object FLEXIBLE \
    DEFAULT {} READONLY;
DEFINE FIELD display ON TABLE audit_event TYPE string READONLY;
DEFINE FIELD created_at ON TABLE audit_event TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE INDEX idx_audit_clinic_created ON TABLE audit_event \
    COLUMNS clinic_id, created_at;
DEFINE INDEX idx_audit_clinic_patient ON TABLE audit_event \
    COLUMNS clinic_id, patient_id;
";

/// Run all pending migrations against the database.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_clinic_owned_table_has_a_clinic_field() {
        for table in ["staff", "patient", "visit", "attachment", "audit_event"] {
            let needle = format!("DEFINE FIELD clinic_id ON TABLE {table} ");
            assert!(SCHEMA_V1.contains(&needle), "missing clinic_id on {table}");
        }
    }
}
