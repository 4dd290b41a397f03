//! SurrealDB implementation of [`StaffRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Salt is randomly
//! generated per hash. An optional pepper (server-side secret) can be
//! provided at construction time.
//!
//! Edits that could remove a clinic's last active admin run inside a
//! transaction that also bumps the clinic's `admin_guard_seq`. Two such
//! edits against the same clinic therefore write the same row and
//! cannot both commit, so the "another active admin exists" check holds
//! under concurrency.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use clinicore_core::TenantScope;
use clinicore_core::error::{ClinicError, ClinicResult};
use clinicore_core::models::staff::{CreateStaff, Role, Staff, UpdateStaff};
use clinicore_core::repository::{PaginatedResult, Pagination, StaffRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{CountRow, parse_opt_uuid, parse_uuid, scope_binding, scope_filter};
use crate::error::{DbError, UniqueIndex, check_unique};

const STAFF_INDEXES: &[UniqueIndex] = &[UniqueIndex {
    index: "idx_staff_clinic_username",
    field: "username",
    message: "A staff account with this username already exists in this clinic.",
}];

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct StaffRow {
    clinic_id: Option<String>,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
    is_superuser: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct StaffRowWithId {
    record_id: String,
    clinic_id: Option<String>,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
    is_superuser: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_role(s: &str) -> Result<Role, DbError> {
    s.parse()
        .map_err(|_| DbError::Corrupt(format!("unknown staff role: {s}")))
}

impl StaffRow {
    fn into_staff(self, id: Uuid) -> Result<Staff, DbError> {
        Ok(Staff {
            id,
            clinic_id: parse_opt_uuid("clinic", self.clinic_id)?,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role: parse_role(&self.role)?,
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl StaffRowWithId {
    fn try_into_staff(self) -> Result<Staff, DbError> {
        let id = parse_uuid("staff", &self.record_id)?;
        StaffRow {
            clinic_id: self.clinic_id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role: self.role,
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_staff(id)
    }
}

/// Hash a password with Argon2id using OWASP-recommended parameters.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Query(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Query(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2id hash.
#[cfg(test)]
fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, DbError> {
    use argon2::PasswordVerifier;

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| DbError::Corrupt(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::Query(format!("verify error: {e}"))),
    }
}

/// SurrealDB implementation of the Staff repository.
#[derive(Clone)]
pub struct SurrealStaffRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealStaffRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn insert(
        &self,
        clinic_id: Option<Uuid>,
        input: CreateStaff,
        is_superuser: bool,
    ) -> ClinicResult<Staff> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('staff', $id) SET \
                 clinic_id = $clinic_id, \
                 username = $username, email = $email, \
                 password_hash = $password_hash, \
                 role = $role, \
                 is_active = true, \
                 is_superuser = $is_superuser",
            )
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", clinic_id.map(|c| c.to_string())))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("password_hash", password_hash))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("is_superuser", is_superuser))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| check_unique(e.to_string(), STAFF_INDEXES))?;

        let rows: Vec<StaffRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "staff".into(),
            id: id_str,
        })?;

        Ok(row.into_staff(id)?)
    }

    /// Plain update for accounts without a clinic.
    async fn update_unguarded(&self, id: Uuid, input: UpdateStaff) -> ClinicResult<Staff> {
        let id_str = id.to_string();
        let query = format!(
            "UPDATE type::record('staff', $id) SET {}",
            update_sets(&input).join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(role) = input.role {
            builder = builder.bind(("role", role.as_str().to_string()));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<StaffRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "staff".into(),
            id: id_str,
        })?;

        Ok(row.into_staff(id)?)
    }

    /// One attempt at an admin-affecting edit. `Ok(None)` means the
    /// transaction committed without touching the row: it is gone or
    /// the clinic would lose its last active admin.
    async fn update_guarded(
        &self,
        clinic_id: Uuid,
        id: Uuid,
        input: &UpdateStaff,
    ) -> Result<Option<Staff>, DbError> {
        let query = format!(
            "BEGIN TRANSACTION; \
             UPDATE type::record('clinic', $clinic_id) SET admin_guard_seq += 1; \
             UPDATE type::record('staff', $id) SET {} \
             WHERE clinic_id = $clinic_id AND ($keeps_admin \
             OR role != 'admin' OR is_active = false \
             OR array::len((SELECT VALUE id FROM staff WHERE clinic_id = $clinic_id \
             AND role = 'admin' AND is_active = true AND meta::id(id) != $id)) > 0); \
             COMMIT TRANSACTION;",
            update_sets(input).join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("clinic_id", clinic_id.to_string()))
            .bind(("keeps_admin", input.keeps_active_admin()));
        if let Some(email) = &input.email {
            builder = builder.bind(("email", email.clone()));
        }
        if let Some(role) = input.role {
            builder = builder.bind(("role", role.as_str().to_string()));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(|e| DbError::Query(e.to_string()))?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<StaffRow> = result.take(GUARDED_STAFF_SLOT)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_staff(id))
            .transpose()
    }
}

/// Conflicting guarded updates in one clinic are re-run this many times
/// in total before the conflict is reported.
const GUARDED_UPDATE_ATTEMPTS: u32 = 5;

/// Result slot of the staff `UPDATE` in the guarded transaction:
/// `BEGIN` and the clinic counter bump occupy slots 0 and 1.
const GUARDED_STAFF_SLOT: usize = 2;

fn is_transaction_conflict(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("can be retried")
        || message.contains("failed transaction")
        || message.contains("transaction conflict")
}

fn update_sets(input: &UpdateStaff) -> Vec<&'static str> {
    let mut sets = Vec::new();
    if input.email.is_some() {
        sets.push("email = $email");
    }
    if input.role.is_some() {
        sets.push("role = $role");
    }
    if input.is_active.is_some() {
        sets.push("is_active = $is_active");
    }
    sets.push("updated_at = time::now()");
    sets
}

impl<C: Connection> StaffRepository for SurrealStaffRepository<C> {
    async fn create(&self, scope: TenantScope, input: CreateStaff) -> ClinicResult<Staff> {
        let clinic_id = scope.require_clinic()?;
        self.insert(Some(clinic_id), input, false).await
    }

    async fn create_superuser(&self, input: CreateStaff) -> ClinicResult<Staff> {
        self.insert(None, input, true).await
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> ClinicResult<Staff> {
        let id_str = id.to_string();
        let query = format!(
            "SELECT * FROM type::record('staff', $id) WHERE {}",
            scope_filter(scope)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StaffRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "staff".into(),
            id: id_str,
        })?;

        Ok(row.into_staff(id)?)
    }

    async fn get_by_username(&self, scope: TenantScope, username: &str) -> ClinicResult<Staff> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM staff \
             WHERE {} AND username = $username",
            scope_filter(scope)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("clinic_id", scope_binding(scope)))
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StaffRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "staff".into(),
            id: format!("username={username}"),
        })?;

        Ok(row.try_into_staff()?)
    }

    async fn update(&self, scope: TenantScope, id: Uuid, input: UpdateStaff) -> ClinicResult<Staff> {
        let current = self.get_by_id(scope, id).await?;
        let Some(clinic_id) = current.clinic_id else {
            return self.update_unguarded(id, input).await;
        };

        let mut attempt = 1;
        loop {
            match self.update_guarded(clinic_id, id, &input).await {
                Err(DbError::Query(message))
                    if is_transaction_conflict(&message) && attempt < GUARDED_UPDATE_ATTEMPTS =>
                {
                    debug!(staff_id = %id, attempt, "Guarded staff update conflicted; retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
                Ok(Some(staff)) => return Ok(staff),
                Ok(None) => break,
            }
        }

        // Nothing updated: either the row vanished or the guard held.
        self.get_by_id(scope, id).await?;
        warn!(staff_id = %id, clinic_id = %clinic_id, "Refusing to remove last active admin");
        let field = if input.role.is_some_and(|r| r != Role::Admin) {
            "role"
        } else {
            "is_active"
        };
        Err(ClinicError::guard(
            field,
            "A clinic must keep at least one active admin.",
        ))
    }

    async fn count_active_admins(&self, clinic_id: Uuid) -> ClinicResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM staff \
                 WHERE clinic_id = $clinic_id AND role = 'admin' \
                 AND is_active = true GROUP ALL",
            )
            .bind(("clinic_id", clinic_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<Staff>> {
        let filter = scope_filter(scope);
        let clinic_id = scope_binding(scope);

        let count_query = format!("SELECT count() AS total FROM staff WHERE {filter} GROUP ALL");
        let mut count_result = self
            .db
            .query(&count_query)
            .bind(("clinic_id", clinic_id.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM staff \
             WHERE {filter} \
             ORDER BY username ASC \
             LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("clinic_id", clinic_id))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StaffRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_staff())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies_with_matching_pepper() {
        let hash = hash_password("correct horse", Some("pep")).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash, Some("pep")).unwrap());
        assert!(!verify_password("correct horse", &hash, None).unwrap());
        assert!(!verify_password("wrong", &hash, Some("pep")).unwrap());
    }

    #[test]
    fn conflict_messages_are_retryable() {
        assert!(is_transaction_conflict(
            "Transaction conflict: Resource busy. This transaction can be retried"
        ));
        assert!(is_transaction_conflict(
            "The query was not executed due to a failed transaction"
        ));
        assert!(!is_transaction_conflict(
            "Database index `idx_staff_clinic_username` already contains 'x'"
        ));
    }

    #[test]
    fn update_always_touches_updated_at() {
        let sets = update_sets(&UpdateStaff::default());
        assert_eq!(sets, vec!["updated_at = time::now()"]);
    }
}
