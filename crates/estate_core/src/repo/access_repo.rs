//! Users, roles, permissions, audit trail and system settings persistence.
//!
//! # Responsibility
//! - Persist operator accounts and their single role assignment.
//! - Resolve permission checks in SQL through `user_profiles -> roles`.
//! - Append audit records and read them back newest first.
//!
//! # Invariants
//! - Role permission sets are replaced atomically.
//! - Inactive roles grant nothing.
//! - Settings decode through their declared `data_type`; a mismatch is
//!   reported as `InvalidData`, never coerced.

use super::{
    bool_to_int, ensure_schema_ready, get_bool, get_code, get_opt_uuid, get_uuid, uuid_text,
    RepoError, RepoResult,
};
use crate::model::access::{
    AuditAction, AuditRecord, Language, Permission, PermissionAction, PermissionId,
    PermissionModule, Role, RoleId, RoleType, SettingType, SettingValue, SystemSetting, Theme,
    User, UserId, UserProfile,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const AUDIT_DEFAULT_LIMIT: u32 = 50;
const AUDIT_LIMIT_MAX: u32 = 500;

/// Filter for audit trail reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    pub user_uuid: Option<UserId>,
    pub object_type: Option<String>,
    pub object_uuid: Option<Uuid>,
    /// Defaults to 50 and clamps to 500.
    pub limit: Option<u32>,
}

pub trait AccessRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    fn list_active_users(&self) -> RepoResult<Vec<User>>;

    fn create_permission(&self, permission: &Permission) -> RepoResult<PermissionId>;
    fn list_permissions(&self) -> RepoResult<Vec<Permission>>;

    fn create_role(&self, role: &Role) -> RepoResult<RoleId>;
    fn get_role(&self, id: RoleId) -> RepoResult<Option<Role>>;
    /// Replaces the full permission set of a role in one transaction.
    fn set_role_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> RepoResult<()>;
    fn role_permission_codenames(&self, role: RoleId) -> RepoResult<Vec<String>>;
    fn role_has_permission(&self, role: RoleId, codename: &str) -> RepoResult<bool>;

    /// Inserts or replaces the profile of `profile.user_uuid`.
    fn save_profile(&self, profile: &UserProfile) -> RepoResult<()>;
    fn get_profile(&self, user: UserId) -> RepoResult<Option<UserProfile>>;
    fn user_has_permission(&self, user: UserId, codename: &str) -> RepoResult<bool>;

    /// Appends one audit record; `id` and `timestamp` are assigned by storage.
    fn append_audit(&self, record: &AuditRecord) -> RepoResult<i64>;
    fn list_audit(&self, query: &AuditQuery) -> RepoResult<Vec<AuditRecord>>;

    fn put_setting(&self, setting: &SystemSetting) -> RepoResult<()>;
    fn get_setting(&self, key: &str) -> RepoResult<Option<SystemSetting>>;
    fn list_settings(&self, public_only: bool) -> RepoResult<Vec<SystemSetting>>;
}

/// SQLite-backed access repository.
pub struct SqliteAccessRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccessRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            &[
                "users",
                "permissions",
                "roles",
                "role_permissions",
                "user_profiles",
                "audit_log",
                "system_settings",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl AccessRepository for SqliteAccessRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;
        self.conn.execute(
            "INSERT INTO users (uuid, username, email, full_name, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                user.uuid.to_string(),
                user.username.trim(),
                user.email.as_deref(),
                user.full_name.as_str(),
                bool_to_int(user.is_active),
            ],
        )?;
        Ok(user.uuid)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                "SELECT uuid, username, email, full_name, is_active FROM users WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                "SELECT uuid, username, email, full_name, is_active
                 FROM users
                 WHERE username = ?1 COLLATE NOCASE;",
                [username.trim()],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_active_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, username, email, full_name, is_active
             FROM users
             WHERE is_active = 1
             ORDER BY username ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn create_permission(&self, permission: &Permission) -> RepoResult<PermissionId> {
        self.conn.execute(
            "INSERT INTO permissions (uuid, name, codename, description, module, action)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                permission.uuid.to_string(),
                permission.name.as_str(),
                permission.codename.as_str(),
                permission.description.as_str(),
                permission.module.as_str(),
                permission.action.as_str(),
            ],
        )?;
        Ok(permission.uuid)
    }

    fn list_permissions(&self) -> RepoResult<Vec<Permission>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name, codename, description, module, action
             FROM permissions
             ORDER BY module ASC, action ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut permissions = Vec::new();
        while let Some(row) = rows.next()? {
            permissions.push(Permission {
                uuid: get_uuid(row, "uuid")?,
                name: row.get("name")?,
                codename: row.get("codename")?,
                description: row.get("description")?,
                module: get_code(row, "module", PermissionModule::parse)?,
                action: get_code(row, "action", PermissionAction::parse)?,
            });
        }
        Ok(permissions)
    }

    fn create_role(&self, role: &Role) -> RepoResult<RoleId> {
        crate::model::require_text("name", &role.name)?;
        self.conn.execute(
            "INSERT INTO roles (uuid, name, role_type, description, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                role.uuid.to_string(),
                role.name.trim(),
                role.role_type.as_str(),
                role.description.as_str(),
                bool_to_int(role.is_active),
            ],
        )?;
        Ok(role.uuid)
    }

    fn get_role(&self, id: RoleId) -> RepoResult<Option<Role>> {
        self.conn
            .query_row(
                "SELECT uuid, name, role_type, description, is_active FROM roles WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok(parse_role_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn set_role_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> RepoResult<()> {
        let role_text = role.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM roles WHERE uuid = ?1;",
            [role_text.as_str()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::not_found("role", role));
        }

        tx.execute(
            "DELETE FROM role_permissions WHERE role_uuid = ?1;",
            [role_text.as_str()],
        )?;
        for permission in permissions {
            tx.execute(
                "INSERT OR IGNORE INTO role_permissions (role_uuid, permission_uuid)
                 VALUES (?1, ?2);",
                params![role_text.as_str(), permission.to_string()],
            )?;
        }
        tx.execute(
            "UPDATE roles SET updated_at = (strftime('%s', 'now') * 1000) WHERE uuid = ?1;",
            [role_text.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn role_permission_codenames(&self, role: RoleId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.codename
             FROM role_permissions rp
             INNER JOIN permissions p ON p.uuid = rp.permission_uuid
             WHERE rp.role_uuid = ?1
             ORDER BY p.codename ASC;",
        )?;
        let codenames = stmt
            .query_map([role.to_string()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(codenames)
    }

    fn role_has_permission(&self, role: RoleId, codename: &str) -> RepoResult<bool> {
        let granted: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM role_permissions rp
                INNER JOIN permissions p ON p.uuid = rp.permission_uuid
                INNER JOIN roles r ON r.uuid = rp.role_uuid
                WHERE rp.role_uuid = ?1
                  AND p.codename = ?2
                  AND r.is_active = 1
            );",
            params![role.to_string(), codename],
            |row| row.get(0),
        )?;
        Ok(granted == 1)
    }

    fn save_profile(&self, profile: &UserProfile) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO user_profiles (
                user_uuid, role_uuid, phone, language, theme, department, position
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_uuid) DO UPDATE SET
                role_uuid = excluded.role_uuid,
                phone = excluded.phone,
                language = excluded.language,
                theme = excluded.theme,
                department = excluded.department,
                position = excluded.position,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                profile.user_uuid.to_string(),
                uuid_text(profile.role_uuid),
                profile.phone.as_str(),
                profile.language.as_str(),
                profile.theme.as_str(),
                profile.department.as_str(),
                profile.position.as_str(),
            ],
        )?;
        Ok(())
    }

    fn get_profile(&self, user: UserId) -> RepoResult<Option<UserProfile>> {
        self.conn
            .query_row(
                "SELECT user_uuid, role_uuid, phone, language, theme, department, position
                 FROM user_profiles
                 WHERE user_uuid = ?1;",
                [user.to_string()],
                |row| Ok(parse_profile_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn user_has_permission(&self, user: UserId, codename: &str) -> RepoResult<bool> {
        let granted: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM user_profiles up
                INNER JOIN users u ON u.uuid = up.user_uuid
                INNER JOIN roles r ON r.uuid = up.role_uuid
                INNER JOIN role_permissions rp ON rp.role_uuid = r.uuid
                INNER JOIN permissions p ON p.uuid = rp.permission_uuid
                WHERE up.user_uuid = ?1
                  AND p.codename = ?2
                  AND u.is_active = 1
                  AND r.is_active = 1
            );",
            params![user.to_string(), codename],
            |row| row.get(0),
        )?;
        Ok(granted == 1)
    }

    fn append_audit(&self, record: &AuditRecord) -> RepoResult<i64> {
        insert_audit(self.conn, record)
    }

    fn list_audit(&self, query: &AuditQuery) -> RepoResult<Vec<AuditRecord>> {
        let limit = match query.limit {
            None | Some(0) => AUDIT_DEFAULT_LIMIT,
            Some(value) => value.min(AUDIT_LIMIT_MAX),
        };
        let mut stmt = self.conn.prepare(
            "SELECT id, user_uuid, action, object_type, object_uuid, description, changes, timestamp
             FROM audit_log
             WHERE (?1 IS NULL OR user_uuid = ?1)
               AND (?2 IS NULL OR object_type = ?2)
               AND (?3 IS NULL OR object_uuid = ?3)
             ORDER BY timestamp DESC, id DESC
             LIMIT ?4;",
        )?;
        let mut rows = stmt.query(params![
            uuid_text(query.user_uuid),
            query.object_type.as_deref(),
            uuid_text(query.object_uuid),
            i64::from(limit),
        ])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_audit_row(row)?);
        }
        Ok(records)
    }

    fn put_setting(&self, setting: &SystemSetting) -> RepoResult<()> {
        crate::model::require_text("key", &setting.key)?;
        self.conn.execute(
            "INSERT INTO system_settings (key, value, description, data_type, is_public, updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                description = excluded.description,
                data_type = excluded.data_type,
                is_public = excluded.is_public,
                updated_by = excluded.updated_by,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                setting.key.trim(),
                setting.value.to_storage(),
                setting.description.as_str(),
                setting.value.data_type().as_str(),
                bool_to_int(setting.is_public),
                uuid_text(setting.updated_by),
            ],
        )?;
        Ok(())
    }

    fn get_setting(&self, key: &str) -> RepoResult<Option<SystemSetting>> {
        self.conn
            .query_row(
                "SELECT key, value, description, data_type, is_public, updated_by, updated_at
                 FROM system_settings
                 WHERE key = ?1;",
                [key],
                |row| Ok(parse_setting_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_settings(&self, public_only: bool) -> RepoResult<Vec<SystemSetting>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value, description, data_type, is_public, updated_by, updated_at
             FROM system_settings
             WHERE (?1 = 0 OR is_public = 1)
             ORDER BY key ASC;",
        )?;
        let mut rows = stmt.query([bool_to_int(public_only)])?;
        let mut settings = Vec::new();
        while let Some(row) = rows.next()? {
            settings.push(parse_setting_row(row)?);
        }
        Ok(settings)
    }
}

/// Audit insert usable from other repositories' transactions.
pub(crate) fn insert_audit(conn: &Connection, record: &AuditRecord) -> RepoResult<i64> {
    let changes = record.changes.as_ref().map(|value| value.to_string());
    conn.execute(
        "INSERT INTO audit_log (user_uuid, action, object_type, object_uuid, description, changes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            uuid_text(record.user_uuid),
            record.action.as_str(),
            record.object_type.as_deref(),
            uuid_text(record.object_uuid),
            record.description.as_str(),
            changes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        uuid: get_uuid(row, "uuid")?,
        username: row.get("username")?,
        email: row.get("email")?,
        full_name: row.get("full_name")?,
        is_active: get_bool(row, "is_active")?,
    })
}

fn parse_role_row(row: &Row<'_>) -> RepoResult<Role> {
    Ok(Role {
        uuid: get_uuid(row, "uuid")?,
        name: row.get("name")?,
        role_type: get_code(row, "role_type", RoleType::parse)?,
        description: row.get("description")?,
        is_active: get_bool(row, "is_active")?,
    })
}

fn parse_profile_row(row: &Row<'_>) -> RepoResult<UserProfile> {
    Ok(UserProfile {
        user_uuid: get_uuid(row, "user_uuid")?,
        role_uuid: get_opt_uuid(row, "role_uuid")?,
        phone: row.get("phone")?,
        language: get_code(row, "language", Language::parse)?,
        theme: get_code(row, "theme", Theme::parse)?,
        department: row.get("department")?,
        position: row.get("position")?,
    })
}

fn parse_audit_row(row: &Row<'_>) -> RepoResult<AuditRecord> {
    let changes = match row.get::<_, Option<String>>("changes")? {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|err| {
            RepoError::InvalidData(format!("invalid json in audit_log.changes: {err}"))
        })?),
        None => None,
    };
    Ok(AuditRecord {
        id: row.get("id")?,
        user_uuid: get_opt_uuid(row, "user_uuid")?,
        action: get_code(row, "action", AuditAction::parse)?,
        object_type: row.get("object_type")?,
        object_uuid: get_opt_uuid(row, "object_uuid")?,
        description: row.get("description")?,
        changes,
        timestamp: row.get("timestamp")?,
    })
}

fn parse_setting_row(row: &Row<'_>) -> RepoResult<SystemSetting> {
    let key: String = row.get("key")?;
    let data_type = get_code(row, "data_type", SettingType::parse)?;
    let raw: String = row.get("value")?;
    let value = SettingValue::from_storage(data_type, &raw).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "setting `{key}` does not parse as declared type `{data_type}`"
        ))
    })?;
    Ok(SystemSetting {
        key,
        value,
        description: row.get("description")?,
        is_public: get_bool(row, "is_public")?,
        updated_by: get_opt_uuid(row, "updated_by")?,
        updated_at: row.get("updated_at")?,
    })
}
