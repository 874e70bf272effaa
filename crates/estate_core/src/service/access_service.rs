//! Access control, audit trail and typed system settings.

use crate::model::access::{
    AuditAction, AuditRecord, Permission, PermissionId, Role, RoleId, SettingType, SettingValue,
    SystemSetting, User, UserId, UserProfile,
};
use crate::model::ValidationError;
use crate::repo::access_repo::{AccessRepository, AuditQuery};
use crate::repo::RepoError;
use log::{info, warn};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AccessServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("user {user} lacks permission `{codename}`")]
    PermissionDenied { user: UserId, codename: String },
    #[error("setting `{key}` is {actual}, not {expected}")]
    SettingType {
        key: String,
        expected: SettingType,
        actual: SettingType,
    },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for AccessServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

pub type AccessResult<T> = Result<T, AccessServiceError>;

pub struct AccessService<A: AccessRepository> {
    repo: A,
}

impl<A: AccessRepository> AccessService<A> {
    pub fn new(repo: A) -> Self {
        Self { repo }
    }

    pub fn create_user(&self, user: &User) -> AccessResult<UserId> {
        let id = self.repo.create_user(user)?;
        info!("event=user_create module=access status=ok user_id={id}");
        Ok(id)
    }

    pub fn get_user(&self, id: UserId) -> AccessResult<User> {
        self.repo
            .get_user(id)?
            .ok_or_else(|| AccessServiceError::NotFound {
                entity: "user",
                key: id.to_string(),
            })
    }

    pub fn get_user_by_username(&self, username: &str) -> AccessResult<User> {
        self.repo
            .get_user_by_username(username)?
            .ok_or_else(|| AccessServiceError::NotFound {
                entity: "user",
                key: username.to_string(),
            })
    }

    pub fn list_active_users(&self) -> AccessResult<Vec<User>> {
        Ok(self.repo.list_active_users()?)
    }

    pub fn create_permission(&self, permission: &Permission) -> AccessResult<PermissionId> {
        Ok(self.repo.create_permission(permission)?)
    }

    pub fn list_permissions(&self) -> AccessResult<Vec<Permission>> {
        Ok(self.repo.list_permissions()?)
    }

    pub fn create_role(&self, role: &Role, permissions: &[PermissionId]) -> AccessResult<RoleId> {
        let id = self.repo.create_role(role)?;
        if !permissions.is_empty() {
            self.repo.set_role_permissions(id, permissions)?;
        }
        info!(
            "event=role_create module=access status=ok role_id={id} permission_count={}",
            permissions.len()
        );
        Ok(id)
    }

    pub fn set_role_permissions(
        &self,
        role: RoleId,
        permissions: &[PermissionId],
    ) -> AccessResult<()> {
        Ok(self.repo.set_role_permissions(role, permissions)?)
    }

    pub fn role_has_permission(&self, role: RoleId, codename: &str) -> AccessResult<bool> {
        Ok(self.repo.role_has_permission(role, codename)?)
    }

    /// Assigns `role` to `user`, creating the profile on first use.
    pub fn assign_role(&self, user: UserId, role: Option<RoleId>) -> AccessResult<()> {
        self.get_user(user)?;
        if let Some(role) = role {
            if self.repo.get_role(role)?.is_none() {
                return Err(AccessServiceError::NotFound {
                    entity: "role",
                    key: role.to_string(),
                });
            }
        }
        let mut profile = self
            .repo
            .get_profile(user)?
            .unwrap_or_else(|| UserProfile::new(user));
        profile.role_uuid = role;
        self.repo.save_profile(&profile)?;
        info!("event=role_assign module=access status=ok user_id={user}");
        Ok(())
    }

    pub fn get_profile(&self, user: UserId) -> AccessResult<UserProfile> {
        Ok(self
            .repo
            .get_profile(user)?
            .unwrap_or_else(|| UserProfile::new(user)))
    }

    pub fn save_profile(&self, profile: &UserProfile) -> AccessResult<()> {
        Ok(self.repo.save_profile(profile)?)
    }

    pub fn user_has_permission(&self, user: UserId, codename: &str) -> AccessResult<bool> {
        Ok(self.repo.user_has_permission(user, codename)?)
    }

    /// Fails with `PermissionDenied` unless the user's role grants `codename`.
    pub fn require_permission(&self, user: UserId, codename: &str) -> AccessResult<()> {
        if self.repo.user_has_permission(user, codename)? {
            return Ok(());
        }
        warn!("event=permission_check module=access status=error user_id={user} error_code=denied");
        Err(AccessServiceError::PermissionDenied {
            user,
            codename: codename.to_string(),
        })
    }

    pub fn record_audit(
        &self,
        actor: Option<UserId>,
        action: AuditAction,
        object: Option<(&str, Uuid)>,
        description: &str,
        changes: Option<serde_json::Value>,
    ) -> AccessResult<i64> {
        let record = AuditRecord {
            id: 0,
            user_uuid: actor,
            action,
            object_type: object.map(|(object_type, _)| object_type.to_string()),
            object_uuid: object.map(|(_, id)| id),
            description: description.to_string(),
            changes,
            timestamp: 0,
        };
        Ok(self.repo.append_audit(&record)?)
    }

    pub fn list_audit(&self, query: &AuditQuery) -> AccessResult<Vec<AuditRecord>> {
        Ok(self.repo.list_audit(query)?)
    }

    pub fn put_setting(
        &self,
        key: &str,
        value: SettingValue,
        description: &str,
        is_public: bool,
        actor: Option<UserId>,
    ) -> AccessResult<()> {
        let setting = SystemSetting {
            key: key.to_string(),
            value,
            description: description.to_string(),
            is_public,
            updated_by: actor,
            updated_at: 0,
        };
        self.repo.put_setting(&setting)?;
        info!(
            "event=setting_put module=access status=ok data_type={}",
            setting.value.data_type()
        );
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> AccessResult<Option<SystemSetting>> {
        Ok(self.repo.get_setting(key)?)
    }

    pub fn list_settings(&self, public_only: bool) -> AccessResult<Vec<SystemSetting>> {
        Ok(self.repo.list_settings(public_only)?)
    }

    pub fn setting_string(&self, key: &str) -> AccessResult<Option<String>> {
        self.typed_setting(key, SettingType::String, |value| match value {
            SettingValue::String(text) => Some(text),
            _ => None,
        })
    }

    pub fn setting_integer(&self, key: &str) -> AccessResult<Option<i64>> {
        self.typed_setting(key, SettingType::Integer, |value| match value {
            SettingValue::Integer(number) => Some(number),
            _ => None,
        })
    }

    pub fn setting_bool(&self, key: &str) -> AccessResult<Option<bool>> {
        self.typed_setting(key, SettingType::Boolean, |value| match value {
            SettingValue::Boolean(flag) => Some(flag),
            _ => None,
        })
    }

    pub fn setting_json(&self, key: &str) -> AccessResult<Option<serde_json::Value>> {
        self.typed_setting(key, SettingType::Json, |value| match value {
            SettingValue::Json(json) => Some(json),
            _ => None,
        })
    }

    fn typed_setting<T>(
        &self,
        key: &str,
        expected: SettingType,
        extract: impl FnOnce(SettingValue) -> Option<T>,
    ) -> AccessResult<Option<T>> {
        let Some(setting) = self.repo.get_setting(key)? else {
            return Ok(None);
        };
        let actual = setting.value.data_type();
        extract(setting.value)
            .map(Some)
            .ok_or_else(|| AccessServiceError::SettingType {
                key: key.to_string(),
                expected,
                actual,
            })
    }
}
