//! Users, roles, permissions, audit log and system settings.
//!
//! # Invariants
//! - Permission codenames are unique; `(module, action)` pairs are unique.
//! - A user's effective permissions come only from the assigned role.
//! - Audit records are append-only.

use super::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type RoleId = Uuid;
pub type PermissionId = Uuid;

/// Back-office operator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: UserId,
    pub username: String,
    pub email: Option<String>,
    pub full_name: String,
    pub is_active: bool,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            username: username.into(),
            email: None,
            full_name: String::new(),
            is_active: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("username", &self.username)?;
        if let Some(email) = self.email.as_deref() {
            if !email.contains('@') {
                return Err(ValidationError::InvalidFormat {
                    field: "email",
                    value: email.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Full name when present, username otherwise.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

string_enum! {
    /// Functional area a permission applies to.
    pub enum PermissionModule {
        Core => "core",
        Owners => "owners",
        Clients => "clients",
        Properties => "properties",
        Contracts => "contracts",
        Maintenance => "maintenance",
        Reports => "reports",
        Api => "api",
    }
}

string_enum! {
    pub enum PermissionAction {
        View => "view",
        Add => "add",
        Change => "change",
        Delete => "delete",
        Export => "export",
        Import => "import",
        Manage => "manage",
    }
}

/// Fine-grained permission granted through roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub uuid: PermissionId,
    pub name: String,
    pub codename: String,
    pub description: String,
    pub module: PermissionModule,
    pub action: PermissionAction,
}

impl Permission {
    /// Creates a permission whose codename is `<module>.<action>`.
    pub fn new(name: impl Into<String>, module: PermissionModule, action: PermissionAction) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            codename: format!("{module}.{action}"),
            description: String::new(),
            module,
            action,
        }
    }
}

string_enum! {
    pub enum RoleType {
        SuperAdmin => "super_admin",
        Admin => "admin",
        Manager => "manager",
        User => "user",
        Custom => "custom",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub uuid: RoleId,
    pub name: String,
    pub role_type: RoleType,
    pub description: String,
    pub is_active: bool,
}

impl Role {
    pub fn new(name: impl Into<String>, role_type: RoleType) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            role_type,
            description: String::new(),
            is_active: true,
        }
    }
}

string_enum! {
    pub enum Language {
        English => "en",
        Arabic => "ar",
    }
}

string_enum! {
    pub enum Theme {
        Light => "light",
        Dark => "dark",
    }
}

/// Per-user profile holding the role assignment and UI preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_uuid: UserId,
    pub role_uuid: Option<RoleId>,
    pub phone: String,
    pub language: Language,
    pub theme: Theme,
    pub department: String,
    pub position: String,
}

impl UserProfile {
    pub fn new(user_uuid: UserId) -> Self {
        Self {
            user_uuid,
            role_uuid: None,
            phone: String::new(),
            language: Language::English,
            theme: Theme::Light,
            department: String::new(),
            position: String::new(),
        }
    }
}

string_enum! {
    pub enum AuditAction {
        Create => "create",
        Update => "update",
        Delete => "delete",
        View => "view",
        Login => "login",
        Logout => "logout",
        Export => "export",
        Import => "import",
    }
}

/// Append-only audit trail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub user_uuid: Option<UserId>,
    pub action: AuditAction,
    pub object_type: Option<String>,
    pub object_uuid: Option<Uuid>,
    pub description: String,
    pub changes: Option<serde_json::Value>,
    pub timestamp: i64,
}

string_enum! {
    pub enum SettingType {
        String => "string",
        Integer => "integer",
        Boolean => "boolean",
        Json => "json",
    }
}

/// Typed system-wide setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Json(serde_json::Value),
}

impl SettingValue {
    pub fn data_type(&self) -> SettingType {
        match self {
            Self::String(_) => SettingType::String,
            Self::Integer(_) => SettingType::Integer,
            Self::Boolean(_) => SettingType::Boolean,
            Self::Json(_) => SettingType::Json,
        }
    }

    /// Text form persisted in `system_settings.value`.
    pub fn to_storage(&self) -> String {
        match self {
            Self::String(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Boolean(value) => value.to_string(),
            Self::Json(value) => value.to_string(),
        }
    }

    /// Decodes a stored value according to its declared type.
    pub fn from_storage(data_type: SettingType, raw: &str) -> Option<Self> {
        match data_type {
            SettingType::String => Some(Self::String(raw.to_string())),
            SettingType::Integer => raw.trim().parse().ok().map(Self::Integer),
            SettingType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(Self::Boolean(true)),
                "false" | "0" | "no" => Some(Self::Boolean(false)),
                _ => None,
            },
            SettingType::Json => serde_json::from_str(raw).ok().map(Self::Json),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSetting {
    pub key: String,
    pub value: SettingValue,
    pub description: String,
    pub is_public: bool,
    pub updated_by: Option<UserId>,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_codename_joins_module_and_action() {
        let permission = Permission::new(
            "Edit properties",
            PermissionModule::Properties,
            PermissionAction::Change,
        );
        assert_eq!(permission.codename, "properties.change");
    }

    #[test]
    fn setting_values_round_trip_through_storage_text() {
        let value = SettingValue::Boolean(true);
        assert_eq!(
            SettingValue::from_storage(SettingType::Boolean, &value.to_storage()),
            Some(value)
        );
        assert_eq!(SettingValue::from_storage(SettingType::Integer, "x1"), None);
    }

    #[test]
    fn user_rejects_email_without_at_sign() {
        let mut user = User::new("amal");
        user.email = Some("amal.example.com".to_string());
        assert!(matches!(
            user.validate(),
            Err(ValidationError::InvalidFormat { field: "email", .. })
        ));
    }
}
