//! Permission flags and the role templates derived from them. Roles are
//! never stored: a user's role is whatever template their flags match.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Column names of the flags, in [`Permissions::flags`] order.
pub const PERMISSION_COLUMNS: [&str; 12] = [
    "can_view_client_demographics",
    "can_view_client_services",
    "can_view_all_clients",
    "can_export_client_data",
    "can_manage_users",
    "can_manage_system_settings",
    "can_view_audit_logs",
    "can_manage_database",
    "can_create_contacts",
    "can_edit_own_contacts",
    "can_edit_all_contacts",
    "can_delete_contacts",
];

const PERMISSION_LABELS: [&str; 12] = [
    "View Demographics",
    "View Services",
    "View All Clients",
    "Export Data",
    "Manage Users",
    "System Settings",
    "Audit Logs",
    "Database",
    "Create Contacts",
    "Edit Own",
    "Edit All",
    "Delete",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct Permissions {
    // data access
    pub can_view_client_demographics: bool,
    pub can_view_client_services: bool,
    pub can_view_all_clients: bool,
    pub can_export_client_data: bool,
    // system management
    pub can_manage_users: bool,
    pub can_manage_system_settings: bool,
    pub can_view_audit_logs: bool,
    pub can_manage_database: bool,
    // operations
    pub can_create_contacts: bool,
    pub can_edit_own_contacts: bool,
    pub can_edit_all_contacts: bool,
    pub can_delete_contacts: bool,
}

impl Permissions {
    pub fn from_flags(flags: [bool; 12]) -> Self {
        let [
            can_view_client_demographics,
            can_view_client_services,
            can_view_all_clients,
            can_export_client_data,
            can_manage_users,
            can_manage_system_settings,
            can_view_audit_logs,
            can_manage_database,
            can_create_contacts,
            can_edit_own_contacts,
            can_edit_all_contacts,
            can_delete_contacts,
        ] = flags;
        Self {
            can_view_client_demographics,
            can_view_client_services,
            can_view_all_clients,
            can_export_client_data,
            can_manage_users,
            can_manage_system_settings,
            can_view_audit_logs,
            can_manage_database,
            can_create_contacts,
            can_edit_own_contacts,
            can_edit_all_contacts,
            can_delete_contacts,
        }
    }

    pub fn flags(&self) -> [bool; 12] {
        [
            self.can_view_client_demographics,
            self.can_view_client_services,
            self.can_view_all_clients,
            self.can_export_client_data,
            self.can_manage_users,
            self.can_manage_system_settings,
            self.can_view_audit_logs,
            self.can_manage_database,
            self.can_create_contacts,
            self.can_edit_own_contacts,
            self.can_edit_all_contacts,
            self.can_delete_contacts,
        ]
    }

    pub fn any(&self) -> bool {
        self.flags().into_iter().any(|flag| flag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum RoleTemplate {
    #[strum(serialize = "Direct Service Provider")]
    #[serde(rename = "Direct Service Provider")]
    DirectServiceProvider,
    #[strum(serialize = "Program Director")]
    #[serde(rename = "Program Director")]
    ProgramDirector,
    #[strum(serialize = "Reports Viewer")]
    #[serde(rename = "Reports Viewer")]
    ReportsViewer,
    #[strum(serialize = "IT Administrator")]
    #[serde(rename = "IT Administrator")]
    ItAdministrator,
    #[strum(serialize = "Data Manager")]
    #[serde(rename = "Data Manager")]
    DataManager,
    #[strum(serialize = "Super Admin")]
    #[serde(rename = "Super Admin")]
    SuperAdmin,
    Custom,
}

impl RoleTemplate {
    pub const TEMPLATES: [RoleTemplate; 6] = [
        RoleTemplate::DirectServiceProvider,
        RoleTemplate::ProgramDirector,
        RoleTemplate::ReportsViewer,
        RoleTemplate::ItAdministrator,
        RoleTemplate::DataManager,
        RoleTemplate::SuperAdmin,
    ];

    /// Full flag set of the template; `None` for Custom.
    pub fn permissions(self) -> Option<Permissions> {
        const T: bool = true;
        const F: bool = false;
        let flags = match self {
            RoleTemplate::DirectServiceProvider => [T, T, F, F, F, F, F, F, T, T, F, F],
            RoleTemplate::ProgramDirector => [T, T, T, T, F, F, T, F, T, T, T, T],
            RoleTemplate::ReportsViewer => [F, T, F, F, F, F, F, F, F, F, F, F],
            RoleTemplate::ItAdministrator => [F, F, F, F, T, T, T, T, F, F, F, F],
            RoleTemplate::DataManager => [T, T, T, T, F, F, T, F, T, T, T, F],
            RoleTemplate::SuperAdmin => [T; 12],
            RoleTemplate::Custom => return None,
        };
        Some(Permissions::from_flags(flags))
    }
}

/// First template whose flags match exactly; anything else is Custom.
pub fn role_for(permissions: &Permissions) -> RoleTemplate {
    RoleTemplate::TEMPLATES
        .into_iter()
        .find(|template| template.permissions().as_ref() == Some(permissions))
        .unwrap_or(RoleTemplate::Custom)
}

pub fn permission_summary(permissions: &Permissions) -> Vec<&'static str> {
    permissions
        .flags()
        .into_iter()
        .zip(PERMISSION_LABELS)
        .filter_map(|(enabled, label)| enabled.then_some(label))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub role: RoleTemplate,
    pub permissions: Permissions,
    pub summary: Vec<&'static str>,
}

pub fn role_definitions() -> Vec<RoleDefinition> {
    RoleTemplate::TEMPLATES
        .into_iter()
        .filter_map(|role| {
            role.permissions().map(|permissions| RoleDefinition {
                role,
                summary: permission_summary(&permissions),
                permissions,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_classifies_as_itself() {
        for template in RoleTemplate::TEMPLATES {
            let permissions = template.permissions().unwrap();
            assert_eq!(role_for(&permissions), template, "{template}");
        }
    }

    #[test]
    fn any_deviation_is_custom() {
        let mut permissions = RoleTemplate::DataManager.permissions().unwrap();
        permissions.can_delete_contacts = true;
        assert_eq!(role_for(&permissions), RoleTemplate::ProgramDirector);

        permissions.can_manage_database = true;
        assert_eq!(role_for(&permissions), RoleTemplate::Custom);
        assert_eq!(role_for(&Permissions::default()), RoleTemplate::Custom);
    }

    #[test]
    fn summary_lists_enabled_flags_in_order() {
        let permissions = RoleTemplate::DirectServiceProvider.permissions().unwrap();
        assert_eq!(
            permission_summary(&permissions),
            vec!["View Demographics", "View Services", "Create Contacts", "Edit Own"]
        );
        assert!(permission_summary(&Permissions::default()).is_empty());
    }

    #[test]
    fn flags_round_trip_through_array() {
        let permissions = RoleTemplate::ItAdministrator.permissions().unwrap();
        assert_eq!(Permissions::from_flags(permissions.flags()), permissions);
        assert!(permissions.any());
        assert!(!Permissions::default().any());
    }

    #[test]
    fn role_labels_parse() {
        assert_eq!("IT Administrator".parse::<RoleTemplate>().unwrap(), RoleTemplate::ItAdministrator);
        assert_eq!(RoleTemplate::SuperAdmin.to_string(), "Super Admin");
    }
}
