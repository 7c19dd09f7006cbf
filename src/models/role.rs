// src/models/role.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// User role. Serialized with the short tags used in tokens and the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Administrator,
    #[serde(rename = "zo")]
    ZonalOfficer,
    #[serde(rename = "ro")]
    RegionalOfficer,
    #[serde(rename = "supervisor")]
    Supervisor,
    #[serde(rename = "enumerator")]
    Enumerator,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Administrator,
        Role::ZonalOfficer,
        Role::RegionalOfficer,
        Role::Supervisor,
        Role::Enumerator,
    ];

    /// Parses a role tag. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Role> {
        match tag {
            "admin" => Some(Role::Administrator),
            "zo" => Some(Role::ZonalOfficer),
            "ro" => Some(Role::RegionalOfficer),
            "supervisor" => Some(Role::Supervisor),
            "enumerator" => Some(Role::Enumerator),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Administrator => "admin",
            Role::ZonalOfficer => "zo",
            Role::RegionalOfficer => "ro",
            Role::Supervisor => "supervisor",
            Role::Enumerator => "enumerator",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::ZonalOfficer => "Zonal Officer",
            Role::RegionalOfficer => "Regional Officer",
            Role::Supervisor => "Supervisor",
            Role::Enumerator => "Enumerator",
        }
    }

    /// Permissions granted to the role when no per-user override list exists.
    pub fn default_permissions(self) -> &'static [&'static str] {
        match self {
            Role::Administrator => ADMIN_PERMISSIONS,
            Role::ZonalOfficer => ZO_PERMISSIONS,
            Role::RegionalOfficer => RO_PERMISSIONS,
            Role::Supervisor => SUPERVISOR_PERMISSIONS,
            Role::Enumerator => ENUMERATOR_PERMISSIONS,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ADMIN_PERMISSIONS: &[&str] = &[
    "dashboard.view",
    "dashboard.admin",
    "users.view",
    "users.create",
    "users.edit",
    "users.delete",
    "users.manage_roles",
    "surveys.view",
    "surveys.create",
    "surveys.edit",
    "surveys.delete",
    "surveys.publish",
    "questions.view",
    "questions.create",
    "questions.edit",
    "questions.delete",
    "questions.import",
    "tests.take",
    "tests.view_results",
    "tests.view_all_results",
    "tests.manage_sessions",
    "certificates.view",
    "certificates.view_all",
    "certificates.generate",
    "certificates.revoke",
    "reports.view",
    "reports.export",
    "reports.advanced",
    "system.settings",
    "system.audit",
    "system.backup",
    "roles.view",
    "roles.create",
    "roles.edit",
    "roles.delete",
];

const ZO_PERMISSIONS: &[&str] = &[
    "dashboard.view",
    "dashboard.admin",
    "users.view",
    "users.create",
    "users.edit",
    "users.manage_roles",
    "surveys.view",
    "surveys.create",
    "surveys.edit",
    "surveys.publish",
    "questions.view",
    "questions.create",
    "questions.edit",
    "questions.import",
    "tests.view_all_results",
    "tests.manage_sessions",
    "certificates.view_all",
    "certificates.generate",
    "reports.view",
    "reports.export",
    "reports.advanced",
    "roles.view",
];

const RO_PERMISSIONS: &[&str] = &[
    "dashboard.view",
    "users.view",
    "users.create",
    "users.edit",
    "surveys.view",
    "questions.view",
    "tests.view_all_results",
    "certificates.view_all",
    "reports.view",
    "reports.export",
];

const SUPERVISOR_PERMISSIONS: &[&str] = &[
    "dashboard.view",
    "users.view",
    "surveys.view",
    "questions.view",
    "tests.view_all_results",
    "certificates.view_all",
    "reports.view",
];

const ENUMERATOR_PERMISSIONS: &[&str] = &[
    "dashboard.view",
    "tests.take",
    "tests.view_results",
    "certificates.view",
];

/// Catalog entry describing a permission for display purposes.
/// The category is a grouping label only and never affects access decisions.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PermissionInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
}

const fn perm(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: &'static str,
) -> PermissionInfo {
    PermissionInfo {
        id,
        name,
        description,
        category,
    }
}

pub const PERMISSION_CATALOG: &[PermissionInfo] = &[
    perm("dashboard.view", "View Dashboard", "Access to dashboard overview", "Dashboard"),
    perm("dashboard.admin", "Admin Dashboard", "Access to administrative dashboard", "Dashboard"),
    perm("users.view", "View Users", "View user list and details", "User Management"),
    perm("users.create", "Create Users", "Create new user accounts", "User Management"),
    perm("users.edit", "Edit Users", "Modify user information", "User Management"),
    perm("users.delete", "Delete Users", "Remove user accounts", "User Management"),
    perm("users.manage_roles", "Manage User Roles", "Assign and modify user roles", "User Management"),
    perm("surveys.view", "View Surveys", "View survey list and details", "Survey Management"),
    perm("surveys.create", "Create Surveys", "Create new surveys", "Survey Management"),
    perm("surveys.edit", "Edit Surveys", "Modify survey configuration", "Survey Management"),
    perm("surveys.delete", "Delete Surveys", "Remove surveys", "Survey Management"),
    perm("surveys.publish", "Publish Surveys", "Activate and publish surveys", "Survey Management"),
    perm("questions.view", "View Questions", "View question bank", "Question Management"),
    perm("questions.create", "Create Questions", "Add new questions", "Question Management"),
    perm("questions.edit", "Edit Questions", "Modify existing questions", "Question Management"),
    perm("questions.delete", "Delete Questions", "Remove questions", "Question Management"),
    perm("questions.import", "Import Questions", "Bulk import questions", "Question Management"),
    perm("tests.take", "Take Tests", "Participate in assessments", "Test Management"),
    perm("tests.view_results", "View Test Results", "View own test results", "Test Management"),
    perm("tests.view_all_results", "View All Results", "View all user test results", "Test Management"),
    perm("tests.manage_sessions", "Manage Test Sessions", "Control test sessions", "Test Management"),
    perm("certificates.view", "View Certificates", "View own certificates", "Certificates"),
    perm("certificates.view_all", "View All Certificates", "View all user certificates", "Certificates"),
    perm("certificates.generate", "Generate Certificates", "Create and issue certificates", "Certificates"),
    perm("certificates.revoke", "Revoke Certificates", "Revoke issued certificates", "Certificates"),
    perm("reports.view", "View Reports", "Access reporting dashboard", "Reporting"),
    perm("reports.export", "Export Reports", "Export report data", "Reporting"),
    perm("reports.advanced", "Advanced Reports", "Access advanced reporting features", "Reporting"),
    perm("system.settings", "System Settings", "Manage system configuration", "System"),
    perm("system.audit", "Audit Logs", "View system audit logs", "System"),
    perm("system.backup", "Backup Management", "Manage system backups", "System"),
    perm("roles.view", "View Roles", "View role definitions", "Role Management"),
    perm("roles.create", "Create Roles", "Create new roles", "Role Management"),
    perm("roles.edit", "Edit Roles", "Modify role permissions", "Role Management"),
    perm("roles.delete", "Delete Roles", "Remove custom roles", "Role Management"),
];

/// A navigable screen and the access it requires.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MenuEntry {
    pub id: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub required_permissions: &'static [&'static str],
    pub roles: &'static [Role],
}

use Role::{
    Administrator as ADMIN, Enumerator as ENUM, RegionalOfficer as RO, Supervisor as SUP,
    ZonalOfficer as ZO,
};

/// Menu configuration in display order.
pub const MENU_ENTRIES: &[MenuEntry] = &[
    MenuEntry {
        id: "dashboard",
        label: "Dashboard",
        icon: "Home",
        required_permissions: &["dashboard.view"],
        roles: &[ADMIN, ZO, RO, SUP, ENUM],
    },
    MenuEntry {
        id: "users",
        label: "User Management",
        icon: "Users",
        required_permissions: &["users.view"],
        roles: &[ADMIN, ZO, RO],
    },
    MenuEntry {
        id: "roles",
        label: "Role Management",
        icon: "Shield",
        required_permissions: &["roles.view"],
        roles: &[ADMIN],
    },
    MenuEntry {
        id: "surveys",
        label: "Survey Management",
        icon: "FileText",
        required_permissions: &["surveys.view"],
        roles: &[ADMIN, ZO, RO],
    },
    MenuEntry {
        id: "questions",
        label: "Question Bank",
        icon: "BookOpen",
        required_permissions: &["questions.view"],
        roles: &[ADMIN, ZO, RO],
    },
    MenuEntry {
        id: "my-tests",
        label: "My Tests",
        icon: "Clock",
        required_permissions: &["tests.take"],
        roles: &[ENUM],
    },
    MenuEntry {
        id: "test-management",
        label: "Test Management",
        icon: "ClipboardList",
        required_permissions: &["tests.manage_sessions"],
        roles: &[ADMIN, ZO, RO, SUP],
    },
    MenuEntry {
        id: "results",
        label: "Results & Reports",
        icon: "BarChart3",
        required_permissions: &["reports.view"],
        roles: &[ADMIN, ZO, RO, SUP],
    },
    MenuEntry {
        id: "my-results",
        label: "My Results",
        icon: "BarChart3",
        required_permissions: &["tests.view_results"],
        roles: &[ENUM],
    },
    MenuEntry {
        id: "certificates",
        label: "Certificates",
        icon: "Award",
        required_permissions: &["certificates.view_all"],
        roles: &[ADMIN, ZO, RO, SUP],
    },
    MenuEntry {
        id: "my-certificates",
        label: "My Certificates",
        icon: "Award",
        required_permissions: &["certificates.view"],
        roles: &[ENUM],
    },
    MenuEntry {
        id: "team-results",
        label: "Team Results",
        icon: "BarChart3",
        required_permissions: &["tests.view_all_results"],
        roles: &[ZO, RO, SUP],
    },
    MenuEntry {
        id: "enumerators",
        label: "My Enumerators",
        icon: "UserCheck",
        required_permissions: &["users.view"],
        roles: &[SUP, RO, ZO],
    },
    MenuEntry {
        id: "system",
        label: "System Settings",
        icon: "Settings",
        required_permissions: &["system.settings"],
        roles: &[ADMIN],
    },
    MenuEntry {
        id: "audit",
        label: "Audit Logs",
        icon: "FileSearch",
        required_permissions: &["system.audit"],
        roles: &[ADMIN],
    },
];
