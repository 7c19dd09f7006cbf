// src/utils/permissions.rs

use std::collections::BTreeMap;

use crate::{
    error::AppError,
    models::role::{MENU_ENTRIES, MenuEntry, PERMISSION_CATALOG, PermissionInfo, Role},
    utils::jwt::Claims,
};

/// Checks whether the role (or the override list, when present) grants `permission`.
///
/// An override list replaces the role defaults entirely. It is never merged with them,
/// so an empty override list denies everything.
pub fn has_permission(role: Role, permission: &str, overrides: Option<&[String]>) -> bool {
    permission_granted(Some(role), permission, overrides)
}

/// The override list decides without looking at the role. Without one, an unknown
/// role has an empty default set.
fn permission_granted(role: Option<Role>, permission: &str, overrides: Option<&[String]>) -> bool {
    match overrides {
        Some(granted) => granted.iter().any(|p| p == permission),
        None => role.is_some_and(|r| r.default_permissions().iter().any(|p| *p == permission)),
    }
}

/// Decides whether the menu entry `menu_id` is reachable.
///
/// Requires both role membership and every required permission. Unknown ids are denied.
pub fn can_access_menu(role: Role, menu_id: &str, overrides: Option<&[String]>) -> bool {
    MENU_ENTRIES
        .iter()
        .find(|entry| entry.id == menu_id)
        .is_some_and(|entry| entry_allows(entry, role, overrides))
}

/// Reachable menu entries, in configuration order.
pub fn menu_items_for_user(role: Role, overrides: Option<&[String]>) -> Vec<&'static MenuEntry> {
    MENU_ENTRIES
        .iter()
        .filter(|entry| entry_allows(entry, role, overrides))
        .collect()
}

fn entry_allows(entry: &MenuEntry, role: Role, overrides: Option<&[String]>) -> bool {
    entry.roles.contains(&role)
        && entry
            .required_permissions
            .iter()
            .all(|p| has_permission(role, p, overrides))
}

// Variants taking a raw role tag. An unknown tag has no defaults and no menu.

pub fn has_permission_for_role_name(
    role: &str,
    permission: &str,
    overrides: Option<&[String]>,
) -> bool {
    permission_granted(Role::parse(role), permission, overrides)
}

pub fn can_access_menu_for_role_name(
    role: &str,
    menu_id: &str,
    overrides: Option<&[String]>,
) -> bool {
    Role::parse(role).is_some_and(|r| can_access_menu(r, menu_id, overrides))
}

pub fn menu_items_for_role_name(
    role: &str,
    overrides: Option<&[String]>,
) -> Vec<&'static MenuEntry> {
    Role::parse(role)
        .map(|r| menu_items_for_user(r, overrides))
        .unwrap_or_default()
}

/// Display category of a permission id, if catalogued.
pub fn permission_category(permission: &str) -> Option<&'static str> {
    PERMISSION_CATALOG
        .iter()
        .find(|p| p.id == permission)
        .map(|p| p.category)
}

/// Permission catalog grouped by category. Order within a group follows the catalog.
pub fn grouped_permission_catalog() -> BTreeMap<&'static str, Vec<&'static PermissionInfo>> {
    let mut groups: BTreeMap<&'static str, Vec<&'static PermissionInfo>> = BTreeMap::new();
    for info in PERMISSION_CATALOG {
        groups.entry(info.category).or_default().push(info);
    }
    groups
}

/// Handler guard: fails with 403 unless the token's subject holds `permission`.
pub fn ensure_permission(claims: &Claims, permission: &str) -> Result<(), AppError> {
    if has_permission_for_role_name(&claims.role, permission, claims.permissions.as_deref()) {
        Ok(())
    } else {
        tracing::debug!(
            "Denied '{}' to user {} with role '{}'",
            permission,
            claims.sub,
            claims.role
        );
        Err(AppError::Forbidden(format!("Missing permission '{}'", permission)))
    }
}
