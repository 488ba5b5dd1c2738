use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use proptest::prelude::*;

use super::EffectivePermissionSet;
use crate::{
    Module, ModuleId, Permission, PermissionAction, PermissionId, ResolvedRoleGrant,
    ResolvedUserOverride, RoleId,
};

fn permission(name: &str, action: PermissionAction, module: Option<&Module>) -> Permission {
    Permission::new(PermissionId::new(), name, action)
        .unwrap_or_else(|_| unreachable!())
        .with_module(module.map(Module::id))
}

fn role_grant(
    role_id: RoleId,
    permission: &Permission,
    module: Option<&Module>,
    granted: bool,
) -> ResolvedRoleGrant {
    ResolvedRoleGrant {
        role_id,
        permission: permission.clone(),
        module: module.cloned(),
        granted,
    }
}

fn user_override(
    permission: &Permission,
    module: Option<&Module>,
    granted: bool,
) -> ResolvedUserOverride {
    ResolvedUserOverride {
        permission: permission.clone(),
        module: module.cloned(),
        granted,
        expires_at: None,
    }
}

fn names(set: &EffectivePermissionSet) -> Vec<&str> {
    set.permission_names().iter().map(String::as_str).collect()
}

#[test]
fn user_revocation_removes_role_grant_and_user_grant_adds_permission() {
    let docs = Module::new(ModuleId::new(), "Docs")
        .unwrap_or_else(|_| unreachable!())
        .with_path("/docs")
        .with_sort_order(2);
    let reports = Module::new(ModuleId::new(), "Reports")
        .unwrap_or_else(|_| unreachable!())
        .with_path("/reports")
        .with_sort_order(1);
    let docs_read = permission("docs_read", PermissionAction::Read, Some(&docs));
    let docs_update = permission("docs_update", PermissionAction::Update, Some(&docs));
    let reports_read = permission("reports_read", PermissionAction::Read, Some(&reports));
    let editor = RoleId::new();

    let set = EffectivePermissionSet::merge(
        &[
            role_grant(editor, &docs_read, Some(&docs), true),
            role_grant(editor, &docs_update, Some(&docs), true),
        ],
        &[
            user_override(&docs_update, Some(&docs), false),
            user_override(&reports_read, Some(&reports), true),
        ],
        Utc::now(),
    );

    assert_eq!(names(&set), vec!["docs_read", "reports_read"]);
    assert!(set.has_all_permissions(&["docs_read", "reports_read"]));
    assert!(!set.has_permission("docs_update"));

    let accessible: Vec<&str> = set.accessible_modules().iter().map(Module::name).collect();
    assert_eq!(accessible, vec!["Reports", "Docs"]);
    assert!(set.has_module_access("/docs"));
    assert!(!set.has_module_access("/admin"));
}

#[test]
fn expired_overrides_contribute_nothing() {
    let now = Utc::now();
    let granted_in_past = permission("billing_read", PermissionAction::Read, None);
    let revoked_in_past = permission("docs_read", PermissionAction::Read, None);
    let role_id = RoleId::new();

    let mut expired_grant = user_override(&granted_in_past, None, true);
    expired_grant.expires_at = Some(now - Duration::hours(1));
    let mut expired_revoke = user_override(&revoked_in_past, None, false);
    expired_revoke.expires_at = Some(now - Duration::hours(1));

    let set = EffectivePermissionSet::merge(
        &[role_grant(role_id, &revoked_in_past, None, true)],
        &[expired_grant, expired_revoke],
        now,
    );

    assert_eq!(names(&set), vec!["docs_read"]);
}

#[test]
fn role_revocation_does_not_cancel_grant_from_another_role() {
    let tasks_read = permission("tasks_read", PermissionAction::Read, None);
    let set = EffectivePermissionSet::merge(
        &[
            role_grant(RoleId::new(), &tasks_read, None, false),
            role_grant(RoleId::new(), &tasks_read, None, true),
        ],
        &[],
        Utc::now(),
    );

    assert!(set.has_permission("tasks_read"));
}

#[test]
fn inactive_permissions_and_modules_are_excluded() {
    let archived = Module::new(ModuleId::new(), "Archive")
        .unwrap_or_else(|_| unreachable!())
        .with_active(false)
        .with_path("/archive");
    let archive_read = permission("archive_read", PermissionAction::Read, Some(&archived));
    let retired = permission("legacy_execute", PermissionAction::Execute, None).with_active(false);
    let role_id = RoleId::new();

    let set = EffectivePermissionSet::merge(
        &[
            role_grant(role_id, &archive_read, Some(&archived), true),
            role_grant(role_id, &retired, None, true),
        ],
        &[],
        Utc::now(),
    );

    assert_eq!(names(&set), vec!["archive_read"]);
    assert!(set.accessible_modules().is_empty());
    assert!(!set.has_module_access("/archive"));
}

#[test]
fn module_lists_are_distinct_and_limited_to_read_for_access() {
    let suppliers = Module::new(ModuleId::new(), "Suppliers")
        .unwrap_or_else(|_| unreachable!())
        .with_path("/suppliers");
    let orders = Module::new(ModuleId::new(), "Orders")
        .unwrap_or_else(|_| unreachable!())
        .with_path("/orders");
    let suppliers_read = permission("suppliers_read", PermissionAction::Read, Some(&suppliers));
    let suppliers_create = permission("suppliers_create", PermissionAction::Create, Some(&suppliers));
    let orders_delete = permission("orders_delete", PermissionAction::Delete, Some(&orders));
    let role_id = RoleId::new();

    let set = EffectivePermissionSet::merge(
        &[
            role_grant(role_id, &suppliers_read, Some(&suppliers), true),
            role_grant(role_id, &suppliers_create, Some(&suppliers), true),
            role_grant(role_id, &orders_delete, Some(&orders), true),
        ],
        &[],
        Utc::now(),
    );

    assert_eq!(set.modules().len(), 2);
    assert_eq!(set.accessible_modules().len(), 1);
    assert_eq!(set.module_permissions(suppliers.id()).len(), 2);
    assert!(set.module_permissions(ModuleId::new()).is_empty());
}

#[test]
fn empty_name_lists_follow_any_and_all_semantics() {
    let set = EffectivePermissionSet::default();
    let none: [&str; 0] = [];
    assert!(!set.has_any_permission(&none));
    assert!(set.has_all_permissions(&none));
}

#[derive(Debug, Clone)]
struct PermissionCase {
    role_flags: Vec<bool>,
    user_override: Option<(bool, bool)>,
}

fn permission_case() -> impl Strategy<Value = PermissionCase> {
    (
        prop::collection::vec(any::<bool>(), 0..3),
        prop::option::of((any::<bool>(), any::<bool>())),
    )
        .prop_map(|(role_flags, user_override)| PermissionCase {
            role_flags,
            user_override,
        })
}

proptest! {
    #[test]
    fn merge_matches_union_minus_active_revocations(cases in prop::collection::vec(permission_case(), 0..10)) {
        let now = Utc::now();
        let role_ids = [RoleId::new(), RoleId::new(), RoleId::new()];
        let mut role_grants = Vec::new();
        let mut user_overrides = Vec::new();
        let mut expected = BTreeSet::new();

        for (index, case) in cases.iter().enumerate() {
            let name = format!("perm_{index}");
            let value = permission(&name, PermissionAction::Read, None);
            for (role_index, granted) in case.role_flags.iter().enumerate() {
                role_grants.push(role_grant(role_ids[role_index], &value, None, *granted));
            }

            let role_granted = case.role_flags.iter().any(|granted| *granted);
            let included = match case.user_override {
                Some((granted, expired)) => {
                    let mut entry = user_override(&value, None, granted);
                    if expired {
                        entry.expires_at = Some(now - Duration::seconds(1));
                    }
                    user_overrides.push(entry);
                    if expired { role_granted } else { granted }
                }
                None => role_granted,
            };

            if included {
                expected.insert(name);
            }
        }

        let set = EffectivePermissionSet::merge(&role_grants, &user_overrides, now);
        prop_assert_eq!(set.permission_names(), &expected);
    }
}
