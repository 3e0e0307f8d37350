//! Role-default permission matrix.
//!
//! Custom grants and denials (see [`PermissionOverride`]) are layered on
//! top of these defaults by the permission engine.
//!
//! | Role        | Defaults |
//! |-------------|----------|
//! | SuperAdmin  | every module, every action |
//! | Admin       | every module, every action except `billing:manage` and `billing:delete` |
//! | Employee    | view dashboard/referrals/customers/reports; create and edit customers |
//! | SalesPerson | view dashboard/referrals/commissions/customers; create referrals and customers |
//! | Customer    | view dashboard/referrals/commissions (own data) |
//!
//! [`PermissionOverride`]: crate::models::permission::PermissionOverride

use std::collections::BTreeSet;

use crate::models::permission::{Action, Module, PermissionKey};
use crate::models::role::Role;

use Action::*;
use Module::*;

const EMPLOYEE: &[(Module, Action)] = &[
    (Dashboard, View),
    (Referrals, View),
    (Customers, View),
    (Customers, Create),
    (Customers, Edit),
    (Reports, View),
];

const SALES_PERSON: &[(Module, Action)] = &[
    (Dashboard, View),
    (Referrals, View),
    (Referrals, Create),
    (Commissions, View),
    (Customers, View),
    (Customers, Create),
];

const CUSTOMER: &[(Module, Action)] = &[(Dashboard, View), (Referrals, View), (Commissions, View)];

const ADMIN_EXCLUDED: &[(Module, Action)] = &[(Billing, Manage), (Billing, Delete)];

fn every_pair() -> impl Iterator<Item = PermissionKey> {
    Module::ALL
        .into_iter()
        .flat_map(|m| Action::ALL.into_iter().map(move |a| PermissionKey::new(m, a)))
}

fn from_table(table: &[(Module, Action)]) -> BTreeSet<PermissionKey> {
    table
        .iter()
        .map(|&(m, a)| PermissionKey::new(m, a))
        .collect()
}

/// Default permission set for `role`.
pub fn role_permissions(role: Role) -> BTreeSet<PermissionKey> {
    match role {
        Role::SuperAdmin => every_pair().collect(),
        Role::Admin => {
            let excluded = from_table(ADMIN_EXCLUDED);
            every_pair().filter(|k| !excluded.contains(k)).collect()
        }
        Role::Employee => from_table(EMPLOYEE),
        Role::SalesPerson => from_table(SALES_PERSON),
        Role::Customer => from_table(CUSTOMER),
    }
}
