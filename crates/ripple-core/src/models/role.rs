//! Platform roles.
//!
//! Administrative rank is a partial order:
//! `SuperAdmin > Admin > {Employee, SalesPerson, Customer}`. The last
//! three are peers and never outrank one another.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    Employee,
    SalesPerson,
    Customer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Employee,
        Role::SalesPerson,
        Role::Customer,
    ];

    /// Parse role from string (case-insensitive, `_`/`-` tolerant).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "super_admin" | "superadmin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "employee" => Some(Self::Employee),
            "sales_person" | "salesperson" => Some(Self::SalesPerson),
            "customer" => Some(Self::Customer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Admin => "ADMIN",
            Self::Employee => "EMPLOYEE",
            Self::SalesPerson => "SALES_PERSON",
            Self::Customer => "CUSTOMER",
        }
    }

    /// Administrative rank; peers share a rank.
    fn rank(&self) -> u8 {
        match self {
            Self::SuperAdmin => 2,
            Self::Admin => 1,
            Self::Employee | Self::SalesPerson | Self::Customer => 0,
        }
    }

    /// True if this role strictly outranks `other`.
    pub fn outranks(&self, other: Role) -> bool {
        self.rank() > other.rank()
    }

    /// Admin or super admin.
    pub fn is_administrative(&self) -> bool {
        self.rank() >= Self::Admin.rank()
    }

    /// Roles that may hold a public referral link.
    pub fn is_referral_eligible(&self) -> bool {
        matches!(self, Self::Customer | Self::SalesPerson | Self::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
