//! Domain models for Ripple.
//!
//! These are the core types shared across all crates.

pub mod identity;
pub mod invite;
pub mod magic_link;
pub mod permission;
pub mod referral;
pub mod role;
pub mod session;
pub mod tenant;
pub mod user;
