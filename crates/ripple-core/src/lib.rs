//! Ripple Core: domain models, error taxonomy, role policy and
//! repository traits shared by every other crate.

pub mod error;
pub mod models;
pub mod policy;
pub mod repository;
