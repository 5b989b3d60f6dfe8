//! Tenant/workspace scoping and layered configuration.
//!
//! Every persistent write and metric label is composed from the
//! `(tenant, workspace)` pair bound by [`context::with_tenant`]. Absence of
//! a binding on a storage or metric path is a fail-closed error, never a
//! silent default.

pub mod config;
pub mod context;

pub use config::{Config, ConfigError};
pub use context::{current, with_tenant, TenantContext};
