//! Package module
//!
//! This module provides the package specifier type and the reconciliation
//! of declared packages against installed ones.

mod reconcile;
mod spec;

pub use reconcile::{PackageReconciler, Reconciliation};
pub use spec::{InvalidSpecifierError, PackageSpec, split_name_version};
