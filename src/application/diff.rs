//! Diff action - reconciles declared packages without changing anything.

use anyhow::{Context, Result};

use crate::conda::PackageManager;
use crate::package::{PackageReconciler, PackageSpec, Reconciliation};

/// Partition `declared` against the environment's installed packages.
///
/// A missing environment has nothing installed.
pub async fn diff<M: PackageManager>(
    manager: &M,
    declared: &[PackageSpec],
    check_version: bool,
) -> Result<Reconciliation> {
    let exists = manager
        .env_exists()
        .await
        .context("Failed to check environment")?;
    let installed = if exists {
        manager
            .list_packages()
            .await
            .context("Failed to list installed packages")?
    } else {
        vec![]
    };
    Ok(PackageReconciler::partition(declared, &installed, check_version))
}
