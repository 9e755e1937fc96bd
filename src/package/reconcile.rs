//! Package reconciliation.
//!
//! Compares declared packages against the packages reported installed,
//! optionally down to the version granularity the declaration asks for.

use serde::Serialize;

use super::PackageSpec;

/// Declared packages split by whether the installed set satisfies them.
///
/// Both lists keep the declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub absent: Vec<PackageSpec>,
    pub present: Vec<PackageSpec>,
}

/// Package reconciler - pure functions over declared and installed packages.
///
/// All methods are stateless and operate on slices of packages.
pub struct PackageReconciler;

impl PackageReconciler {
    /// Check whether `declared` is satisfied by the installed packages.
    ///
    /// The first installed package with the same name is authoritative.
    /// With `check_version`, the declared version must equal the installed
    /// version truncated to the same number of components, so "3.10"
    /// matches "3.10.2" but "3.10.2" does not match "3.10".
    pub fn is_satisfied(
        declared: &PackageSpec,
        installed: &[PackageSpec],
        check_version: bool,
    ) -> bool {
        let Some(found) = installed.iter().find(|p| p.name == declared.name) else {
            return false;
        };

        if !check_version {
            return true;
        }

        match declared.requested_version() {
            None => true,
            Some(wanted) => found
                .version
                .as_deref()
                .is_some_and(|have| Self::prefix_matches(wanted, have)),
        }
    }

    /// Declared packages that are not satisfied, in declared order.
    pub fn absent_packages(
        declared: &[PackageSpec],
        installed: &[PackageSpec],
        check_version: bool,
    ) -> Vec<PackageSpec> {
        declared
            .iter()
            .filter(|p| !Self::is_satisfied(p, installed, check_version))
            .cloned()
            .collect()
    }

    /// Declared packages that are satisfied, in declared order.
    pub fn present_packages(
        declared: &[PackageSpec],
        installed: &[PackageSpec],
        check_version: bool,
    ) -> Vec<PackageSpec> {
        declared
            .iter()
            .filter(|p| Self::is_satisfied(p, installed, check_version))
            .cloned()
            .collect()
    }

    /// Split declared packages into absent and present in one pass.
    pub fn partition(
        declared: &[PackageSpec],
        installed: &[PackageSpec],
        check_version: bool,
    ) -> Reconciliation {
        let (present, absent): (Vec<_>, Vec<_>) = declared
            .iter()
            .cloned()
            .partition(|p| Self::is_satisfied(p, installed, check_version));
        Reconciliation { absent, present }
    }

    /// Component-wise string comparison of `wanted` against the leading
    /// components of `have`.
    fn prefix_matches(wanted: &str, have: &str) -> bool {
        let wanted: Vec<&str> = wanted.split('.').collect();
        let have: Vec<&str> = have.split('.').collect();
        wanted.len() <= have.len() && have[..wanted.len()] == wanted[..]
    }
}
