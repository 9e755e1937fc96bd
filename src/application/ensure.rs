//! Ensure use case - brings an environment to the declared package state.
//!
//! This use case coordinates:
//! - Environment existence check and creation
//! - Reconciliation of declared against installed packages
//! - Install, remove and update transactions
//! - Check mode (report without changing anything)

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;

use crate::conda::{Actions, PackageManager};
use crate::package::{PackageReconciler, PackageSpec};

/// Desired state of the declared packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PackageState {
    /// Installed, at the declared version if one is given
    #[default]
    Present,
    /// Not installed
    Absent,
    /// Installed and updated to the newest available version
    Latest,
}

/// Options for the ensure use case
#[derive(Debug, Clone)]
pub struct EnsureOptions {
    pub state: PackageState,
    /// Compare declared versions against installed ones
    pub check_version: bool,
    /// Report what would change without changing anything
    pub dry_run: bool,
    /// Extra channels for install/remove/update
    pub channels: Vec<String>,
    /// Python version for a newly created environment
    pub python_version: Option<String>,
}

impl Default for EnsureOptions {
    fn default() -> Self {
        Self {
            state: PackageState::Present,
            check_version: true,
            dry_run: false,
            channels: vec![],
            python_version: None,
        }
    }
}

/// Outcome reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsureReport {
    pub changed: bool,
    pub state: PackageState,
    pub environment: Option<String>,
    pub env_created: bool,
    pub installed: Vec<PackageSpec>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub actions: Actions,
    pub dry_run: bool,
}

impl EnsureReport {
    fn new(options: &EnsureOptions, environment: Option<String>) -> Self {
        Self {
            changed: false,
            state: options.state,
            environment,
            env_created: false,
            installed: vec![],
            updated: vec![],
            removed: vec![],
            actions: Actions::default(),
            dry_run: options.dry_run,
        }
    }
}

/// Ensure use case - package state reconciliation over a [`PackageManager`]
pub struct EnsureUseCase<'a, M: PackageManager> {
    manager: &'a M,
}

impl<'a, M: PackageManager> EnsureUseCase<'a, M> {
    pub fn new(manager: &'a M) -> Self {
        Self { manager }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        declared: &[PackageSpec],
        options: &EnsureOptions,
    ) -> Result<EnsureReport> {
        let mut report = EnsureReport::new(options, self.manager.environment());
        let exists = self
            .manager
            .env_exists()
            .await
            .context("Failed to check environment")?;
        debug!("Environment {:?} exists: {}", report.environment, exists);

        match options.state {
            PackageState::Absent => {
                if exists {
                    self.remove_present(declared, options, &mut report).await?;
                } else {
                    info!("Environment {:?} does not exist, nothing to remove", report.environment);
                }
            }
            PackageState::Present | PackageState::Latest => {
                let installed = if exists {
                    self.installed_packages().await?
                } else {
                    self.create_env(options, &mut report).await?;
                    if options.dry_run {
                        packages_of_new_env(options)
                    } else {
                        self.installed_packages().await?
                    }
                };
                self.install_absent(declared, &installed, options, &mut report)
                    .await?;
            }
        }

        Ok(report)
    }

    async fn installed_packages(&self) -> Result<Vec<PackageSpec>> {
        self.manager
            .list_packages()
            .await
            .context("Failed to list installed packages")
    }

    async fn create_env(&self, options: &EnsureOptions, report: &mut EnsureReport) -> Result<()> {
        if !options.dry_run {
            self.manager
                .create_env(options.python_version.clone())
                .await
                .context("Failed to create environment")?;
        }
        report.env_created = true;
        report.changed = true;
        Ok(())
    }

    async fn install_absent(
        &self,
        declared: &[PackageSpec],
        installed: &[PackageSpec],
        options: &EnsureOptions,
        report: &mut EnsureReport,
    ) -> Result<()> {
        // "latest" only cares whether a package is there; update handles versions.
        let check_version = options.state == PackageState::Present && options.check_version;
        let reconciliation = PackageReconciler::partition(declared, installed, check_version);

        if !reconciliation.absent.is_empty() {
            if !options.dry_run {
                let actions = self
                    .manager
                    .install(&reconciliation.absent, &options.channels)
                    .await
                    .context("Failed to install packages")?;
                report.actions.extend(actions);
            }
            report.installed = reconciliation.absent;
            report.changed = true;
        }

        if options.state == PackageState::Latest && !reconciliation.present.is_empty() {
            let names = names_of(&reconciliation.present);
            let actions = self
                .manager
                .update(&names, &options.channels, options.dry_run)
                .await
                .context("Failed to update packages")?;
            if actions.changes_anything() {
                report.updated = names;
                report.changed = true;
            }
            report.actions.extend(actions);
        }

        Ok(())
    }

    async fn remove_present(
        &self,
        declared: &[PackageSpec],
        options: &EnsureOptions,
        report: &mut EnsureReport,
    ) -> Result<()> {
        let installed = self.installed_packages().await?;
        let present =
            PackageReconciler::present_packages(declared, &installed, options.check_version);
        if present.is_empty() {
            return Ok(());
        }

        let names = names_of(&present);
        if !options.dry_run {
            let actions = self
                .manager
                .remove(&names, &options.channels)
                .await
                .context("Failed to remove packages")?;
            report.actions.extend(actions);
        }
        report.removed = names;
        report.changed = true;
        Ok(())
    }
}

/// What a freshly created environment is known to contain.
fn packages_of_new_env(options: &EnsureOptions) -> Vec<PackageSpec> {
    options
        .python_version
        .as_deref()
        .map(|v| vec![PackageSpec::new("python", Some(v))])
        .unwrap_or_default()
}

fn names_of(packages: &[PackageSpec]) -> Vec<String> {
    packages.iter().map(|p| p.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conda::{ActionSet, MockPackageManager};
    use mockall::predicate::eq;
    use serde_json::Value;

    fn pkg(name: &str, version: Option<&str>) -> PackageSpec {
        PackageSpec::new(name, version)
    }

    fn linked(names: &[&str]) -> Actions {
        Actions(vec![ActionSet {
            link: names.iter().map(|n| Value::String(n.to_string())).collect(),
            ..Default::default()
        }])
    }

    fn manager(exists: bool, installed: Vec<PackageSpec>) -> MockPackageManager {
        let mut manager = MockPackageManager::new();
        manager
            .expect_environment()
            .return_const(Some("work".to_string()));
        manager.expect_env_exists().returning(move || Ok(exists));
        manager
            .expect_list_packages()
            .returning(move || Ok(installed.clone()));
        manager
    }

    fn options(state: PackageState) -> EnsureOptions {
        EnsureOptions {
            state,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_present_installs_only_absent_packages() {
        let mut manager = manager(
            true,
            vec![pkg("numpy", Some("1.26.4")), pkg("python", Some("3.11.7"))],
        );
        manager
            .expect_install()
            .withf(|packages, channels| {
                packages.iter().map(|p| p.to_string()).collect::<Vec<_>>()
                    == ["numpy=1.25", "scipy"]
                    && channels.is_empty()
            })
            .times(1)
            .returning(|_, _| Ok(linked(&["numpy", "scipy"])));

        let declared = vec![
            pkg("python", Some("3.11")),
            pkg("numpy", Some("1.25")),
            pkg("scipy", None),
        ];
        let report = EnsureUseCase::new(&manager)
            .execute(&declared, &options(PackageState::Present))
            .await
            .unwrap();

        assert!(report.changed);
        assert!(!report.env_created);
        assert_eq!(report.environment.as_deref(), Some("work"));
        assert_eq!(report.installed, vec![pkg("numpy", Some("1.25")), pkg("scipy", None)]);
        assert!(report.actions.changes_anything());
    }

    #[tokio::test]
    async fn test_present_without_version_check() {
        let mut manager = manager(true, vec![pkg("numpy", Some("1.26.4"))]);
        manager.expect_install().never();

        let opts = EnsureOptions {
            check_version: false,
            ..Default::default()
        };
        let report = EnsureUseCase::new(&manager)
            .execute(&[pkg("numpy", Some("1.25"))], &opts)
            .await
            .unwrap();

        assert!(!report.changed);
        assert!(report.installed.is_empty());
    }

    #[tokio::test]
    async fn test_present_already_satisfied() {
        let mut manager = manager(true, vec![pkg("numpy", Some("1.26.4"))]);
        manager.expect_install().never();
        manager.expect_create_env().never();

        let report = EnsureUseCase::new(&manager)
            .execute(&[pkg("numpy", Some("1.26"))], &options(PackageState::Present))
            .await
            .unwrap();

        assert!(!report.changed);
        assert_eq!(report.actions, Actions::default());
    }

    #[tokio::test]
    async fn test_present_creates_missing_environment() {
        let mut manager = manager(false, vec![pkg("python", Some("3.11.7"))]);
        manager
            .expect_create_env()
            .with(eq(Some("3.11".to_string())))
            .times(1)
            .returning(|_| Ok(()));
        manager
            .expect_install()
            .withf(|packages, _| packages.len() == 1 && packages[0].name == "numpy")
            .times(1)
            .returning(|_, _| Ok(linked(&["numpy"])));

        let opts = EnsureOptions {
            python_version: Some("3.11".into()),
            ..Default::default()
        };
        let report = EnsureUseCase::new(&manager)
            .execute(&[pkg("python", None), pkg("numpy", None)], &opts)
            .await
            .unwrap();

        assert!(report.changed);
        assert!(report.env_created);
        assert_eq!(report.installed, vec![pkg("numpy", None)]);
    }

    #[tokio::test]
    async fn test_present_creates_environment_for_empty_declaration() {
        let mut manager = manager(false, vec![]);
        manager
            .expect_create_env()
            .times(1)
            .returning(|_| Ok(()));
        manager.expect_install().never();

        let report = EnsureUseCase::new(&manager)
            .execute(&[], &options(PackageState::Present))
            .await
            .unwrap();

        assert!(report.changed);
        assert!(report.env_created);
    }

    #[tokio::test]
    async fn test_present_dry_run_changes_nothing() {
        let mut manager = MockPackageManager::new();
        manager.expect_environment().return_const(None::<String>);
        manager.expect_env_exists().returning(|| Ok(false));
        manager.expect_list_packages().never();
        manager.expect_create_env().never();
        manager.expect_install().never();

        let opts = EnsureOptions {
            dry_run: true,
            ..Default::default()
        };
        let declared = vec![pkg("numpy", None), pkg("scipy", Some("1.11"))];
        let report = EnsureUseCase::new(&manager)
            .execute(&declared, &opts)
            .await
            .unwrap();

        assert!(report.changed);
        assert!(report.dry_run);
        assert!(report.env_created);
        assert_eq!(report.installed, declared);
    }

    #[tokio::test]
    async fn test_present_dry_run_counts_python_of_new_environment() {
        let mut manager = MockPackageManager::new();
        manager
            .expect_environment()
            .return_const(Some("fresh".to_string()));
        manager.expect_env_exists().returning(|| Ok(false));
        manager.expect_list_packages().never();
        manager.expect_create_env().never();
        manager.expect_install().never();

        let opts = EnsureOptions {
            dry_run: true,
            python_version: Some("3.11".into()),
            ..Default::default()
        };
        let declared = vec![
            pkg("python", Some("3.11")),
            pkg("numpy", None),
            pkg("pip", None),
        ];
        let report = EnsureUseCase::new(&manager)
            .execute(&declared, &opts)
            .await
            .unwrap();

        assert!(report.env_created);
        assert_eq!(report.installed, vec![pkg("numpy", None), pkg("pip", None)]);

        // A more specific python than the one the environment is created with
        // still has to be installed.
        let declared = vec![pkg("python", Some("3.11.4"))];
        let report = EnsureUseCase::new(&manager)
            .execute(&declared, &opts)
            .await
            .unwrap();
        assert_eq!(report.installed, declared);
    }

    #[tokio::test]
    async fn test_absent_removes_only_present_packages() {
        let mut manager = manager(
            true,
            vec![pkg("numpy", Some("1.26.4")), pkg("scipy", Some("1.11.4"))],
        );
        manager
            .expect_remove()
            .withf(|names, channels| names == ["scipy"] && channels == ["conda-forge"])
            .times(1)
            .returning(|_, _| Ok(Actions::default()));

        let opts = EnsureOptions {
            state: PackageState::Absent,
            check_version: false,
            channels: vec!["conda-forge".into()],
            ..Default::default()
        };
        let report = EnsureUseCase::new(&manager)
            .execute(&[pkg("pandas", None), pkg("scipy", Some("1.0"))], &opts)
            .await
            .unwrap();

        assert!(report.changed);
        assert_eq!(report.removed, vec!["scipy".to_string()]);
    }

    #[tokio::test]
    async fn test_absent_version_check_keeps_other_versions() {
        let mut manager = manager(true, vec![pkg("numpy", Some("1.26.4"))]);
        manager.expect_remove().never();

        let report = EnsureUseCase::new(&manager)
            .execute(&[pkg("numpy", Some("1.25"))], &options(PackageState::Absent))
            .await
            .unwrap();

        assert!(!report.changed);
        assert!(report.removed.is_empty());
    }

    #[tokio::test]
    async fn test_absent_missing_environment_is_noop() {
        let mut manager = MockPackageManager::new();
        manager
            .expect_environment()
            .return_const(Some("gone".to_string()));
        manager.expect_env_exists().returning(|| Ok(false));
        manager.expect_list_packages().never();
        manager.expect_remove().never();

        let report = EnsureUseCase::new(&manager)
            .execute(&[pkg("numpy", None)], &options(PackageState::Absent))
            .await
            .unwrap();

        assert!(!report.changed);
    }

    #[tokio::test]
    async fn test_absent_dry_run() {
        let mut manager = manager(true, vec![pkg("numpy", Some("1.26.4"))]);
        manager.expect_remove().never();

        let opts = EnsureOptions {
            state: PackageState::Absent,
            dry_run: true,
            ..Default::default()
        };
        let report = EnsureUseCase::new(&manager)
            .execute(&[pkg("numpy", None)], &opts)
            .await
            .unwrap();

        assert!(report.changed);
        assert_eq!(report.removed, vec!["numpy".to_string()]);
    }

    #[tokio::test]
    async fn test_latest_installs_absent_and_updates_present() {
        let mut manager = manager(true, vec![pkg("numpy", Some("1.26.4"))]);
        manager
            .expect_install()
            .withf(|packages, _| packages.len() == 1 && packages[0].name == "scipy")
            .times(1)
            .returning(|_, _| Ok(linked(&["scipy"])));
        manager
            .expect_update()
            .withf(|names, _, dry_run| names == ["numpy"] && !*dry_run)
            .times(1)
            .returning(|_, _, _| Ok(linked(&["numpy-2.0.0"])));

        // An installed package counts as present for "latest" whatever its version.
        let declared = vec![pkg("numpy", Some("2.0")), pkg("scipy", None)];
        let report = EnsureUseCase::new(&manager)
            .execute(&declared, &options(PackageState::Latest))
            .await
            .unwrap();

        assert!(report.changed);
        assert_eq!(report.installed, vec![pkg("scipy", None)]);
        assert_eq!(report.updated, vec!["numpy".to_string()]);
        assert_eq!(report.actions.0.len(), 2);
    }

    #[tokio::test]
    async fn test_latest_up_to_date() {
        let mut manager = manager(true, vec![pkg("numpy", Some("2.0.0"))]);
        manager
            .expect_update()
            .times(1)
            .returning(|_, _, _| Ok(Actions::default()));

        let report = EnsureUseCase::new(&manager)
            .execute(&[pkg("numpy", None)], &options(PackageState::Latest))
            .await
            .unwrap();

        assert!(!report.changed);
        assert!(report.updated.is_empty());
    }

    #[tokio::test]
    async fn test_latest_dry_run_asks_conda() {
        let mut manager = manager(true, vec![pkg("numpy", Some("1.26.4"))]);
        manager.expect_install().never();
        manager
            .expect_update()
            .withf(|_, _, dry_run| *dry_run)
            .times(1)
            .returning(|_, _, _| Ok(linked(&["numpy-2.0.0"])));

        let opts = EnsureOptions {
            state: PackageState::Latest,
            dry_run: true,
            ..Default::default()
        };
        let report = EnsureUseCase::new(&manager)
            .execute(&[pkg("numpy", None), pkg("scipy", None)], &opts)
            .await
            .unwrap();

        assert!(report.changed);
        assert_eq!(report.installed, vec![pkg("scipy", None)]);
        assert_eq!(report.updated, vec!["numpy".to_string()]);
    }

    #[tokio::test]
    async fn test_list_failure_is_reported() {
        let mut manager = MockPackageManager::new();
        manager.expect_environment().return_const(None::<String>);
        manager.expect_env_exists().returning(|| Ok(true));
        manager
            .expect_list_packages()
            .returning(|| Err(anyhow::anyhow!("conda exploded")));

        let err = EnsureUseCase::new(&manager)
            .execute(&[pkg("numpy", None)], &options(PackageState::Present))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to list installed packages");
        assert!(format!("{:#}", err).contains("conda exploded"));
    }

    #[test]
    fn test_report_serializes_for_host() {
        let report = EnsureReport::new(&options(PackageState::Latest), Some("work".into()));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "latest");
        assert_eq!(json["changed"], false);
        assert_eq!(json["environment"], "work");
        assert_eq!(json["actions"], serde_json::json!([]));
    }
}
