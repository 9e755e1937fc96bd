//! Package manager seam used by the application layer.

use anyhow::Result;
use async_trait::async_trait;

use super::{Actions, Conda};
use crate::package::PackageSpec;
use crate::runtime::Runtime;

/// Operations the ensure use case needs from a package manager.
///
/// Implemented by [`Conda`]; mocked in use case tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Name or prefix of the managed environment (None = active environment)
    fn environment(&self) -> Option<String>;

    async fn env_exists(&self) -> Result<bool>;

    async fn create_env(&self, python_version: Option<String>) -> Result<()>;

    async fn list_packages(&self) -> Result<Vec<PackageSpec>>;

    async fn install(&self, packages: &[PackageSpec], channels: &[String]) -> Result<Actions>;

    async fn remove(&self, names: &[String], channels: &[String]) -> Result<Actions>;

    async fn update(&self, names: &[String], channels: &[String], dry_run: bool)
    -> Result<Actions>;
}

#[async_trait]
impl<R: Runtime> PackageManager for Conda<R> {
    fn environment(&self) -> Option<String> {
        Conda::environment(self).map(String::from)
    }

    async fn env_exists(&self) -> Result<bool> {
        Conda::env_exists(self).await
    }

    async fn create_env(&self, python_version: Option<String>) -> Result<()> {
        Conda::create_env(self, python_version.as_deref()).await
    }

    async fn list_packages(&self) -> Result<Vec<PackageSpec>> {
        Conda::list_packages(self).await
    }

    async fn install(&self, packages: &[PackageSpec], channels: &[String]) -> Result<Actions> {
        self.install_packages(packages, channels).await
    }

    async fn remove(&self, names: &[String], channels: &[String]) -> Result<Actions> {
        self.remove_packages(names, channels).await
    }

    async fn update(
        &self,
        names: &[String],
        channels: &[String],
        dry_run: bool,
    ) -> Result<Actions> {
        self.update_packages(names, channels, dry_run).await
    }
}
