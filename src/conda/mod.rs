//! Conda client.
//!
//! Builds conda command lines, runs them through the [`Runtime`], and
//! decodes the `--json` replies.

mod error;
mod manager;
mod types;

use anyhow::Result;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use crate::package::PackageSpec;
use crate::runtime::Runtime;

pub use error::CondaError;
pub use manager::PackageManager;
pub use types::{ActionSet, Actions, InstalledPackage};

#[cfg(test)]
pub use manager::MockPackageManager;

use types::{EnvList, ErrorReply, TransactionReply};

pub struct Conda<R: Runtime> {
    runtime: R,
    executable: PathBuf,
    environment: Option<String>,
    env_args: Vec<String>,
}

impl<R: Runtime> Conda<R> {
    /// Create a client for `environment` (None = the active environment).
    ///
    /// An explicit `executable` must be an existing file. Otherwise
    /// `CONDA_EXE` and then `conda` on PATH are tried.
    pub fn new(
        runtime: R,
        executable: Option<PathBuf>,
        environment: Option<String>,
    ) -> Result<Self, CondaError> {
        let executable = resolve_executable(&runtime, executable)?;
        debug!("Using conda executable {:?}", executable);

        let env_args = match &environment {
            Some(env) => vec![env_option(env).to_string(), env.clone()],
            None => vec![],
        };

        Ok(Self {
            runtime,
            executable,
            environment,
            env_args,
        })
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// `--name`/`--prefix` arguments selecting the environment.
    pub fn env_args(&self) -> &[String] {
        &self.env_args
    }

    /// Run `conda <subcmd> <args...> --json` and decode its reply.
    #[tracing::instrument(skip(self))]
    pub async fn run<T: DeserializeOwned>(&self, subcmd: &str, args: Vec<String>) -> Result<T> {
        let mut cmd_args = Vec::with_capacity(args.len() + 2);
        cmd_args.push(subcmd.to_string());
        cmd_args.extend(args);
        cmd_args.push("--json".to_string());

        let command: Vec<String> = std::iter::once(self.executable.display().to_string())
            .chain(cmd_args.iter().cloned())
            .collect();
        debug!("Running {}", command.join(" "));

        let output = self
            .runtime
            .run_command(&self.executable, cmd_args)
            .await?;

        if !output.success() {
            debug!("Command exited with code {}", output.code);
            let err = match serde_json::from_str::<ErrorReply>(&output.stdout) {
                Ok(reply) => CondaError::CommandFailed {
                    command,
                    message: reply.error,
                    exception_name: reply.exception_name,
                    exception_type: reply.exception_type,
                    stdout: output.stdout,
                    stderr: output.stderr,
                },
                Err(_) => CondaError::UnparsableError {
                    command,
                    code: output.code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                },
            };
            return Err(err.into());
        }

        serde_json::from_str(&output.stdout).map_err(|source| {
            CondaError::UnparsableOutput {
                command,
                stdout: output.stdout,
                stderr: output.stderr,
                source,
            }
            .into()
        })
    }

    /// Paths of all known environments.
    pub async fn list_envs(&self) -> Result<Vec<String>> {
        let reply: EnvList = self.run("env", vec!["list".into()]).await?;
        Ok(reply.envs)
    }

    /// Check whether the configured environment exists.
    ///
    /// The active environment and `base` always exist. A path-like
    /// environment exists if the directory does.
    pub async fn env_exists(&self) -> Result<bool> {
        let Some(env) = self.environment.as_deref() else {
            return Ok(true);
        };
        if env == "base" {
            return Ok(true);
        }
        if is_path_like(env) {
            return Ok(self.runtime.is_dir(std::path::Path::new(env)));
        }

        let envs = self.list_envs().await?;
        Ok(envs
            .iter()
            .any(|e| e.rsplit('/').next() == Some(env)))
    }

    /// Create the configured environment, optionally pinning python.
    pub async fn create_env(&self, python_version: Option<&str>) -> Result<()> {
        let mut args = vec!["--yes".to_string(), "--quiet".to_string()];
        if let Some(v) = python_version {
            args.push(format!("python={}", v));
        }
        args.extend(self.env_args.iter().cloned());

        info!("Creating environment {:?}", self.environment);
        let _: serde_json::Value = self.run("create", args).await?;
        Ok(())
    }

    /// All packages installed in the configured environment.
    pub async fn list_packages(&self) -> Result<Vec<PackageSpec>> {
        let packages: Vec<InstalledPackage> = self.run("list", self.env_args.clone()).await?;
        debug!("Found {} installed package(s)", packages.len());
        Ok(packages.into_iter().map(PackageSpec::from).collect())
    }

    /// Install packages, pinning the version where one is given.
    pub async fn install_packages(
        &self,
        packages: &[PackageSpec],
        channels: &[String],
    ) -> Result<Actions> {
        let specs: Vec<String> = packages.iter().map(|p| p.to_string()).collect();
        info!("Installing {}", specs.join(" "));
        self.run_package_cmd("install", specs, channels).await
    }

    pub async fn remove_packages(&self, names: &[String], channels: &[String]) -> Result<Actions> {
        info!("Removing {}", names.join(" "));
        self.run_package_cmd("remove", names.to_vec(), channels).await
    }

    /// Update packages. With `dry_run`, conda only reports what it would do.
    pub async fn update_packages(
        &self,
        names: &[String],
        channels: &[String],
        dry_run: bool,
    ) -> Result<Actions> {
        info!("Updating {} (dry run: {})", names.join(" "), dry_run);
        let mut args = names.to_vec();
        args.extend(self.env_args.iter().cloned());
        if dry_run {
            args.push("--dry-run".into());
        }
        self.run_transaction("update", args, channels).await
    }

    async fn run_package_cmd(
        &self,
        subcmd: &str,
        mut args: Vec<String>,
        channels: &[String],
    ) -> Result<Actions> {
        args.extend(self.env_args.iter().cloned());
        self.run_transaction(subcmd, args, channels).await
    }

    async fn run_transaction(
        &self,
        subcmd: &str,
        args: Vec<String>,
        channels: &[String],
    ) -> Result<Actions> {
        let mut cmd_args = vec!["--quiet".to_string(), "--yes".to_string()];
        cmd_args.extend(args);
        for channel in channels {
            cmd_args.push("--channel".into());
            cmd_args.push(channel.clone());
        }

        let reply: TransactionReply = self.run(subcmd, cmd_args).await?;
        if let Some(message) = &reply.message {
            debug!("conda: {}", message);
        }
        Ok(reply.actions.unwrap_or_default())
    }
}

fn resolve_executable<R: Runtime>(
    runtime: &R,
    executable: Option<PathBuf>,
) -> Result<PathBuf, CondaError> {
    if let Some(path) = executable {
        if runtime.is_file(&path) {
            return Ok(path);
        }
        return Err(CondaError::InvalidExecutable(path));
    }

    if let Ok(conda_exe) = runtime.env_var("CONDA_EXE") {
        let path = PathBuf::from(conda_exe);
        if runtime.is_file(&path) {
            return Ok(path);
        }
        debug!("Ignoring CONDA_EXE={:?}: not a file", path);
    }

    runtime.which("conda").ok_or(CondaError::ExecutableNotFound)
}

fn is_path_like(env: &str) -> bool {
    env.chars().any(std::path::is_separator)
}

/// `--prefix` for path-like environments, `--name` otherwise.
fn env_option(env: &str) -> &'static str {
    if is_path_like(env) { "--prefix" } else { "--name" }
}
