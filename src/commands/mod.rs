use anyhow::Result;
use log::debug;
use serde_json::{Value, json};

use crate::{
    application::{self, EnsureOptions, EnsureReport, EnsureUseCase},
    conda::CondaError,
    package::{PackageSpec, Reconciliation, split_name_version},
    runtime::Runtime,
};

pub mod config;

use config::Config;

/// Bring the environment to the requested package state and report it.
#[tracing::instrument(skip(config))]
pub async fn ensure<R: Runtime>(
    config: Config<R>,
    specs: &[String],
    options: EnsureOptions,
) -> Result<()> {
    let declared = parse_specs(specs)?;
    let report = EnsureUseCase::new(&config.conda)
        .execute(&declared, &options)
        .await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }
    Ok(())
}

/// List installed packages
#[tracing::instrument(skip(config))]
pub async fn list<R: Runtime>(config: Config<R>) -> Result<()> {
    let packages = config.conda.list_packages().await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }
    if packages.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }
    for package in packages {
        println!(
            "{} {}",
            package.name,
            package.version.as_deref().unwrap_or("(unknown)")
        );
    }
    Ok(())
}

/// List conda environments
#[tracing::instrument(skip(config))]
pub async fn envs<R: Runtime>(config: Config<R>) -> Result<()> {
    let envs = config.conda.list_envs().await?;
    debug!("Found {} environment(s)", envs.len());

    if config.json {
        println!("{}", serde_json::to_string_pretty(&envs)?);
    } else {
        for env in envs {
            println!("{}", env);
        }
    }
    Ok(())
}

/// Show which declared packages are absent and which are present
#[tracing::instrument(skip(config))]
pub async fn diff<R: Runtime>(config: Config<R>, specs: &[String], check_version: bool) -> Result<()> {
    let declared = parse_specs(specs)?;
    let result = application::diff(&config.conda, &declared, check_version).await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", format_diff(&result));
    }
    Ok(())
}

fn parse_specs(specs: &[String]) -> Result<Vec<PackageSpec>> {
    specs
        .iter()
        .map(|s| split_name_version(s, None).map_err(Into::into))
        .collect()
}

fn format_report(report: &EnsureReport) -> String {
    let mut out = String::new();
    let prefix = if report.dry_run { "would " } else { "" };

    if report.env_created {
        out.push_str(&format!(
            "{}create environment {}\n",
            prefix,
            report.environment.as_deref().unwrap_or("(active)")
        ));
    }
    for package in &report.installed {
        out.push_str(&format!("{}install {}\n", prefix, package));
    }
    for name in &report.updated {
        out.push_str(&format!("{}update {}\n", prefix, name));
    }
    for name in &report.removed {
        out.push_str(&format!("{}remove {}\n", prefix, name));
    }
    out.push_str(if report.changed { "changed\n" } else { "unchanged\n" });
    out
}

fn format_diff(result: &Reconciliation) -> String {
    let mut out = String::new();
    for package in &result.absent {
        out.push_str(&format!("absent  {}\n", package));
    }
    for package in &result.present {
        out.push_str(&format!("present {}\n", package));
    }
    out
}

/// Failure description for machine-readable output.
///
/// Conda failures carry the command line and conda's own output.
pub fn failure_json(err: &anyhow::Error) -> Value {
    let mut out = json!({
        "failed": true,
        "msg": format!("{:#}", err),
    });

    let Some(conda_err) = err.chain().find_map(|e| e.downcast_ref::<CondaError>()) else {
        return out;
    };
    if let Some(command) = conda_err.command() {
        out["command"] = json!(command);
    }
    match conda_err {
        CondaError::CommandFailed {
            exception_name,
            exception_type,
            stdout,
            stderr,
            ..
        } => {
            out["exception_name"] = json!(exception_name);
            out["exception_type"] = json!(exception_type);
            out["stdout"] = json!(stdout);
            out["stderr"] = json!(stderr);
        }
        CondaError::UnparsableError {
            code,
            stdout,
            stderr,
            ..
        } => {
            out["rc"] = json!(code);
            out["stdout"] = json!(stdout);
            out["stderr"] = json!(stderr);
        }
        CondaError::UnparsableOutput { stdout, stderr, .. } => {
            out["stdout"] = json!(stdout);
            out["stderr"] = json!(stderr);
        }
        CondaError::ExecutableNotFound | CondaError::InvalidExecutable(_) => {}
    }
    out
}
