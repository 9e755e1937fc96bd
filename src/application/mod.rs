//! Application layer - Use cases that coordinate the package manager.
//!
//! This layer contains the reconciliation flow and orchestrates the data
//! between the CLI layer and the conda client.

mod diff;
mod ensure;

pub use diff::diff;
pub use ensure::{EnsureOptions, EnsureReport, EnsureUseCase, PackageState};
