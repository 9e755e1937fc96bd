use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;

use crate::{conda::Conda, runtime::Runtime};

pub struct Config<R: Runtime> {
    pub conda: Conda<R>,
    /// Print machine-readable JSON instead of text
    pub json: bool,
}

impl<R: Runtime> Config<R> {
    pub fn new(
        runtime: R,
        executable: Option<PathBuf>,
        environment: Option<String>,
        json: bool,
    ) -> Result<Self> {
        let environment = environment.filter(|e| !e.is_empty());
        debug!(
            "Configuring conda client: executable={:?} environment={:?}",
            executable, environment
        );

        let conda = Conda::new(runtime, executable, environment)
            .context("Failed to locate conda")?;

        Ok(Self { conda, json })
    }
}
