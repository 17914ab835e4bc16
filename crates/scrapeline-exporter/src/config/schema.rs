use std::net::SocketAddr;

use serde::Deserialize;

use crate::error::{ExporterError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub version: u32,

    #[serde(default)]
    pub exporter: ExporterSection,

    #[serde(default)]
    pub process: ProcessSection,
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ExporterError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.exporter.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_registry_name")]
    pub registry_name: String,

    #[serde(default = "default_process_metrics")]
    pub process_metrics: bool,
}

impl Default for ExporterSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            registry_name: default_registry_name(),
            process_metrics: default_process_metrics(),
        }
    }
}

impl ExporterSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if self.registry_name.trim().is_empty() {
            return Err(ExporterError::Config(
                "exporter.registry_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            ExporterError::Config(format!(
                "exporter.listen must be a valid SocketAddr ({}): {e}",
                self.listen
            ))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:9100".into()
}
fn default_registry_name() -> String {
    "default".into()
}
fn default_process_metrics() -> bool {
    true
}

/// Procfs locations; `None` means the live process files.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProcessSection {
    #[serde(default)]
    pub limits_path: Option<String>,
    #[serde(default)]
    pub stat_path: Option<String>,
    #[serde(default)]
    pub fd_dir: Option<String>,
    #[serde(default)]
    pub boot_stat_path: Option<String>,
}
