//! Run configuration.
//!
//! Every section is optional in TOML; missing fields take their defaults.
//!
//! ```toml
//! [printer]
//! profile = "tsp650ii"
//! device = "/dev/rfcomm0"
//!
//! [canvas]
//! width = 576
//! height_policy = "computed"   # or { fixed = 1200 }
//!
//! [composer]
//! qr_error_level = "M"
//! currency = "€"
//!
//! [dispatch]
//! inter_print_delay_ms = 500
//! retry_budget = 1
//! on_hardware_error = "halt"
//!
//! [footers]
//! default = ["Thanks for coming!"]
//! every = 1
//!
//! [footers.named]
//! vip = ["VIP ACCESS", "Gate B"]
//! ```

mod loader;
mod validate;

pub use loader::{load_config, load_config_from_str};
pub use validate::validate_config;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::DispatchConfig;
use crate::layout::{ComposerConfig, FooterCatalog, FooterFragment};
use crate::printer::{DEFAULT_DEVICE, PrinterProfile};
use crate::render::CanvasConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Everything a run needs besides the tickets themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub printer: PrinterSection,
    pub canvas: CanvasConfig,
    pub composer: ComposerConfig,
    pub dispatch: DispatchConfig,
    pub footers: FooterConfig,
}

impl RunConfig {
    /// Parse and validate a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config = load_config_from_str(toml_str)?;
        validate_config(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config(self)
    }

    /// The configured hardware profile.
    pub fn profile(&self) -> Result<PrinterProfile, ConfigError> {
        PrinterProfile::by_name(&self.printer.profile).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "unknown printer profile '{}'",
                self.printer.profile
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterSection {
    /// Built-in profile name (`tsp650ii`, `sm-l200`).
    pub profile: String,
    pub device: String,
}

impl Default for PrinterSection {
    fn default() -> Self {
        Self {
            profile: "tsp650ii".to_string(),
            device: DEFAULT_DEVICE.to_string(),
        }
    }
}

/// Footer text blocks. The first line of each block prints bold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FooterConfig {
    pub named: BTreeMap<String, Vec<String>>,
    pub default: Option<Vec<String>>,
    /// Apply the default footer to every Nth ticket.
    pub every: usize,
}

impl Default for FooterConfig {
    fn default() -> Self {
        Self {
            named: BTreeMap::new(),
            default: None,
            every: 1,
        }
    }
}

impl FooterConfig {
    pub fn to_catalog(&self) -> FooterCatalog {
        let mut catalog = FooterCatalog::new();
        for (key, lines) in &self.named {
            catalog = catalog.named(key.clone(), fragment(lines));
        }
        if let Some(lines) = &self.default {
            catalog = catalog.default_every(fragment(lines), self.every);
        }
        catalog
    }
}

fn fragment(lines: &[String]) -> FooterFragment {
    let mut fragment = FooterFragment::new().rule();
    for (i, line) in lines.iter().enumerate() {
        fragment = if i == 0 {
            fragment.bold_text(line)
        } else {
            fragment.text(line)
        };
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FooterProvider;
    use crate::ticket::TicketRecord;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.printer.profile, "tsp650ii");
        assert_eq!(config.printer.device, "/dev/rfcomm0");
        assert_eq!(config.dispatch.retry_budget, 1);
        assert_eq!(config.profile().unwrap(), PrinterProfile::TSP650II);
    }

    #[test]
    fn test_footer_catalog_from_config() {
        let config = RunConfig::from_toml(
            r#"
[footers]
default = ["Thanks!"]
every = 2

[footers.named]
vip = ["VIP ACCESS", "Gate B"]
"#,
        )
        .unwrap();
        let catalog = config.footers.to_catalog();

        let vip = TicketRecord::new("1", "p").footer("vip");
        let footer = catalog.footer_for(0, &vip).unwrap().unwrap();
        // rule + two lines
        assert_eq!(footer.ops().len(), 3);

        let plain = TicketRecord::new("2", "p");
        assert!(catalog.footer_for(0, &plain).unwrap().is_none());
        assert!(catalog.footer_for(1, &plain).unwrap().is_some());
    }
}
