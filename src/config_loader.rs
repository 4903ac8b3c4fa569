use crate::config::Config;
use crate::ip::AddressPool;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open config file '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse config file '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub cidr: Option<String>,
}

/// Apply CLI overrides to a configuration
pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(cidr) = &overrides.cidr {
        info!("Overriding pool CIDR {} with {}", config.pool.cidr, cidr);
        config.pool.cidr = cidr.clone();
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

/// Build the address pool described by `config`
pub fn build_pool(config: &Config) -> Result<AddressPool> {
    let options = config.pool.options()?;
    let pool = AddressPool::with_options(&config.pool.cidr, options)
        .wrap_err_with(|| format!("Failed to create address pool for '{}'", config.pool.cidr))?;
    Ok(pool)
}
