use anyhow::Result;

use crudbench_config::BenchConfig;

/// Print the effective configuration, all layers applied
pub fn execute(config: &BenchConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
