use std::path::Path;

use serde::Serialize;
use wingtip_core::WingtipConfig;

use super::{Context, OutputFormat, print_json};

pub fn init(config_path: &Path, data_dir: &Path, region: &str, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    let config = WingtipConfig::scaffold(data_dir, region);
    config.validate()?;
    std::fs::write(config_path, config.to_toml_string()?)?;
    println!("✓ Generated {}", config_path.display());
    Ok(())
}

#[derive(Serialize)]
struct SeedReport {
    name: String,
    key: i32,
    registered: bool,
    created: bool,
    error: Option<String>,
}

pub fn bootstrap(ctx: &Context, format: OutputFormat) -> anyhow::Result<()> {
    let results = ctx.registrar()?.register_all(&ctx.config.tenants);
    let reports: Vec<SeedReport> = results
        .into_iter()
        .map(|seed| SeedReport {
            name: seed.name,
            key: seed.key.value(),
            registered: seed.result.is_ok(),
            created: seed.result.as_ref().is_ok_and(|r| !r.is_noop()),
            error: seed.result.err().map(|e| e.to_string()),
        })
        .collect();
    let failed = reports.iter().filter(|r| !r.registered).count();

    match format {
        OutputFormat::Json => print_json(&reports)?,
        OutputFormat::Text => {
            for report in &reports {
                match (&report.error, report.created) {
                    (Some(e), _) => println!("✗ {} ({}): {e}", report.name, report.key),
                    (None, true) => println!("✓ {} ({}) registered", report.name, report.key),
                    (None, false) => println!("· {} ({}) already registered", report.name, report.key),
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} tenants failed to register", reports.len());
    }
    Ok(())
}
