use wingtip_routing::{RouteOutcome, RoutingError};

use super::{Context, OutputFormat, TrustArg, print_json};

pub fn route(ctx: &Context, tenant: &str, format: OutputFormat) -> anyhow::Result<()> {
    let router = ctx.router()?;
    let outcome = match router.route(tenant) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(tenant, error = %e, "routing failed");
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => match &outcome {
            RouteOutcome::Connect(target) => {
                println!("✓ Serve from {} (region {})", target.data_source, router.region());
                println!("  Database: {}", target.database);
                println!("  Key:      {}", target.key);
            }
            RouteOutcome::Offline { tenant } => println!("● {tenant} is offline"),
            RouteOutcome::Redirect { region: Some(region), url } => {
                println!("→ Redirect to {region}: {url}")
            }
            RouteOutcome::Redirect { region: None, url } => {
                println!("→ Redirect to fallback: {url}")
            }
        },
    }
    Ok(())
}

pub fn resolve(ctx: &Context, name: &str, trust: TrustArg, format: OutputFormat) -> anyhow::Result<()> {
    let tenant = ctx.tenant(name)?;
    let resolution = match ctx.resolver().resolve(tenant.key, trust.into()) {
        Ok(resolution) => resolution,
        Err(e @ RoutingError::ConflictingLocalClaims { .. }) => {
            eprintln!("Cannot resolve automatically; retry with --trust global.");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Json => print_json(&resolution)?,
        OutputFormat::Text => {
            if resolution.is_clean() {
                println!("✓ {} is consistent", tenant.name);
            } else {
                println!("✓ Repaired {} ({:?})", tenant.name, resolution.strategy);
            }
            match &resolution.mapping {
                Some(m) => println!("  Mapping: {} ({:?})", m.location.table_key(), m.status),
                None => println!("  Mapping: (unmapped)"),
            }
            for shard in &resolution.local_written {
                println!("  Wrote local view on {shard}");
            }
            for shard in &resolution.local_removed {
                println!("  Removed stale claim on {shard}");
            }
            for shard in &resolution.skipped {
                println!("  Skipped unreachable {shard}");
            }
        }
    }
    Ok(())
}
