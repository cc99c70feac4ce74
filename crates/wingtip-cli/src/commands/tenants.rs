use serde::Serialize;
use wingtip_catalog::{MappingStatus, PointMapping, RecoveryState};
use wingtip_core::{TenantKey, normalize_tenant_name};

use super::{Context, OutputFormat, StatusArg, print_json};

pub fn register(
    ctx: &Context,
    name: &str,
    server: Option<&str>,
    plan: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let key = TenantKey::derive(name);
    let server = server.unwrap_or(&ctx.config.tenant_server.server);
    let plan = plan.unwrap_or(&ctx.config.catalog.service_plan);
    let outcome = ctx
        .registrar()?
        .try_register(name, key, server, ctx.config.database.port, plan)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "name": name,
            "key": key,
            "mapping_created": outcome.mapping_created,
            "tenant_created": outcome.tenant_created,
        }))?,
        OutputFormat::Text if outcome.is_noop() => println!("· {name} ({key}) already registered"),
        OutputFormat::Text => println!("✓ Registered {name} ({key}) on {server}"),
    }
    Ok(())
}

pub fn list(ctx: &Context, format: OutputFormat) -> anyhow::Result<()> {
    let tenants = ctx.directory().get_all_tenants()?;
    match format {
        OutputFormat::Json => print_json(&tenants)?,
        OutputFormat::Text => {
            if tenants.is_empty() {
                println!("No tenants registered.");
            }
            for tenant in &tenants {
                println!(
                    "{:>12}  {:<32} {:<10} {}",
                    tenant.key.value(),
                    tenant.name,
                    tenant.service_plan,
                    tenant.alias
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct TenantStatus {
    name: String,
    key: TenantKey,
    status: MappingStatus,
    recovery_state: RecoveryState,
    mapping: Option<PointMapping>,
}

pub fn status(ctx: &Context, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let tenant = ctx.tenant(name)?;
    let directory = ctx.directory();
    let report = TenantStatus {
        status: directory.get_mapping_status(tenant.key)?,
        mapping: directory.get_mapping(tenant.key)?,
        name: tenant.name,
        key: tenant.key,
        recovery_state: tenant.recovery_state,
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!("Tenant:   {} ({})", report.name, report.key);
            println!("Status:   {:?}", report.status);
            println!("Recovery: {:?}", report.recovery_state);
            match &report.mapping {
                Some(m) => println!("Shard:    {}", m.location.table_key()),
                None => println!("Shard:    (unmapped)"),
            }
        }
    }
    Ok(())
}

pub fn set_status(
    ctx: &Context,
    name: &str,
    status: StatusArg,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let tenant = ctx.tenant(name)?;
    let mapping = ctx
        .registrar()?
        .set_mapping_status(tenant.key, status.into())?;
    match format {
        OutputFormat::Json => print_json(&mapping)?,
        OutputFormat::Text => println!("✓ {} is now {:?}", tenant.name, mapping.status),
    }
    Ok(())
}

pub fn key(name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let key = TenantKey::derive(name);
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "name": name,
            "normalized": normalize_tenant_name(name),
            "key": key,
            "hex": key.to_hex(),
        }))?,
        OutputFormat::Text => println!("{key} ({})", key.to_hex()),
    }
    Ok(())
}
