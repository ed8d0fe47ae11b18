use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::database::models::Tenant;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&success_json(message, data))?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(output_format: &OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    collection_name: []
                }))?
            );
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Output a list of tenants as a table or a JSON document
pub fn output_tenants(output_format: &OutputFormat, tenants: &[Tenant]) -> anyhow::Result<()> {
    if tenants.is_empty() {
        return output_empty_collection(output_format, "tenants", "No tenants registered");
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "tenants": tenants }))?);
        }
        OutputFormat::Text => {
            print!("{}", tenant_table(tenants));
        }
    }
    Ok(())
}

/// Merge `data` into a `{success, message}` envelope. Non-object data is
/// nested under `data`.
pub fn success_json(message: &str, data: Option<Value>) -> Value {
    let mut response = json!({
        "success": true,
        "message": message
    });

    match data {
        Some(Value::Object(fields)) => {
            if let Value::Object(ref mut map) = response {
                map.extend(fields);
            }
        }
        Some(other) => response["data"] = other,
        None => {}
    }
    response
}

pub fn tenant_table(tenants: &[Tenant]) -> String {
    let mut out = format!("{:<6} {:<24} {:<32} {:<8} {}\n", "ID", "NAME", "DOMAIN", "ACTIVE", "CREATED");
    out.push_str(&"-".repeat(90));
    out.push('\n');

    for tenant in tenants {
        out.push_str(&format!(
            "{:<6} {:<24} {:<32} {:<8} {}\n",
            tenant.id,
            tenant.name,
            tenant.domain,
            if tenant.is_active { "yes" } else { "no" },
            tenant.created_at.format("%Y-%m-%d %H:%M"),
        ));
    }
    out
}
