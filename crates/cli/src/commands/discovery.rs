//! Namespace and service listing

use anyhow::Result;
use forward_lib::ForwardService;
use tabled::Tabled;

use crate::output::{color_environment, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct NamespaceRow {
    #[tabled(rename = "Namespace")]
    name: String,
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Service")]
    name: String,
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
}

pub async fn list_namespaces(service: &ForwardService, format: OutputFormat) -> Result<()> {
    let listing = service.list_namespaces().await?;

    match format {
        OutputFormat::Json => print_json(&listing)?,
        OutputFormat::Table => {
            let rows: Vec<NamespaceRow> = listing
                .namespaces
                .iter()
                .map(|name| NamespaceRow { name: name.clone() })
                .collect();
            print_table(&rows, "No namespaces found");
        }
    }
    Ok(())
}

pub async fn list_services(
    service: &ForwardService,
    namespace: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let listing = service.list_services(namespace).await?;

    match format {
        OutputFormat::Json => print_json(&listing)?,
        OutputFormat::Table => {
            // One row per binding; the name is only shown on the first
            let rows: Vec<ServiceRow> = listing
                .services
                .iter()
                .flat_map(|(name, bindings)| {
                    bindings.iter().enumerate().map(move |(i, binding)| ServiceRow {
                        name: if i == 0 { name.clone() } else { String::new() },
                        environment: color_environment(binding.environment.as_str()),
                        namespace: binding.namespace.clone(),
                    })
                })
                .collect();
            print_table(&rows, &listing.to_string());
        }
    }
    Ok(())
}
