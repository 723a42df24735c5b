//! Remote port detection
//!
//! When a request omits the remote port, the first port configured on the
//! target service is used. Detection never fails: any query problem falls
//! back to a fixed default.

use crate::cluster::ClusterClient;
use tracing::{debug, warn};

/// Port used when detection fails
pub const DEFAULT_REMOTE_PORT: u16 = 3000;

/// Detect the remote port of a service, falling back to `fallback`
pub async fn resolve_port(
    client: &dyn ClusterClient,
    namespace: &str,
    full_service_name: &str,
    fallback: u16,
) -> u16 {
    match client.service_ports(namespace, full_service_name).await {
        Ok(output) => match parse_first_port(&output) {
            Some(port) => {
                debug!(service = %full_service_name, namespace = %namespace, port, "Detected remote port");
                port
            }
            None => {
                warn!(
                    service = %full_service_name,
                    namespace = %namespace,
                    output = %output.trim(),
                    fallback,
                    "No usable port in service definition, using default"
                );
                fallback
            }
        },
        Err(e) => {
            warn!(
                service = %full_service_name,
                namespace = %namespace,
                error = %e,
                fallback,
                "Port detection failed, using default"
            );
            fallback
        }
    }
}

/// First whitespace separated token as a non-zero port
fn parse_first_port(output: &str) -> Option<u16> {
    output
        .split_whitespace()
        .next()?
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
}
