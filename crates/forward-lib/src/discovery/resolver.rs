//! Resolution of a requested service against a discovered service map

use crate::error::ForwardError;
use crate::models::{Environment, ResolvedService, ServiceIdentity, ServiceMap};
use tracing::{debug, warn};

/// Resolve a short name to a concrete pod.
///
/// A matching `namespace` takes precedence over `environment`: the first
/// entry (in discovery order) whose namespace matches is used and its
/// environment becomes the resolved one. If nothing matches the namespace,
/// the requested environment is used when present, otherwise the first
/// discovered entry.
pub fn resolve(
    map: &ServiceMap,
    short_name: &str,
    namespace: Option<&str>,
    environment: Option<Environment>,
) -> Result<ResolvedService, ForwardError> {
    let envs = map.get(short_name).ok_or_else(|| ForwardError::ServiceNotFound {
        name: short_name.to_string(),
    })?;

    if let Some(namespace) = namespace {
        if let Some((env, identity)) = envs.iter().find(|(_, id)| id.namespace == namespace) {
            if environment.is_some_and(|requested| requested != *env) {
                debug!(
                    service = %short_name,
                    namespace = %namespace,
                    resolved = %env,
                    "Namespace match overrides requested environment"
                );
            }
            return Ok(resolved(short_name, *env, identity));
        }
        debug!(
            service = %short_name,
            namespace = %namespace,
            "No entry in requested namespace, falling back to environment"
        );
    }

    let chosen = match environment {
        Some(env) => match envs.get_key_value(&env) {
            Some(found) => Some(found),
            None => {
                warn!(
                    service = %short_name,
                    requested = %env,
                    "Requested environment not found, using first discovered entry"
                );
                envs.first()
            }
        },
        None => envs.first(),
    };

    let (env, identity) = chosen.ok_or_else(|| ForwardError::EnvironmentNotFound {
        name: short_name.to_string(),
        environment: environment
            .map(|e| e.to_string())
            .unwrap_or_else(|| "any".to_string()),
    })?;

    Ok(resolved(short_name, *env, identity))
}

fn resolved(short_name: &str, environment: Environment, identity: &ServiceIdentity) -> ResolvedService {
    ResolvedService {
        short_name: short_name.to_string(),
        namespace: identity.namespace.clone(),
        pod_name: identity.pod_name(),
        full_service_name: identity.full_service_name.clone(),
        environment,
    }
}
