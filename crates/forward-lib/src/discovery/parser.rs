//! Pod listing parser
//!
//! Columns are located by name in the header row, so listings with or
//! without `NAMESPACE`, `STATUS` or `AGE` are all accepted. Rows that cannot
//! be turned into a service identity are dropped without error.

use crate::models::{Environment, PodRecord, ServiceIdentity, ServiceMap};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

/// Column positions found in a listing header
#[derive(Debug, Default)]
struct Columns {
    namespace: Option<usize>,
    name: Option<usize>,
    status: Option<usize>,
    age: Option<usize>,
    /// AGE is the last header column; read it from the end of each row
    /// since RESTARTS may contain spaces ("3 (2d ago)")
    age_is_last: bool,
}

impl Columns {
    fn from_header(header: &str) -> Self {
        let names: Vec<&str> = header.split_whitespace().collect();
        let find = |column: &str| names.iter().position(|n| *n == column);
        let age = find("AGE");

        Self {
            namespace: find("NAMESPACE"),
            name: find("NAME"),
            status: find("STATUS"),
            age,
            age_is_last: age.is_some() && age == names.len().checked_sub(1),
        }
    }

    fn record(&self, fields: &[&str]) -> Option<PodRecord> {
        let name = fields.get(self.name?)?.to_string();
        let namespace = self
            .namespace
            .and_then(|i| fields.get(i))
            .map(|s| s.to_string());
        let status = self.status.and_then(|i| fields.get(i)).map(|s| s.to_string());
        let age_field = if self.age_is_last {
            fields.last()
        } else {
            self.age.and_then(|i| fields.get(i))
        };
        let age = age_field.and_then(|s| parse_age(s));

        Some(PodRecord {
            namespace,
            name,
            status,
            age,
        })
    }
}

/// Parse kubectl's compact age notation (`36m`, `5d2h`, `2y120d`)
fn parse_age(value: &str) -> Option<Duration> {
    humantime::parse_duration(value).ok()
}

/// Parse listing rows into pod records. The header row is required.
pub fn parse_pod_records(listing: &str) -> Vec<PodRecord> {
    let mut lines = listing.lines().filter(|line| !line.trim().is_empty());

    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let columns = Columns::from_header(header);
    if columns.name.is_none() {
        debug!("Pod listing has no NAME column");
        return Vec::new();
    }

    lines
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            columns.record(&fields)
        })
        .collect()
}

/// Split a pod name into (full service name, pod id).
///
/// The last two `-` separated segments form the id; everything before them
/// is the service name. Names with fewer than three segments yield `None`.
pub fn decompose_pod_name(pod_name: &str) -> Option<(String, String)> {
    let segments: Vec<&str> = pod_name.split('-').collect();
    if segments.len() < 3 {
        return None;
    }

    let split = segments.len() - 2;
    Some((segments[..split].join("-"), segments[split..].join("-")))
}

/// Derive the short lookup name for a service.
///
/// The environment prefix is stripped first, then `<namespace>-` if it
/// prefixes what remains. A strip that would leave nothing is skipped.
pub fn short_name(full_service_name: &str, env_prefix: Option<&str>, namespace: &str) -> String {
    let rest = env_prefix
        .and_then(|prefix| full_service_name.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(full_service_name);

    let namespace_prefix = format!("{}-", namespace);
    match rest.strip_prefix(&namespace_prefix) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => rest.to_string(),
    }
}

/// Parse a pod listing into a service map.
///
/// `explicit_namespace` is used for every row when the listing has no
/// `NAMESPACE` column. Rows whose status is present and not `Running`, rows
/// without a usable namespace and pod names with fewer than three segments
/// are skipped.
///
/// When two running pods map to the same (short name, environment) key the
/// newer pod wins, judged by the `AGE` column. Without comparable ages the
/// later row wins.
pub fn parse_pod_listing(listing: &str, explicit_namespace: Option<&str>) -> ServiceMap {
    let mut map = ServiceMap::new();
    let mut ages: HashMap<(String, Environment), Option<Duration>> = HashMap::new();

    for record in parse_pod_records(listing) {
        if !record.is_running() {
            trace!(pod = %record.name, status = ?record.status, "Skipping pod that is not running");
            continue;
        }

        let Some(namespace) = record.namespace.as_deref().or(explicit_namespace) else {
            trace!(pod = %record.name, "Skipping pod without namespace");
            continue;
        };

        let Some((full_service_name, id)) = decompose_pod_name(&record.name) else {
            trace!(pod = %record.name, "Skipping pod name with too few segments");
            continue;
        };

        let (environment, prefix) = Environment::detect(&full_service_name);
        let short = short_name(&full_service_name, prefix.as_deref(), namespace);

        let key = (short.clone(), environment);
        if let Some(previous_age) = ages.get(&key) {
            if !replaces(*previous_age, record.age) {
                debug!(
                    service = %short,
                    environment = %environment,
                    pod = %record.name,
                    "Keeping newer pod for duplicate service entry"
                );
                continue;
            }
        }
        ages.insert(key, record.age);

        map.entry(short).insert(
            environment,
            ServiceIdentity {
                id,
                namespace: namespace.to_string(),
                full_service_name,
            },
        );
    }

    map
}

/// Whether a later row replaces an earlier one for the same key
fn replaces(previous: Option<Duration>, candidate: Option<Duration>) -> bool {
    match (previous, candidate) {
        (Some(previous), Some(candidate)) => candidate <= previous,
        _ => true,
    }
}
