//! Service discovery from pod listings
//!
//! Turns the tabular output of `kubectl get pods` into a [`ServiceMap`]
//! keyed by short service name and environment, and resolves requested
//! services against that map.

mod parser;
mod resolver;


pub use parser::{decompose_pod_name, parse_pod_listing, parse_pod_records, short_name};
pub use resolver::resolve;

use crate::models::{Environment, ServiceMap};
use std::collections::BTreeMap;

impl ServiceMap {
    /// Sorted view of every short name and the (environment, namespace)
    /// pairs it resolves to
    pub fn listing(&self) -> BTreeMap<String, Vec<(Environment, String)>> {
        self.iter()
            .map(|(name, envs)| {
                let bindings = envs
                    .iter()
                    .map(|(env, identity)| (*env, identity.namespace.clone()))
                    .collect();
                (name.clone(), bindings)
            })
            .collect()
    }
}
