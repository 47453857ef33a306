//! Content fingerprints of rendered config maps.
//!
//! The fingerprint is injected into the environment of every workload that
//! mounts the config map, so a content change alters the pod template and
//! triggers a rollout.

use k8s_openapi::api::core::v1::{ConfigMap, EnvVar};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hex SHA-256 over the config map's data, keys in sorted order.
pub fn config_hash(data: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in data {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of a rendered config map (empty data hashes like an empty map).
pub fn config_map_hash(config_map: &ConfigMap) -> String {
    config_hash(&config_map.data.clone().unwrap_or_default())
}

/// Environment entry carrying a config map's fingerprint, keyed by its name.
pub fn hash_env_var(config_map_name: &str, hash: &str) -> EnvVar {
    EnvVar {
        name: config_map_name.to_string(),
        value: Some(hash.to_string()),
        ..Default::default()
    }
}

/// Fingerprint of a whole desired object, used to skip unchanged applies.
pub fn object_hash<T: Serialize>(object: &T) -> serde_json::Result<String> {
    let bytes = serde_json::to_vec(object)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}
