//! Lease-based leader election
//!
//! Only the holder of the `pinot-operator-leader` Lease runs controllers.
//! Standby replicas block in [`LeaderElector::acquire`] until the lease is
//! released or expires.

use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{Api, PostParams};
use kube::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

const LEASE_NAME: &str = "pinot-operator-leader";
const LEASE_DURATION_SECS: i32 = 15;
const RENEW_INTERVAL: Duration = Duration::from_secs(10);
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Namespace for the Lease: the explicit value, else the pod's own
/// namespace, else `default`.
pub fn detect_namespace(explicit: &str) -> String {
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    std::fs::read_to_string("/var/run/secrets/kubernetes.io/serviceaccount/namespace")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "default".to_string())
}

/// What to do with an existing Lease
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseDecision {
    /// We hold it
    Renew,
    /// Expired or released
    TakeOver,
    /// Someone else holds a live lease
    Wait,
}

pub fn decide(spec: Option<&LeaseSpec>, identity: &str, now: DateTime<Utc>) -> LeaseDecision {
    let holder = spec.and_then(|s| s.holder_identity.as_deref());
    match holder {
        Some(h) if h == identity => LeaseDecision::Renew,
        None => LeaseDecision::TakeOver,
        Some(_) if is_expired(spec, now) => LeaseDecision::TakeOver,
        Some(_) => LeaseDecision::Wait,
    }
}

pub fn is_expired(spec: Option<&LeaseSpec>, now: DateTime<Utc>) -> bool {
    let duration_secs = spec
        .and_then(|s| s.lease_duration_seconds)
        .unwrap_or(LEASE_DURATION_SECS) as i64;

    match spec.and_then(|s| s.renew_time.as_ref()) {
        Some(MicroTime(t)) => now.signed_duration_since(*t).num_seconds() > duration_secs,
        None => true,
    }
}

/// Spec written when renewing (`takeover == false`) or taking over a lease.
pub fn next_spec(prev: Option<&LeaseSpec>, identity: &str, now: DateTime<Utc>, takeover: bool) -> LeaseSpec {
    let transitions = prev.and_then(|s| s.lease_transitions).unwrap_or(0);
    let now = MicroTime(now);
    LeaseSpec {
        holder_identity: Some(identity.to_string()),
        lease_duration_seconds: Some(LEASE_DURATION_SECS),
        acquire_time: if takeover {
            Some(now.clone())
        } else {
            prev.and_then(|s| s.acquire_time.clone())
        },
        renew_time: Some(now),
        lease_transitions: Some(if takeover { transitions + 1 } else { transitions }),
        ..Default::default()
    }
}

/// Holds the operator's Lease
pub struct LeaderElector {
    lease_api: Api<Lease>,
    identity: String,
}

impl LeaderElector {
    pub fn new(client: Client, namespace: &str) -> Self {
        let lease_api = Api::<Lease>::namespaced(client, namespace);
        let identity = std::env::var("POD_NAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| format!("pinot-operator-{:08x}", rand::random::<u32>()));
        info!(identity = %identity, namespace = %namespace, "Initialized leader elector");
        Self { lease_api, identity }
    }

    /// Blocks until the lease is acquired.
    pub async fn acquire(&self) -> anyhow::Result<()> {
        info!(identity = %self.identity, lease = LEASE_NAME, "Waiting for leader lease");
        loop {
            match self.try_acquire().await {
                Ok(true) => {
                    info!(identity = %self.identity, "Acquired leader lease");
                    return Ok(());
                }
                Ok(false) => {
                    debug!("Lease held by another instance, retrying in {:?}", RETRY_INTERVAL);
                }
                Err(e) => {
                    warn!("Lease acquisition error: {}, retrying in {:?}", e, RETRY_INTERVAL);
                }
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    /// `Ok(false)` once the lease is lost.
    pub async fn renew(&self) -> anyhow::Result<bool> {
        let lease = self.lease_api.get(LEASE_NAME).await?;
        if decide(lease.spec.as_ref(), &self.identity, Utc::now()) != LeaseDecision::Renew {
            return Ok(false);
        }
        let renewed = self.write(&lease, false).await?;
        if renewed {
            debug!("Renewed leader lease");
        } else {
            warn!("Lease conflict during renewal, lost leadership");
        }
        Ok(renewed)
    }

    /// Clear the holder so a standby can take over without waiting for expiry.
    pub async fn release(&self) {
        let lease = match self.lease_api.get(LEASE_NAME).await {
            Ok(l) => l,
            Err(e) => {
                warn!("Failed to read lease for release: {}", e);
                return;
            }
        };
        if decide(lease.spec.as_ref(), &self.identity, Utc::now()) != LeaseDecision::Renew {
            debug!("Lease not held by us, skipping release");
            return;
        }

        let mut updated = lease;
        if let Some(spec) = updated.spec.as_mut() {
            spec.holder_identity = None;
        }
        match self
            .lease_api
            .replace(LEASE_NAME, &PostParams::default(), &updated)
            .await
        {
            Ok(_) => info!(identity = %self.identity, "Released leader lease"),
            Err(e) => warn!("Failed to release leader lease: {}", e),
        }
    }

    pub fn renew_interval(&self) -> Duration {
        RENEW_INTERVAL
    }

    async fn try_acquire(&self) -> anyhow::Result<bool> {
        let existing = match self.lease_api.get_opt(LEASE_NAME).await? {
            Some(existing) => existing,
            None => return self.create().await,
        };
        match decide(existing.spec.as_ref(), &self.identity, Utc::now()) {
            LeaseDecision::Renew => self.write(&existing, false).await,
            LeaseDecision::TakeOver => self.write(&existing, true).await,
            LeaseDecision::Wait => Ok(false),
        }
    }

    async fn create(&self) -> anyhow::Result<bool> {
        let mut spec = next_spec(None, &self.identity, Utc::now(), true);
        spec.lease_transitions = Some(0);
        let lease = Lease {
            metadata: ObjectMeta {
                name: Some(LEASE_NAME.to_string()),
                ..Default::default()
            },
            spec: Some(spec),
        };
        match self.lease_api.create(&PostParams::default(), &lease).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace under the read `resourceVersion`; a conflict means another
    /// replica got there first.
    async fn write(&self, existing: &Lease, takeover: bool) -> anyhow::Result<bool> {
        let mut updated = existing.clone();
        updated.spec = Some(next_spec(
            existing.spec.as_ref(),
            &self.identity,
            Utc::now(),
            takeover,
        ));
        match self
            .lease_api
            .replace(LEASE_NAME, &PostParams::default(), &updated)
            .await
        {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
