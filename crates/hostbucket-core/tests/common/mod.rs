//! Test doubles and common utilities for engine contract tests
//!
//! The mock API keeps an in-memory hostname bucket, applies every PATCH to
//! it and answers status checks from a script.

#![allow(dead_code)]

use hostbucket_core::config::{ApplyConfig, HostbucketConfig, PropertyConfig, ProviderConfig};
use hostbucket_core::error::{Error, Result};
use hostbucket_core::{
    Activation, ActivationStatus, BatchRequest, CertProvisioningType, HostnameApi, HostnameMap,
    HostnameRecord, Network, PropertyRef,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted answer to a status check
#[derive(Debug, Clone)]
pub enum PollStep {
    Status(ActivationStatus),
    TransientError,
    FatalError,
}

/// A mock HostnameApi backed by an in-memory bucket
pub struct MockHostnameApi {
    hostnames: Arc<Mutex<HostnameMap>>,
    patches: Arc<Mutex<Vec<BatchRequest>>>,
    script: Arc<Mutex<VecDeque<PollStep>>>,
    /// Activation submitted but not yet seen settled
    pending: Arc<Mutex<Option<String>>>,
    /// PATCHes sent while another activation was still pending
    overlapping_patches: Arc<AtomicUsize>,
    list_call_count: Arc<AtomicUsize>,
    poll_call_count: Arc<AtomicUsize>,
    /// 1-based PATCH number that fails, if any
    fail_patch: Option<usize>,
}

impl MockHostnameApi {
    /// Create a mock whose bucket starts with `hostnames`
    ///
    /// Status checks answer ACTIVE unless a script is set.
    pub fn new(hostnames: HostnameMap) -> Self {
        Self {
            hostnames: Arc::new(Mutex::new(hostnames)),
            patches: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            pending: Arc::new(Mutex::new(None)),
            overlapping_patches: Arc::new(AtomicUsize::new(0)),
            list_call_count: Arc::new(AtomicUsize::new(0)),
            poll_call_count: Arc::new(AtomicUsize::new(0)),
            fail_patch: None,
        }
    }

    /// Answer status checks with `steps` in order, then ACTIVE
    pub fn with_script(self, steps: Vec<PollStep>) -> Self {
        *self.script.lock().unwrap() = steps.into();
        self
    }

    /// Make the `n`-th PATCH (1-based) fail with a conflict
    pub fn failing_patch(mut self, n: usize) -> Self {
        self.fail_patch = Some(n);
        self
    }

    /// Create a mock that shares its bucket and counters with `other`
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            hostnames: Arc::clone(&other.hostnames),
            patches: Arc::clone(&other.patches),
            script: Arc::clone(&other.script),
            pending: Arc::clone(&other.pending),
            overlapping_patches: Arc::clone(&other.overlapping_patches),
            list_call_count: Arc::clone(&other.list_call_count),
            poll_call_count: Arc::clone(&other.poll_call_count),
            fail_patch: other.fail_patch,
        }
    }

    /// PATCH bodies received, in order
    pub fn patches(&self) -> Vec<BatchRequest> {
        self.patches.lock().unwrap().clone()
    }

    pub fn patch_call_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }

    pub fn poll_call_count(&self) -> usize {
        self.poll_call_count.load(Ordering::SeqCst)
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    pub fn overlapping_patches(&self) -> usize {
        self.overlapping_patches.load(Ordering::SeqCst)
    }

    /// Current contents of the bucket
    pub fn hostnames(&self) -> HostnameMap {
        self.hostnames.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HostnameApi for MockHostnameApi {
    async fn list_hostnames(&self, _property: &PropertyRef, _network: Network) -> Result<HostnameMap> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.hostnames())
    }

    async fn patch_hostnames(&self, _property: &PropertyRef, batch: &BatchRequest) -> Result<String> {
        let number = {
            let mut patches = self.patches.lock().unwrap();
            patches.push(batch.clone());
            patches.len()
        };

        if self.fail_patch == Some(number) {
            return Err(Error::provider("mock", "hostname bucket is locked"));
        }

        let mut pending = self.pending.lock().unwrap();
        if pending.is_some() {
            self.overlapping_patches.fetch_add(1, Ordering::SeqCst);
        }

        let mut hostnames = self.hostnames.lock().unwrap();
        for cname_from in &batch.remove {
            hostnames.remove(cname_from);
        }
        for entry in &batch.add {
            let record = HostnameRecord::new(entry.cert_provisioning_type, &entry.edge_hostname_id)
                .with_cname_to(format!("{}.edgekey.net", entry.cname_from));
            hostnames.insert(entry.cname_from.clone(), record);
        }

        let activation_id = format!("atv_{number}");
        *pending = Some(activation_id.clone());
        Ok(activation_id)
    }

    async fn get_activation(&self, _property: &PropertyRef, activation_id: &str) -> Result<Activation> {
        self.poll_call_count.fetch_add(1, Ordering::SeqCst);

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PollStep::Status(ActivationStatus::Active));

        let status = match step {
            PollStep::Status(status) => status,
            PollStep::TransientError => return Err(Error::http("connection reset")),
            PollStep::FatalError => return Err(Error::auth("token revoked")),
        };

        if status.is_terminal() {
            *self.pending.lock().unwrap() = None;
        }

        Ok(Activation {
            activation_id: activation_id.to_string(),
            network: Network::Staging,
            status,
            note: None,
            notify_emails: Vec::new(),
            submit_date: None,
            update_date: None,
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A record pointing at `ehn_<edge_hostname>`
pub fn record(edge_hostname: u32) -> HostnameRecord {
    HostnameRecord::new(CertProvisioningType::Default, &format!("ehn_{edge_hostname}"))
}

/// `count` hostnames named `host-<n>.example.com`, starting at `first`
pub fn hostnames(first: usize, count: usize, edge_hostname: u32) -> HostnameMap {
    (first..first + count)
        .map(|n| (format!("host-{n:05}.example.com"), record(edge_hostname)))
        .collect()
}

/// Helper to create a minimal HostbucketConfig for testing
pub fn minimal_config() -> HostbucketConfig {
    HostbucketConfig {
        property: PropertyConfig::new("prp_1", "ctr_C-1", "grp_1").with_note("contract test"),
        provider: ProviderConfig::Custom {
            factory: "mock".to_string(),
            config: serde_json::json!({}),
        },
        state_store: Default::default(),
        apply: ApplyConfig {
            batch_limit: 1000,
            poll_interval_secs: 60,
            activation_timeout_secs: 600,
            max_poll_errors: 2,
            event_channel_capacity: 1000,
        },
    }
}
