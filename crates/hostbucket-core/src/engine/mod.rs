//! Hostname apply engine
//!
//! The HostnameEngine is responsible for:
//! - Reading the hostnames currently attached to the property
//! - Planning batches with the batcher
//! - Submitting batches one at a time
//! - Waiting for each activation to settle before the next submission
//! - Recording the outcome in the state store
//!
//! ## Architecture
//!
//! ```text
//!   desired ──┐
//!             ▼
//!     ┌───────────────┐  list / patch / poll  ┌──────────────┐
//!     │ HostnameEngine│ ────────────────────▶ │ HostnameApi  │
//!     └───────────────┘                       └──────────────┘
//!             │
//!     ┌───────┴────────┐
//!     ▼                ▼
//! ┌──────────┐   ┌──────────┐
//! │StateStore│   │  Events  │
//! └──────────┘   └──────────┘
//! ```
//!
//! ## Apply Flow
//!
//! 1. Plan: list current hostnames, build batches
//! 2. For each batch: PATCH, then poll the activation until it is ACTIVE
//! 3. The first failure stops the run; later batches are not sent and
//!    nothing is rolled back
//! 4. Re-read the hostnames and record them in the state store

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::batcher::{self, Plan};
use crate::config::{ApplyConfig, HostbucketConfig};
use crate::error::{Error, Result};
use crate::model::{self, Activation, ActivationStatus, BatchMetadata, BatchRequest, HostnameMap, PropertyRef};
use crate::traits::{AppliedState, HostnameApi, StateStore};

/// Events emitted by the HostnameEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Batches computed for a run
    PlanComputed {
        property_id: String,
        batches: usize,
        adds: usize,
        removes: usize,
    },

    /// A batch was accepted upstream
    BatchSubmitted {
        batch: usize,
        total: usize,
        activation_id: String,
        adds: usize,
        removes: usize,
    },

    /// Activation status observed while polling
    ActivationPolled {
        activation_id: String,
        status: ActivationStatus,
    },

    /// A batch's activation reached ACTIVE
    ActivationSucceeded { batch: usize, activation_id: String },

    /// A batch failed; no further batches will be sent
    BatchFailed { batch: usize, error: String },

    /// Every batch settled and the outcome was recorded
    ApplyFinished {
        activations: usize,
        hostname_count: usize,
    },
}

/// Result of a successful apply
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// The plan that was applied
    pub plan: Plan,
    /// Settled activations, one per batch, in apply order
    pub activations: Vec<Activation>,
    /// Hostnames attached after the apply
    pub hostnames: HostnameMap,
}

/// Hostname apply engine
///
/// ## Caller Contract
///
/// Batches are applied strictly in plan order and batch *n+1* is never
/// submitted before the activation of batch *n* reports ACTIVE. The
/// priority removals computed by the batcher rely on this.
///
/// ## Threading
///
/// One engine serves one property. Independent engines for different
/// properties may run concurrently.
pub struct HostnameEngine {
    api: Box<dyn HostnameApi>,
    state_store: Box<dyn StateStore>,
    property: PropertyRef,
    metadata: BatchMetadata,
    apply: ApplyConfig,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl HostnameEngine {
    /// Create a new engine
    ///
    /// Returns the engine and a receiver yielding engine events.
    pub fn new(
        api: Box<dyn HostnameApi>,
        state_store: Box<dyn StateStore>,
        config: HostbucketConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.apply.event_channel_capacity);

        let engine = Self {
            api,
            state_store,
            property: config.property.property_ref(),
            metadata: config.property.batch_metadata(),
            apply: config.apply,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Property this engine manages
    pub fn property(&self) -> &PropertyRef {
        &self.property
    }

    /// Outcome of the last successful apply, if recorded
    pub async fn last_applied(&self) -> Result<Option<AppliedState>> {
        self.state_store.get_state(&self.property.property_id).await
    }

    /// Compute the batches needed to reach `desired`
    ///
    /// Reads the current hostnames upstream; sends no changes.
    pub async fn plan(&self, desired: &HostnameMap) -> Result<Plan> {
        let desired = model::normalize_map(desired.clone())?;
        model::validate_hostnames(&desired)?;

        let current = self
            .api
            .list_hostnames(&self.property, self.metadata.network)
            .await?;
        let current = model::normalize_map(current)?;

        let batches = batcher::build(&current, &desired, self.apply.batch_limit, &self.metadata);
        let plan = Plan::new(current, batches);

        info!(
            "Plan for {}: {} batch(es), {} add(s), {} remove(s)",
            self.property.property_id,
            plan.batches.len(),
            plan.add_count(),
            plan.remove_count()
        );
        self.emit_event(EngineEvent::PlanComputed {
            property_id: self.property.property_id.clone(),
            batches: plan.batches.len(),
            adds: plan.add_count(),
            removes: plan.remove_count(),
        });

        Ok(plan)
    }

    /// Plan and apply `desired`
    pub async fn apply(&self, desired: &HostnameMap) -> Result<ApplyOutcome> {
        self.apply_with_shutdown(desired, None).await
    }

    /// Plan and apply `desired`, giving up when `shutdown_rx` fires
    ///
    /// A shutdown only interrupts waiting; a request already in flight
    /// completes first. Batches submitted before the signal stay applied.
    pub async fn apply_with_shutdown(
        &self,
        desired: &HostnameMap,
        mut shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<ApplyOutcome> {
        let plan = self.plan(desired).await?;
        let total = plan.batches.len();

        let mut activations = Vec::with_capacity(total);
        for (index, batch) in plan.batches.iter().enumerate() {
            let number = index + 1;
            match self.apply_batch(number, total, batch, &mut shutdown_rx).await {
                Ok(activation) => activations.push(activation),
                Err(e) => {
                    error!("Batch {}/{} failed: {}", number, total, e);
                    self.emit_event(EngineEvent::BatchFailed {
                        batch: number,
                        error: e.to_string(),
                    });
                    return Err(Error::batch(number, total, e));
                }
            }
        }

        let hostnames = if plan.is_empty() {
            plan.current.clone()
        } else {
            model::normalize_map(
                self.api
                    .list_hostnames(&self.property, self.metadata.network)
                    .await?,
            )?
        };

        self.record_outcome(&hostnames, &activations).await?;

        self.emit_event(EngineEvent::ApplyFinished {
            activations: activations.len(),
            hostname_count: hostnames.len(),
        });
        info!(
            "Applied {} batch(es) to {}; {} hostname(s) attached",
            total,
            self.property.property_id,
            hostnames.len()
        );

        Ok(ApplyOutcome {
            plan,
            activations,
            hostnames,
        })
    }

    /// Submit one batch and wait for its activation to settle
    async fn apply_batch(
        &self,
        number: usize,
        total: usize,
        batch: &BatchRequest,
        shutdown_rx: &mut Option<oneshot::Receiver<()>>,
    ) -> Result<Activation> {
        info!(
            "Submitting batch {}/{} to {}: {} add(s), {} remove(s)",
            number,
            total,
            self.property.property_id,
            batch.add.len(),
            batch.remove.len()
        );

        let activation_id = self.api.patch_hostnames(&self.property, batch).await?;

        self.emit_event(EngineEvent::BatchSubmitted {
            batch: number,
            total,
            activation_id: activation_id.clone(),
            adds: batch.add.len(),
            removes: batch.remove.len(),
        });

        let activation = self.wait_for_activation(&activation_id, shutdown_rx).await?;

        info!("Activation {} is {}", activation_id, activation.status);
        self.emit_event(EngineEvent::ActivationSucceeded {
            batch: number,
            activation_id,
        });

        Ok(activation)
    }

    /// Poll an activation until it reaches a terminal status
    async fn wait_for_activation(
        &self,
        activation_id: &str,
        shutdown_rx: &mut Option<oneshot::Receiver<()>>,
    ) -> Result<Activation> {
        let started = tokio::time::Instant::now();
        let timeout = Duration::from_secs(self.apply.activation_timeout_secs);
        let interval = Duration::from_secs(self.apply.poll_interval_secs);
        let mut poll_errors = 0;

        loop {
            match self.api.get_activation(&self.property, activation_id).await {
                Ok(activation) => {
                    poll_errors = 0;
                    self.emit_event(EngineEvent::ActivationPolled {
                        activation_id: activation_id.to_string(),
                        status: activation.status.clone(),
                    });

                    if activation.status.is_success() {
                        return Ok(activation);
                    }
                    if activation.status.is_failure() {
                        return Err(Error::activation(activation_id, activation.status.as_str()));
                    }
                    debug!("Activation {} is {}", activation_id, activation.status);
                }
                Err(e) if e.is_transient() && poll_errors < self.apply.max_poll_errors => {
                    poll_errors += 1;
                    warn!(
                        "Status check {} for activation {} failed: {}",
                        poll_errors, activation_id, e
                    );
                }
                Err(e) => return Err(e),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(Error::ActivationTimeout {
                    activation_id: activation_id.to_string(),
                    waited_secs: elapsed.as_secs(),
                });
            }

            self.pause(interval.min(timeout - elapsed), shutdown_rx)
                .await?;
        }
    }

    /// Sleep, returning early with `Error::Cancelled` on shutdown
    async fn pause(
        &self,
        duration: Duration,
        shutdown_rx: &mut Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        let signalled = match shutdown_rx.as_mut() {
            Some(rx) => tokio::select! {
                _ = &mut sleep => return Ok(()),
                signal = rx => signal.is_ok(),
            },
            None => {
                sleep.await;
                return Ok(());
            }
        };

        if signalled {
            info!("Shutdown signal received while waiting for activation");
            return Err(Error::cancelled(
                "shutdown signal received while waiting for activation",
            ));
        }

        // Sender dropped: nobody can cancel any more.
        *shutdown_rx = None;
        sleep.await;
        Ok(())
    }

    async fn record_outcome(
        &self,
        hostnames: &HostnameMap,
        activations: &[Activation],
    ) -> Result<()> {
        let property_id = &self.property.property_id;

        let activation_ids = if activations.is_empty() {
            // Nothing submitted; keep pointing at the previous activation.
            self.state_store
                .get_state(property_id)
                .await?
                .map(|previous| previous.activation_ids)
                .unwrap_or_default()
        } else {
            activations
                .iter()
                .map(|a| a.activation_id.clone())
                .collect()
        };

        let state = AppliedState::new(self.metadata.network, hostnames.clone(), activation_ids);
        self.state_store.set_state(property_id, &state).await?;
        self.state_store.flush().await?;
        Ok(())
    }

    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
