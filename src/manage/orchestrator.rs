// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Whole-pass retry loop of a manage run.
//!
//! Every pass reconciles all configured resources from scratch with a fresh
//! [`ManageContext`]. Computed entries whose dependencies are not available
//! yet are deferred; the hash of those deferrals drives the loop:
//!
//! - empty hash: converged, stop
//! - hash differs from the previous pass: progress, sleep and retry
//! - same hash as the previous pass: no progress; after
//!   [`ManageSettings::max_stalled_passes`] such passes in a row the run is
//!   declared stalled
//!
//! [`ProgressTracker`] makes that decision and picks the delay.
//!
//! Modifications of every pass are accumulated and reported whatever the
//! outcome.

use super::azure::AzureManageService;
use super::digitalocean::DigitalOceanManageService;
use crate::config::{ManageConfiguration, ManageSettings};
use crate::context::{ManageContext, Modification};
use crate::errors::ManageError;
use std::time::Duration;
use tracing::{error, info, warn};

/// Terminal state of a manage run.
#[derive(Debug)]
pub enum ManageOutcome {
    /// A pass completed without deferring anything
    Converged,
    /// Passes stopped making progress
    Stalled,
    /// A pass hit an unrecoverable error
    Failed(ManageError),
}

/// Result of [`ManageOrchestrator::run`].
#[derive(Debug)]
pub struct ManageReport {
    pub outcome: ManageOutcome,
    /// Number of passes executed
    pub passes: u32,
    /// Modifications of every pass, in order
    pub modifications: Vec<Modification>,
}

impl ManageReport {
    /// Process exit code: 0 converged, 2 stalled, 1 failed.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            ManageOutcome::Converged => 0,
            ManageOutcome::Stalled => 2,
            ManageOutcome::Failed(_) => 1,
        }
    }

    /// Human-readable summary: every modification, then the outcome.
    #[must_use]
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.modifications.len() + 2);
        if self.modifications.is_empty() {
            lines.push("No modification".to_string());
        } else {
            lines.push(format!("Modifications ({}):", self.modifications.len()));
            lines.extend(self.modifications.iter().map(|m| format!("  {m}")));
        }
        lines.push(match &self.outcome {
            ManageOutcome::Converged => format!("Converged after {} pass(es)", self.passes),
            ManageOutcome::Stalled => format!(
                "Could not complete: no progress after {} pass(es)",
                self.passes
            ),
            ManageOutcome::Failed(e) => format!("Failed on pass {}: {e}", self.passes),
        });
        lines
    }
}

/// Runs passes over a configuration until it converges, stalls or fails.
pub struct ManageOrchestrator {
    azure: Option<AzureManageService>,
    digital_ocean: Option<DigitalOceanManageService>,
    settings: ManageSettings,
}

impl ManageOrchestrator {
    pub fn new(
        azure: Option<AzureManageService>,
        digital_ocean: Option<DigitalOceanManageService>,
        settings: ManageSettings,
    ) -> Self {
        Self {
            azure,
            digital_ocean,
            settings,
        }
    }

    /// Run one pass over every configured section, Azure first.
    ///
    /// # Errors
    ///
    /// Returns [`ManageError::Config`] when a section has no service to run
    /// it, or the first error of a service.
    pub async fn run_pass(
        &self,
        ctx: &mut ManageContext,
        config: &ManageConfiguration,
    ) -> Result<(), ManageError> {
        if let Some(azure_config) = &config.azure {
            let service = self.azure.as_ref().ok_or_else(|| {
                ManageError::Config("The azure section needs Azure credentials".to_string())
            })?;
            service.manage(ctx, azure_config).await?;
        }
        if let Some(do_config) = &config.digital_ocean {
            let service = self.digital_ocean.as_ref().ok_or_else(|| {
                ManageError::Config("The digitalOcean section needs a DigitalOcean token".to_string())
            })?;
            service.manage(ctx, do_config).await?;
        }
        Ok(())
    }

    /// Apply `config` until it converges, stalls or fails.
    pub async fn run(&self, config: &ManageConfiguration) -> ManageReport {
        let mut modifications = Vec::new();
        let mut progress = ProgressTracker::new(self.settings.clone());
        let mut passes = 0_u32;

        let outcome = loop {
            passes += 1;
            info!(pass = passes, "Starting manage pass");
            let mut ctx = ManageContext::new();
            let result = self.run_pass(&mut ctx, config).await;
            let hash = ctx.needs_next_stage_hash();
            let deferrals = ctx.deferrals().len();
            modifications.extend(ctx.into_modifications());

            if let Err(e) = result {
                error!(pass = passes, error = %e, "Manage pass failed");
                break ManageOutcome::Failed(e);
            }

            let delay = match progress.observe(hash) {
                PassVerdict::Converged => {
                    info!(pass = passes, "Configuration converged");
                    break ManageOutcome::Converged;
                }
                PassVerdict::Stalled { stalled_passes } => {
                    error!(
                        pass = passes,
                        stalled_passes = stalled_passes,
                        "No progress, giving up"
                    );
                    break ManageOutcome::Stalled;
                }
                PassVerdict::Retry {
                    delay,
                    stalled_passes: 0,
                } => {
                    info!(pass = passes, deferrals = deferrals, "Progress made, running another pass");
                    delay
                }
                PassVerdict::Retry {
                    delay,
                    stalled_passes,
                } => {
                    warn!(
                        pass = passes,
                        stalled_passes = stalled_passes,
                        deferrals = deferrals,
                        "No progress since the previous pass"
                    );
                    delay
                }
            };

            if !delay.is_zero() {
                info!(delay_secs = delay.as_secs(), "Waiting before next pass");
                tokio::time::sleep(delay).await;
            }
        };

        ManageReport {
            outcome,
            passes,
            modifications,
        }
    }
}

/// What follows a pass, given its deferral hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassVerdict {
    /// Nothing was deferred
    Converged,
    /// Sleep `delay`, then run another pass
    Retry { delay: Duration, stalled_passes: u32 },
    /// Too many passes in a row without progress
    Stalled { stalled_passes: u32 },
}

/// Compares the deferral hash of each pass with the previous one.
///
/// A different hash is progress: the stall count resets and the next pass
/// waits [`ManageSettings::progress_delay`]. The same hash waits
/// [`ManageSettings::stall_delay`] and counts towards
/// [`ManageSettings::max_stalled_passes`]. The first pass always counts as
/// progress.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    settings: ManageSettings,
    previous_hash: Option<String>,
    stalled_passes: u32,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(settings: ManageSettings) -> Self {
        Self {
            settings,
            previous_hash: None,
            stalled_passes: 0,
        }
    }

    /// Record the deferral hash of a pass and decide what comes next.
    pub fn observe(&mut self, hash: String) -> PassVerdict {
        if hash.is_empty() {
            return PassVerdict::Converged;
        }
        let delay = if self.previous_hash.as_deref() == Some(hash.as_str()) {
            self.stalled_passes += 1;
            if self.stalled_passes >= self.settings.max_stalled_passes {
                return PassVerdict::Stalled {
                    stalled_passes: self.stalled_passes,
                };
            }
            self.settings.stall_delay
        } else {
            self.stalled_passes = 0;
            self.settings.progress_delay
        };
        self.previous_hash = Some(hash);
        PassVerdict::Retry {
            delay,
            stalled_passes: self.stalled_passes,
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod orchestrator_tests;
