// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::constants::API_GROUP;
use crate::error::Result;
use kube::{discovery::Discovery, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Kinds that must be served under `app.siji.io/v1` before the controllers start
const REQUIRED_KINDS: [&str; 2] = ["HelmChart", "HelmDog"];

/// Wait for the HelmChart and HelmDog CRDs to become available in the cluster.
/// Polls with exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match missing_kinds(client).await {
            Ok(missing) if missing.is_empty() => {
                info!("CRDs for {}/v1 are available", API_GROUP);
                return Ok(());
            }
            Ok(missing) => {
                info!(
                    "{} not yet served by {}/v1, waiting {} seconds...",
                    missing.join(", "),
                    API_GROUP,
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for {} CRDs: {}, retrying in {} seconds...",
                    API_GROUP, e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Required kinds the API server does not serve yet
async fn missing_kinds(client: &Client) -> Result<Vec<&'static str>> {
    let discovery = Discovery::new(client.clone())
        .filter(&[API_GROUP])
        .run()
        .await?;

    let served: Vec<String> = discovery
        .groups()
        .filter(|group| group.name() == API_GROUP)
        .flat_map(|group| group.recommended_resources())
        .filter(|(ar, _)| ar.version == "v1")
        .map(|(ar, _)| ar.kind)
        .collect();

    Ok(REQUIRED_KINDS
        .into_iter()
        .filter(|kind| !served.iter().any(|s| s == kind))
        .collect())
}
