// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group served by the operator's CRDs
pub const API_GROUP: &str = "app.siji.io";

/// Finalizer placed on HelmChart and HelmDog resources
pub const FINALIZER: &str = "app.siji.io/finalizer";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "helmchart-controller";

/// Kubernetes annotation keys used by the operator
pub mod annotations {
    /// Presence (any value) prevents the operator from deleting a tracked resource
    pub const KEEP: &str = "app.siji.io/keep";
}

/// Manifest cache layout
pub mod cache {
    /// Data key holding the joined documents
    pub const DATA_KEY: &str = "manifests";
    /// Separator placed between documents
    pub const DOCUMENT_SEPARATOR: &str = "\n---\n";
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Requeue intervals
pub mod requeue {
    /// Requeue after a failed reconcile
    pub const ERROR_SECS: u64 = 60;
    /// Periodic resync to correct drift on objects that are not watched
    pub const RESYNC_SECS: u64 = 5 * 60 * 60;
}
