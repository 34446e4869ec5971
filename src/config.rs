// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Gate HelmChart changes through the admission webhook and apply only cached manifests
    pub webhooks_enabled: bool,
    /// Namespace holding the manifest cache, never writable by chart users
    pub operator_namespace: String,
    pub webhook_port: u16,
    /// Directory containing `tls.crt` and `tls.key` for the webhook server
    pub webhook_cert_dir: PathBuf,
    pub helm_binary: String,
    pub reconcile_timeout: Duration,
    pub admission_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            webhooks_enabled: false,
            operator_namespace: "helm-operator".to_string(),
            webhook_port: 9443,
            webhook_cert_dir: PathBuf::from("/tmp/k8s-webhook-server/serving-certs"),
            helm_binary: "helm".to_string(),
            reconcile_timeout: Duration::from_secs(300),
            admission_timeout: Duration::from_secs(8),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let webhooks_enabled = lookup("WEBHOOKS_ENABLED").is_some_and(|v| v == "true");
        let operator_namespace = lookup("OPERATOR_NAMESPACE")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.operator_namespace);
        let webhook_port = parse_or(&lookup, "WEBHOOK_PORT", defaults.webhook_port)?;
        let webhook_cert_dir = lookup("WEBHOOK_CERT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.webhook_cert_dir);
        let helm_binary = lookup("HELM_BINARY").unwrap_or(defaults.helm_binary);
        let reconcile_timeout = Duration::from_secs(parse_or(
            &lookup,
            "RECONCILE_TIMEOUT_SECS",
            defaults.reconcile_timeout.as_secs(),
        )?);
        let admission_timeout = Duration::from_secs(parse_or(
            &lookup,
            "ADMISSION_TIMEOUT_SECS",
            defaults.admission_timeout.as_secs(),
        )?);

        Ok(Config {
            webhooks_enabled,
            operator_namespace,
            webhook_port,
            webhook_cert_dir,
            helm_binary,
            reconcile_timeout,
            admission_timeout,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} environment variable is not valid: {}", key, raw)),
        None => Ok(default),
    }
}
