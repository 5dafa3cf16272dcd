//! Registry of client instances polled by the reconciliation engine.
//!
//! Registrations live in process memory only and are lost on restart;
//! clients are expected to re-register when they come back up.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::remote::RemoteClient;

fn default_client_type() -> String {
    "pokedex".to_string()
}

/// Registration request for a client instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_url: String,
    #[serde(default = "default_client_type")]
    pub client_type: String,
}

impl ClientRegistration {
    /// Create a registration with the default client type.
    pub fn new(client_id: impl Into<String>, client_url: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_url: client_url.into(),
            client_type: default_client_type(),
        }
    }

    /// Check the id and URL, normalizing the URL's trailing slash.
    pub fn validate(mut self) -> Result<Self, String> {
        self.client_id = self.client_id.trim().to_string();
        if self.client_id.is_empty() {
            return Err("client_id must not be empty".to_string());
        }

        self.client_url = self.client_url.trim().trim_end_matches('/').to_string();
        if !(self.client_url.starts_with("http://") || self.client_url.starts_with("https://")) {
            return Err(format!(
                "client_url must be an http(s) URL, got '{}'",
                self.client_url
            ));
        }

        Ok(self)
    }
}

/// A registered client with bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredClient {
    #[serde(flatten)]
    pub registration: ClientRegistration,
    pub registered_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl RegisteredClient {
    pub fn client_id(&self) -> &str {
        &self.registration.client_id
    }

    pub fn client_url(&self) -> &str {
        &self.registration.client_url
    }
}

/// In-memory map of registered client instances.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug)]
pub struct ClientRegistry {
    clients: DashMap<String, RegisteredClient>,
    remote: RemoteClient,
    register_timeout: Duration,
    health_timeout: Duration,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new(remote: RemoteClient, register_timeout: Duration, health_timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            remote,
            register_timeout,
            health_timeout,
        }
    }

    /// Probe the client's health endpoint and register it on success.
    ///
    /// Re-registering an existing id replaces its URL and type.
    pub async fn register(&self, registration: ClientRegistration) -> bool {
        let registration = match registration.validate() {
            Ok(r) => r,
            Err(reason) => {
                tracing::warn!("Rejected client registration: {}", reason);
                return false;
            }
        };

        if let Err(e) = self
            .remote
            .probe_health(&registration.client_url, self.register_timeout)
            .await
        {
            tracing::warn!(
                client_id = %registration.client_id,
                "Client health check failed, not registering: {}",
                e
            );
            return false;
        }

        let now = Utc::now();
        let client_id = registration.client_id.clone();
        let client_url = registration.client_url.clone();
        let registered_at = self
            .clients
            .get(&client_id)
            .map(|existing| existing.registered_at)
            .unwrap_or(now);

        self.clients.insert(
            client_id.clone(),
            RegisteredClient {
                registration,
                registered_at,
                last_seen: Some(now),
            },
        );

        tracing::info!(client_id = %client_id, client_url = %client_url, "Client registered");
        true
    }

    /// Remove a client. Returns false if it was not registered.
    pub fn unregister(&self, client_id: &str) -> bool {
        match self.clients.remove(client_id) {
            Some((_, client)) => {
                tracing::info!(
                    client_id = %client_id,
                    client_url = %client.client_url(),
                    "Client unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Snapshot of all registrations, ordered by client id.
    pub fn list(&self) -> Vec<RegisteredClient> {
        let mut clients: Vec<_> = self.clients.iter().map(|e| e.value().clone()).collect();
        clients.sort_by(|a, b| a.client_id().cmp(b.client_id()));
        clients
    }

    /// Look up one client.
    pub fn get(&self, client_id: &str) -> Option<RegisteredClient> {
        self.clients.get(client_id).map(|e| e.value().clone())
    }

    /// Record a successful contact with a client.
    pub fn mark_seen(&self, client_id: &str, at: DateTime<Utc>) {
        if let Some(mut client) = self.clients.get_mut(client_id) {
            client.last_seen = Some(at);
        }
    }

    /// Probe every client and unregister the ones that fail.
    ///
    /// Probes run concurrently; one failing probe never stops the others.
    /// Returns the number of clients removed.
    pub async fn cleanup_inactive(&self) -> usize {
        let clients = self.list();
        let probes = clients.iter().map(|client| async move {
            let result = self
                .remote
                .probe_health(client.client_url(), self.health_timeout)
                .await;
            (client, result)
        });

        let mut removed = 0;
        for (client, result) in join_all(probes).await {
            match result {
                Ok(()) => self.mark_seen(client.client_id(), Utc::now()),
                Err(e) => {
                    tracing::warn!(
                        client_id = %client.client_id(),
                        "Client failed liveness probe: {}",
                        e
                    );
                    if self.unregister(client.client_id()) {
                        removed += 1;
                    }
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, remaining = self.len(), "Removed inactive clients");
        }
        removed
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
