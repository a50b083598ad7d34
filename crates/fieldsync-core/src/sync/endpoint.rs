//! Failover selection among candidate central servers.

use std::time::Duration;

use serde::Serialize;

use super::transport::CentralTransport;
use crate::error::{Error, Result};

/// The base URL a run sends all of its requests to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEndpoint {
    pub base_url: String,
    /// False when no candidate answered and the first one is used anyway
    pub reachable: bool,
}

/// Picks the first candidate that answers a probe and sticks with it.
///
/// The choice is cached for the resolver's lifetime; a new run builds a new
/// resolver.
pub struct EndpointResolver<'a, T> {
    transport: &'a T,
    candidates: Vec<String>,
    probe_timeout: Duration,
    resolved: Option<ResolvedEndpoint>,
}

impl<'a, T: CentralTransport> EndpointResolver<'a, T> {
    pub fn new(transport: &'a T, candidates: &[String], probe_timeout: Duration) -> Result<Self> {
        let candidates: Vec<String> = candidates
            .iter()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .collect();
        if candidates.is_empty() {
            return Err(Error::Config(
                "at least one central server URL is required".to_string(),
            ));
        }

        Ok(Self {
            transport,
            candidates,
            probe_timeout,
            resolved: None,
        })
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub async fn resolve(&mut self) -> ResolvedEndpoint {
        if let Some(resolved) = &self.resolved {
            return resolved.clone();
        }

        let resolved = self.probe_candidates().await;
        self.resolved = Some(resolved.clone());
        resolved
    }

    async fn probe_candidates(&self) -> ResolvedEndpoint {
        for candidate in &self.candidates {
            match self.transport.probe(candidate, self.probe_timeout).await {
                Ok(status) => {
                    tracing::debug!("Central server {} answered probe with {}", candidate, status);
                    return ResolvedEndpoint {
                        base_url: candidate.clone(),
                        reachable: true,
                    };
                }
                Err(error) => {
                    tracing::debug!("Central server {} unreachable: {}", candidate, error);
                }
            }
        }

        let fallback = self.candidates[0].clone();
        tracing::warn!(
            "No central server reachable out of {}; falling back to {}",
            self.candidates.len(),
            fallback
        );
        ResolvedEndpoint {
            base_url: fallback,
            reachable: false,
        }
    }
}
