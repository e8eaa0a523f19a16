//! Compartment hierarchy
//!
//! Rebuilds full `/parent/child` names for every active compartment of a
//! tenancy and keeps the result in a time-bounded cache.

use super::pagination::collect_pages;
use crate::oci::identity::{Compartment, IdentityApi};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How often the compartment cache is rebuilt
pub const DEFAULT_CACHE_REFRESH: Duration = Duration::from_secs(60);

/// Suffix marking the tenancy root in compartment names
pub const TENANCY_SUFFIX: &str = "(tenancy, shown as '/')";

/// Full compartment name -> compartment OCID
pub type CompartmentNames = BTreeMap<String, String>;

/// Fetch the tenancy and all its compartments and resolve their full names
pub async fn fetch_compartments(
    identity: &dyn IdentityApi,
    region: &str,
    tenancy_id: &str,
) -> Result<CompartmentNames> {
    let tenancy = identity
        .get_tenancy(region, tenancy_id)
        .await
        .with_context(|| format!("fetching tenancy name of {}", tenancy_id))?;

    let compartments = collect_pages(None, |page| async move {
        identity
            .list_compartments(region, tenancy_id, page.as_deref())
            .await
    })
    .await
    .with_context(|| format!("listing compartments of {}", tenancy_id))?;

    tracing::debug!(
        "tenancy {} has {} compartments",
        tenancy.name,
        compartments.len()
    );
    Ok(resolve_full_names(tenancy_id, &tenancy.name, &compartments))
}

/// Resolve the full path name of every active compartment.
///
/// Children of the tenancy become `/name`, deeper ones `parent/name`. Passes
/// repeat while they make progress; entries whose parent never resolves
/// (inactive or missing parent) are dropped.
pub fn resolve_full_names(
    tenancy_id: &str,
    tenancy_name: &str,
    compartments: &[Compartment],
) -> CompartmentNames {
    let active: BTreeMap<&str, &Compartment> = compartments
        .iter()
        .filter(|c| c.is_active() && c.id != tenancy_id)
        .map(|c| (c.id.as_str(), c))
        .collect();

    let mut full_names: HashMap<&str, String> = HashMap::new();
    full_names.insert(tenancy_id, format!("{}{}", tenancy_name, TENANCY_SUFFIX));

    let mut pending: Vec<&Compartment> = active.into_values().collect();
    loop {
        let before = pending.len();
        pending.retain(|&c| {
            let resolved = if c.compartment_id == tenancy_id {
                Some(format!("/{}", c.name))
            } else {
                full_names
                    .get(c.compartment_id.as_str())
                    .map(|parent| format!("{}/{}", parent, c.name))
            };
            match resolved {
                Some(name) => {
                    full_names.insert(c.id.as_str(), name);
                    false
                },
                None => true,
            }
        });
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    if !pending.is_empty() {
        tracing::warn!(
            "Dropping {} compartments whose parent could not be resolved",
            pending.len()
        );
    }

    let mut by_id: Vec<(&str, String)> = full_names.into_iter().collect();
    by_id.sort();
    by_id
        .into_iter()
        .map(|(id, name)| (name, id.to_string()))
        .collect()
}

struct CacheState {
    tenancy_id: String,
    names: CompartmentNames,
    updated_at: Instant,
}

/// Compartment names cached for a fixed interval
pub struct CompartmentCache {
    refresh_interval: Duration,
    state: Mutex<Option<CacheState>>,
}

impl CompartmentCache {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            state: Mutex::new(None),
        }
    }

    /// Cached names for `tenancy_id`, rebuilt with `rebuild` when stale
    pub async fn get_or_refresh<F, Fut>(
        &self,
        tenancy_id: &str,
        rebuild: F,
    ) -> Result<CompartmentNames>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompartmentNames>>,
    {
        self.get_or_refresh_at(Instant::now(), tenancy_id, rebuild).await
    }

    async fn get_or_refresh_at<F, Fut>(
        &self,
        now: Instant,
        tenancy_id: &str,
        rebuild: F,
    ) -> Result<CompartmentNames>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompartmentNames>>,
    {
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref() {
            let fresh = now.saturating_duration_since(cached.updated_at) <= self.refresh_interval;
            if fresh && cached.tenancy_id == tenancy_id {
                return Ok(cached.names.clone());
            }
        }

        tracing::debug!("Refreshing compartment cache for {}", tenancy_id);
        let names = rebuild().await.map_err(|e| {
            tracing::error!("Unable to refresh compartment cache: {:#}", e);
            e
        })?;
        *state = Some(CacheState {
            tenancy_id: tenancy_id.to_string(),
            names: names.clone(),
            updated_at: now,
        });
        Ok(names)
    }
}

impl Default for CompartmentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_REFRESH)
    }
}
