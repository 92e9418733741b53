use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Chains the upstream can serve portfolio data for, in display order
const DEFAULT_CHAINS: &[(u64, &str)] = &[
    (1, "Ethereum"),
    (10, "Optimism"),
    (56, "BNB Chain"),
    (100, "Gnosis"),
    (137, "Polygon"),
    (324, "zkSync Era"),
    (8453, "Base"),
    (42161, "Arbitrum"),
    (43114, "Avalanche"),
    (59144, "Linea"),
];

/// Static descriptor of a supported chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub id: u64,
    pub name: String,
}

/// Ordered set of chains accepted at submission and expected at aggregation.
///
/// Both paths must read the same registry instance, otherwise aggregation
/// could report a submitted chain as `not_found` or skip it entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRegistry {
    chains: Vec<ChainInfo>,
}

impl ChainRegistry {
    /// Build a registry from explicit descriptors; later duplicates of an id are dropped
    pub fn new(chains: Vec<ChainInfo>) -> Self {
        let mut seen = HashSet::new();
        let chains = chains
            .into_iter()
            .filter(|chain| seen.insert(chain.id))
            .collect();
        Self { chains }
    }

    /// Narrow the default registry to the given chain ids, keeping the order given.
    /// An empty list means every default chain.
    pub fn with_enabled(chain_ids: &[u64]) -> Result<Self> {
        if chain_ids.is_empty() {
            return Ok(Self::default());
        }

        let defaults = Self::default();
        let chains = chain_ids
            .iter()
            .map(|id| {
                defaults
                    .get(*id)
                    .cloned()
                    .ok_or(CoreError::UnsupportedChain(*id))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(chains))
    }

    pub fn list_chains(&self) -> &[ChainInfo] {
        &self.chains
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.chains.iter().map(|chain| chain.id)
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainInfo> {
        self.chains.iter().find(|chain| chain.id == chain_id)
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.get(chain_id).is_some()
    }

    /// Display name for a chain; never fails
    pub fn name(&self, chain_id: u64) -> String {
        self.get(chain_id)
            .map(|chain| chain.name.clone())
            .unwrap_or_else(|| format!("Chain {}", chain_id))
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new(
            DEFAULT_CHAINS
                .iter()
                .map(|(id, name)| ChainInfo {
                    id: *id,
                    name: name.to_string(),
                })
                .collect(),
        )
    }
}
