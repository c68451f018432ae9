//! Hourly unit costs used to estimate the cost of a scaling action.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::ResourceKind;

/// Prices one instance-hour of each resource kind.
pub trait CostModel: Send + Sync {
    /// Hourly cost of one instance of `kind`.
    fn unit_cost(&self, kind: ResourceKind) -> f64;

    /// Hourly cost change of moving `delta` instances.
    fn estimate(&self, kind: ResourceKind, delta: i64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let instances = delta.unsigned_abs() as f64;
        instances * self.unit_cost(kind)
    }
}

/// Fixed per-kind price list with optional overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticCostModel {
    #[serde(default)]
    overrides: HashMap<ResourceKind, f64>,
}

impl StaticCostModel {
    /// Creates a model with the default price list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default hourly price of one instance of `kind`.
    #[must_use]
    pub const fn default_unit_cost(kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Compute => 0.10,
            ResourceKind::Container => 0.05,
            ResourceKind::Database => 0.50,
            ResourceKind::Cache => 0.15,
            ResourceKind::LoadBalancer => 0.025,
            ResourceKind::QueueWorker => 0.04,
        }
    }

    /// Overrides the price of one kind.
    #[must_use]
    pub fn with_unit_cost(mut self, kind: ResourceKind, cost: f64) -> Self {
        self.overrides.insert(kind, cost);
        self
    }
}

impl CostModel for StaticCostModel {
    fn unit_cost(&self, kind: ResourceKind) -> f64 {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Self::default_unit_cost(kind))
    }
}
