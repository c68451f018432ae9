//! Fleet files: engine configuration plus targets and their scripted load.
//!
//! ```json
//! {
//!   "config": { "scheduler": { "collect_every": 30 } },
//!   "targets": [
//!     {
//!       "target": { "id": "web", "name": "web", "kind": "compute", ... },
//!       "load": [ { "cpu": 45.0, "response_time": 120.0 }, ... ]
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tide_autoscaler::{AutoScalerConfig, ResourceKind, ScalingTarget};
use tide_metrics::Utilization;

use crate::error::CliError;

/// One target and the readings its probe replays, cycling at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetTarget {
    /// Target definition.
    pub target: ScalingTarget,
    /// Readings returned by successive collections.
    pub load: Vec<Utilization>,
}

/// A simulated fleet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetFile {
    /// Engine configuration. Omitted sections use defaults.
    #[serde(default)]
    pub config: AutoScalerConfig,
    /// Targets to register.
    pub targets: Vec<FleetTarget>,
}

impl FleetFile {
    /// Reads and checks a fleet file.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Io`] if the file cannot be read and
    /// [`CliError::Fleet`] if it is malformed.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)?;
        let fleet: Self = serde_json::from_str(&text).map_err(|e| CliError::Fleet {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        fleet.check().map_err(|reason| CliError::Fleet {
            path: path.display().to_string(),
            reason,
        })?;
        Ok(fleet)
    }

    fn check(&self) -> Result<(), String> {
        if self.targets.is_empty() {
            return Err("no targets defined".into());
        }
        let mut seen = HashSet::new();
        for entry in &self.targets {
            if !seen.insert(&entry.target.id) {
                return Err(format!("duplicate target {}", entry.target.id));
            }
            if entry.load.is_empty() {
                return Err(format!("target {} has no load readings", entry.target.id));
            }
        }
        Ok(())
    }

    /// The built-in demo fleet: a web tier with a midday surge, a steady
    /// database and a queue that drains.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Scaling`] if a built-in target fails validation.
    pub fn demo() -> Result<Self, CliError> {
        let web = ScalingTarget::builder("web", ResourceKind::Compute)
            .name("web frontend")
            .min_instances(2)
            .max_instances(12)
            .current_instances(3)
            .cooldown(Duration::from_secs(180))
            .label("tier", "frontend")
            .build()?;
        let web_load = (0..40)
            .map(|i| {
                let cpu = if (10..30).contains(&i) { 88.0 + f64::from(i % 5) * 2.0 } else { 45.0 };
                Utilization::new()
                    .with_cpu(cpu)
                    .with_memory(60.0)
                    .with_response_time(80.0 + cpu)
            })
            .collect();

        let db = ScalingTarget::builder("orders-db", ResourceKind::Database)
            .min_instances(1)
            .max_instances(4)
            .current_instances(2)
            .cooldown(Duration::from_secs(600))
            .build()?;
        let db_load = [54.0, 56.0, 55.0, 57.0, 53.0, 55.0]
            .iter()
            .map(|&cpu| {
                Utilization::new()
                    .with_cpu(cpu)
                    .with_memory(48.0)
                    .with_response_time(12.0)
            })
            .collect();

        let jobs = ScalingTarget::builder("jobs", ResourceKind::QueueWorker)
            .min_instances(1)
            .max_instances(8)
            .current_instances(4)
            .cooldown(Duration::from_secs(120))
            .build()?;
        let jobs_load = (0..20)
            .map(|i| Utilization::new().with_queue_depth(f64::from(40 - i * 2)))
            .collect();

        Ok(Self {
            config: AutoScalerConfig::default(),
            targets: vec![
                FleetTarget { target: web, load: web_load },
                FleetTarget { target: db, load: db_load },
                FleetTarget { target: jobs, load: jobs_load },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_fleet_is_valid() {
        let fleet = FleetFile::demo().unwrap();
        assert_eq!(fleet.targets.len(), 3);
        assert!(fleet.check().is_ok());
    }

    #[test]
    fn demo_fleet_round_trips_through_json() {
        let fleet = FleetFile::demo().unwrap();
        let json = serde_json::to_string(&fleet).unwrap();
        let parsed: FleetFile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.targets.len(), 3);
        assert_eq!(parsed.targets[0].target, fleet.targets[0].target);
    }

    #[test]
    fn check_rejects_empty_load() {
        let mut fleet = FleetFile::demo().unwrap();
        fleet.targets[1].load.clear();
        assert_eq!(
            fleet.check().unwrap_err(),
            "target orders-db has no load readings"
        );
    }

    #[test]
    fn check_rejects_duplicates() {
        let mut fleet = FleetFile::demo().unwrap();
        let copy = fleet.targets[0].clone();
        fleet.targets.push(copy);
        assert!(fleet.check().unwrap_err().contains("duplicate target web"));
    }

    #[test]
    fn missing_config_uses_defaults() {
        let json = r#"{ "targets": [] }"#;
        let fleet: FleetFile = serde_json::from_str(json).unwrap();
        assert_eq!(fleet.config, AutoScalerConfig::default());
        assert!(fleet.check().is_err());
    }
}
