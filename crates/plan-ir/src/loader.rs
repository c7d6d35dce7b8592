// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Plan loading: manifest file → validated [`Plan`].

use crate::plan::Validated;
use crate::{Plan, PlanError, PlanManifest};
use std::path::Path;

/// Loads and saves execution plans.
pub struct PlanLoader;

impl PlanLoader {
    /// Reads a plan manifest from `path` and validates it.
    pub fn load(path: &Path) -> Result<Plan<Validated>, PlanError> {
        tracing::info!("loading plan from {}", path.display());
        let manifest = PlanManifest::from_file(path)?;
        let plan = Plan::from_manifest(manifest).validate()?;
        tracing::info!("{}", plan.summary());
        Ok(plan)
    }

    /// Parses and validates a plan from a JSON string.
    pub fn from_json(json: &str) -> Result<Plan<Validated>, PlanError> {
        Plan::from_manifest(PlanManifest::from_json(json)?).validate()
    }

    /// Writes a validated plan to `path` as JSON.
    pub fn save(plan: &Plan<Validated>, path: &Path) -> Result<(), PlanError> {
        plan.to_manifest().write_file(path)?;
        tracing::info!("wrote plan '{}' to {}", plan.name, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryCase, RegstDescProto, TaskProto, TaskType};

    fn plan() -> Plan<Validated> {
        let desc = RegstDescProto::new(5, 0, vec![1], MemoryCase::HostMem, vec![]);
        Plan::new(
            "io".into(),
            vec![
                TaskProto::new(0, TaskType::Source, 0).with_produced("out", desc),
                TaskProto::new(1, TaskType::NormalForward, 0).with_consumed("in", 5),
            ],
        )
        .validate()
        .unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("flowrt_plan_loader_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("plan.json");

        let p = plan();
        PlanLoader::save(&p, &path).unwrap();
        let back = PlanLoader::load(&path).unwrap();
        assert_eq!(back.name, "io");
        assert_eq!(back.to_manifest(), p.to_manifest());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("flowrt_definitely_missing_plan.json");
        assert!(matches!(PlanLoader::load(&path), Err(PlanError::Io(_))));
    }

    #[test]
    fn test_from_json_runs_validation() {
        let json = r#"{ "name": "empty", "tasks": [] }"#;
        assert!(matches!(
            PlanLoader::from_json(json),
            Err(PlanError::InvalidPlan(_))
        ));
    }
}
