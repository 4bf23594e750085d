//! Topology checks run before any remote call

use std::collections::HashMap;

use crate::errors::GemixError;
use crate::topology::spec::{Role, Specification};

impl Specification {
    /// Reject topologies that could never deploy
    pub fn validate(&self) -> Result<(), GemixError> {
        if self.ts_meta_servers.is_empty() {
            return Err(GemixError::ValidationError(
                "topology requires at least one ts-meta server".to_string(),
            ));
        }

        for spec in self.role_specs() {
            if spec.host().trim().is_empty() {
                return Err(GemixError::ValidationError(format!(
                    "a {} server is missing its host",
                    spec.role()
                )));
            }
        }

        let mut ports: HashMap<(String, u16), Role> = HashMap::new();
        let mut data_dirs: HashMap<(String, Role, String), String> = HashMap::new();
        for inst in self.instances() {
            for port in inst.used_ports() {
                if let Some(other) = ports.insert((inst.host.clone(), port), inst.role) {
                    return Err(GemixError::ValidationError(format!(
                        "port {} on {} is used by both {} and {}",
                        port, inst.host, other, inst.role
                    )));
                }
            }

            if matches!(inst.role, Role::TsMeta | Role::TsStore) {
                let key = (inst.host.clone(), inst.role, inst.data_dir.clone());
                if let Some(other) = data_dirs.insert(key, inst.id()) {
                    return Err(GemixError::ValidationError(format!(
                        "data directory {} on {} is shared by {} and {}",
                        inst.data_dir,
                        inst.host,
                        other,
                        inst.id()
                    )));
                }
            }
        }

        Ok(())
    }
}
