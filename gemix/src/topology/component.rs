//! Role-level view of a topology

use std::sync::Arc;

use crate::topology::instance::{ClusterPeers, Instance};
use crate::topology::spec::{Role, Specification};

/// Meta must be able to elect a leader before anything joins it
const START_ORDER: [Role; 5] = [
    Role::TsMeta,
    Role::TsStore,
    Role::TsSql,
    Role::TsMonitor,
    Role::Grafana,
];

/// All instances of one role
#[derive(Debug, Clone, Copy)]
pub struct Component<'a> {
    role: Role,
    topology: &'a Specification,
}

impl<'a> Component<'a> {
    pub fn new(role: Role, topology: &'a Specification) -> Self {
        Self { role, topology }
    }

    pub fn name(&self) -> &'static str {
        self.role.name()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Fresh instances, one per configured server of this role
    pub fn instances(&self) -> Vec<Instance> {
        self.topology.instances_of(self.role)
    }
}

impl Specification {
    /// Instances of `role`, in declaration order
    pub fn instances_of(&self, role: Role) -> Vec<Instance> {
        let peers = Arc::new(ClusterPeers::from_topology(self));
        self.specs_of(role)
            .into_iter()
            .map(|spec| Instance::new(spec, self, peers.clone()))
            .collect()
    }

    /// Every instance, in start order
    pub fn instances(&self) -> Vec<Instance> {
        let peers = Arc::new(ClusterPeers::from_topology(self));
        START_ORDER
            .iter()
            .flat_map(|role| self.specs_of(*role))
            .map(|spec| Instance::new(spec, self, peers.clone()))
            .collect()
    }

    /// Instances placed on `host`, in start order
    pub fn instances_on(&self, host: &str) -> Vec<Instance> {
        self.instances()
            .into_iter()
            .filter(|inst| inst.host == host)
            .collect()
    }

    /// Non-empty components, meta first
    pub fn components_by_start_order(&self) -> Vec<Component<'_>> {
        START_ORDER
            .iter()
            .filter(|role| !self.specs_of(**role).is_empty())
            .map(|role| Component::new(*role, self))
            .collect()
    }

    /// Non-empty components, meta last
    pub fn components_by_stop_order(&self) -> Vec<Component<'_>> {
        let mut components = self.components_by_start_order();
        components.reverse();
        components
    }
}
