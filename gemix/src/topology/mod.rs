//! Cluster topology model
//!
//! [`spec`] mirrors the YAML file, [`instance`] resolves each server into a
//! concrete process description and [`component`] groups instances by role
//! in start/stop order.

pub mod component;
pub mod instance;
pub mod spec;
pub mod validate;

pub use component::Component;
pub use instance::{ClusterPeers, Instance};
pub use spec::{InstancePorts, Role, RoleSpec, Specification};
