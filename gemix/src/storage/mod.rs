//! Local state under the gemix home directory

pub mod cluster;
pub mod layout;
pub mod settings;
