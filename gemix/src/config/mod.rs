//! Config merge and generation engine
//!
//! Config trees are plain TOML tables. They exist in two shapes: folded
//! (nested tables mirroring TOML sections) and flat (dot-joined keys such as
//! `data.store-data-dir`). [`merge`] converts between the two and layers
//! overrides, [`generate`] renders one file per host from a template and the
//! topology, and [`schema`] checks the result before it is written.

pub mod generate;
pub mod merge;
pub mod schema;

/// Config tree
pub type ConfigMap = toml::Table;

pub use generate::{gen_confs, DEFAULT_TEMPLATE};
pub use merge::{flatten_map, fold_map, merge_config, merge_to_toml};
