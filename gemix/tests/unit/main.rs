//! Integration tests for gemix

mod mock;
mod test_config;
mod test_fsm;
mod test_lifecycle;
mod test_task;
mod test_topology;
