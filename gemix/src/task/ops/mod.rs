//! Leaf tasks

pub mod config;
pub mod process;
pub mod remote;
pub mod status;
pub mod transfer;

pub use config::{GenerateHostConfigs, InitConfig};
pub use process::{check_port_conflict, CheckConflicts, KillProcesses, Launch, WaitPortsReady};
pub use remote::{Mkdir, RemoveInstallDir, Shell, SshConnect, UserCreate};
pub use status::{CollectStatus, HostStatus, PortStatus, StatusSink};
pub use transfer::{Download, Upload};
