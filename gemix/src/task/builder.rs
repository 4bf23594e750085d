//! Fluent assembly of task trees

use std::sync::Arc;

use crate::app::options::ReadinessOptions;
use crate::config::ConfigMap;
use crate::executor::actions::UploadAction;
use crate::executor::ssh::RemoteHost;
use crate::filesys::dir::Dir;
use crate::http::client::PackageClient;
use crate::task::display::StepDisplay;
use crate::task::ops::{
    CheckConflicts, CollectStatus, Download, GenerateHostConfigs, InitConfig, KillProcesses,
    Launch, Mkdir, RemoveInstallDir, Shell, SshConnect, StatusSink, Upload, UserCreate,
    WaitPortsReady,
};
use crate::task::{Serial, Task};
use crate::topology::instance::Instance;
use crate::topology::spec::Specification;

/// Accumulates tasks in order. `build` turns them into a [`Serial`].
#[derive(Default)]
pub struct TaskBuilder {
    tasks: Vec<Arc<dyn Task>>,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary task
    pub fn push(mut self, task: impl Task + 'static) -> Self {
        self.tasks.push(Arc::new(task));
        self
    }

    /// Append an already shared task
    pub fn push_arc(mut self, task: Arc<dyn Task>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn ssh_connect(self, host: RemoteHost) -> Self {
        self.push(SshConnect::new(host))
    }

    pub fn mkdir(self, host: &str, dirs: Vec<String>, sudo: bool) -> Self {
        self.push(Mkdir::new(host, dirs, sudo))
    }

    pub fn shell(self, host: &str, command: impl Into<String>, sudo: bool) -> Self {
        self.push(Shell::new(host, command, sudo))
    }

    pub fn user_create(self, host: &str, user: &str) -> Self {
        self.push(UserCreate::new(host, user))
    }

    pub fn upload(self, host: &str, action: UploadAction) -> Self {
        self.push(Upload::new(host, action))
    }

    pub fn download(
        self,
        client: PackageClient,
        version: &str,
        os: &str,
        arch: &str,
        dir: Dir,
    ) -> Self {
        self.push(Download::new(client, version, os, arch, dir))
    }

    pub fn generate_host_configs(
        self,
        topology: Arc<Specification>,
        template: Arc<ConfigMap>,
        staging: Dir,
    ) -> Self {
        self.push(GenerateHostConfigs::new(topology, template, staging))
    }

    pub fn init_config(
        self,
        instance: Instance,
        topology: Arc<Specification>,
        version: &str,
        staging: Dir,
    ) -> Self {
        self.push(InitConfig::new(instance, topology, version, staging))
    }

    pub fn launch(self, instance: Instance, version: &str) -> Self {
        self.push(Launch::new(instance, version))
    }

    pub fn kill_processes(self, host: &str, process_names: Vec<String>) -> Self {
        self.push(KillProcesses::new(host, process_names))
    }

    pub fn check_conflicts(self, host: &str, ports: Vec<u16>) -> Self {
        self.push(CheckConflicts::new(host, ports))
    }

    pub fn wait_ports_ready(self, host: &str, ports: Vec<u16>, readiness: ReadinessOptions) -> Self {
        self.push(WaitPortsReady::new(host, ports, readiness))
    }

    pub fn collect_status(
        self,
        host: &str,
        ports: Vec<(String, u16)>,
        disk_dir: &str,
        sink: StatusSink,
    ) -> Self {
        self.push(CollectStatus::new(host, ports, disk_dir, sink))
    }

    pub fn remove_install_dir(self, host: &str, dir: &str) -> Self {
        self.push(RemoveInstallDir::new(host, dir))
    }

    /// Everything accumulated, in order
    pub fn build(self) -> Serial {
        Serial::new(self.tasks, false)
    }

    /// Everything accumulated as one shared task
    pub fn build_arc(self) -> Arc<dyn Task> {
        Arc::new(self.build())
    }

    /// Everything accumulated, wrapped in a single progress line
    pub fn step(self, prefix: impl Into<String>) -> StepDisplay {
        StepDisplay::new(prefix, self.build_arc())
    }
}
