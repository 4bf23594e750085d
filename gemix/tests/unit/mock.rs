//! In-memory executor used to drive lifecycle operations without SSH

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use gemix::app::options::{GemixOptions, ReadinessOptions};
use gemix::errors::GemixError;
use gemix::executor::ssh::RemoteHost;
use gemix::executor::{CommandOutput, Connector, Direction, Executor};
use gemix::filesys::dir::Dir;
use gemix::operation::ClusterManager;
use gemix::storage::layout::StorageLayout;
use gemix::task::display::NullRenderer;
use gemix::utils::CooldownOptions;

pub const TOPOLOGY: &str = r#"
global:
  user: root
  deploy_dir: /opt/gemini
  log_dir: /var/log/gemini
  data_dir: /data/gemini
ts-meta:
  - host: 10.0.0.1
ts-store:
  - host: 10.0.0.2
ts-sql:
  - host: 10.0.0.3
"#;

/// Behaviour and recorded traffic of one simulated host
#[derive(Default)]
pub struct HostState {
    launched: AtomicBool,
    pub fail_launch: bool,
    pub busy_port: Option<u16>,
    pub transfers: Mutex<Vec<String>>,
}

impl HostState {
    /// Host whose install script always fails
    pub fn failing_launch() -> Self {
        Self {
            fail_launch: true,
            ..Default::default()
        }
    }

    /// Host where `port` is already taken by a foreign process
    pub fn busy(port: u16) -> Self {
        Self {
            busy_port: Some(port),
            ..Default::default()
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.transfers.lock().unwrap().clone()
    }
}

pub struct MockExecutor {
    host: String,
    state: Arc<HostState>,
    log: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl Executor for MockExecutor {
    fn host(&self) -> &str {
        &self.host
    }

    async fn execute(&self, cmd: &str, _sudo: bool) -> Result<CommandOutput, GemixError> {
        self.log
            .lock()
            .unwrap()
            .push((self.host.clone(), cmd.to_string()));

        let launched = self.state.launched.load(Ordering::SeqCst);
        let stdout = if cmd.starts_with("bash ") {
            if self.state.fail_launch {
                return Err(GemixError::ExecutionError(format!("launch refused on {}", self.host)));
            }
            self.state.launched.store(true, Ordering::SeqCst);
            "started\n".to_string()
        } else if cmd.starts_with("ss -tln") {
            let busy = self
                .state
                .busy_port
                .is_some_and(|p| cmd.contains(&format!(":{}$", p)));
            if busy || launched { "yes\n" } else { "no\n" }.to_string()
        } else if cmd.starts_with("test -e") {
            "no\n".to_string()
        } else if cmd.starts_with("pgrep -l") {
            if launched { "4242 ts-meta\n" } else { "" }.to_string()
        } else if cmd.starts_with("pgrep -x") {
            if launched { "yes\n" } else { "no\n" }.to_string()
        } else if cmd.starts_with("df -h") {
            "Filesystem Size Used Avail Use% Mounted on\n/dev/sda1 50G 10G 40G 20% /\n".to_string()
        } else {
            String::new()
        };

        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
        })
    }

    async fn transfer(&self, _src: &str, dst: &str, direction: Direction) -> Result<(), GemixError> {
        assert_eq!(direction, Direction::Upload);
        self.state.transfers.lock().unwrap().push(dst.to_string());
        Ok(())
    }
}

/// Hands out [`MockExecutor`]s that share one command log
#[derive(Default)]
pub struct MockConnector {
    hosts: Mutex<HashMap<String, Arc<HostState>>>,
    unreachable: HashSet<String>,
    pub log: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, ip: &str, state: HostState) -> Self {
        self.hosts
            .lock()
            .unwrap()
            .insert(ip.to_string(), Arc::new(state));
        self
    }

    pub fn unreachable(mut self, ip: &str) -> Self {
        self.unreachable.insert(ip.to_string());
        self
    }

    pub fn state(&self, ip: &str) -> Arc<HostState> {
        self.hosts
            .lock()
            .unwrap()
            .entry(ip.to_string())
            .or_default()
            .clone()
    }

    /// Commands run so far, in order, as `(host, command)`
    pub fn commands(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, host: &RemoteHost) -> Result<Arc<dyn Executor>, GemixError> {
        if self.unreachable.contains(&host.ip) {
            return Err(GemixError::ConnectionError(format!("dial {} refused", host.ip)));
        }
        Ok(Arc::new(MockExecutor {
            host: host.ip.clone(),
            state: self.state(&host.ip),
            log: self.log.clone(),
        }))
    }
}

/// Options rooted in a fresh temporary home with a pre-extracted package
pub async fn test_options(version: &str) -> GemixOptions {
    let home = Dir::create_temp_dir("gemix-test").await.unwrap();
    let layout = StorageLayout::new(home.path());
    layout
        .package_dir(version, "linux", "amd64")
        .subdir("usr")
        .subdir("bin")
        .create()
        .await
        .unwrap();

    GemixOptions {
        layout,
        concurrency: 4,
        readiness: ReadinessOptions {
            attempts: 3,
            cooldown: CooldownOptions {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                ..Default::default()
            },
        },
        ..Default::default()
    }
}

pub fn manager(options: GemixOptions, connector: Arc<MockConnector>) -> ClusterManager {
    ClusterManager::new(options, connector, Arc::new(NullRenderer))
}
