//! Shell command builders for the probes and process control gemix runs remotely

/// Processes gemix manages on every host
pub const MANAGED_PROCESSES: [&str; 3] = ["ts-meta", "ts-sql", "ts-store"];

/// Prints `yes` when something listens on `port`, `no` otherwise
pub fn gen_check_port_command(port: u16) -> String {
    format!(
        "ss -tln | awk '{{print $4}}' | grep -qE ':{}$' && echo yes || echo no",
        port
    )
}

/// Prints `yes` when a process named exactly `name` is running, `no` otherwise
pub fn gen_check_process_command(name: &str) -> String {
    format!("pgrep -x {} >/dev/null && echo yes || echo no", name)
}

/// Lists the running managed processes as `<pid> <name>` lines. Never fails
/// when none are running.
pub fn gen_list_processes_command() -> String {
    format!("pgrep -l -x '{}' || true", MANAGED_PROCESSES.join("|"))
}

pub fn gen_kill_command(name: &str) -> String {
    format!("killall {}", name)
}

pub fn gen_disk_usage_command(dir: &str) -> String {
    format!("df -h {}", dir)
}

pub fn gen_mkdir_command(dirs: &[String]) -> String {
    format!("mkdir -p {}", dirs.join(" "))
}

pub fn gen_file_exists_command(path: &str) -> String {
    format!("test -e {} && echo yes || echo no", path)
}

pub fn gen_remove_dir_command(dir: &str) -> String {
    format!("rm -rf {}", dir)
}

/// Creates `user` unless it already exists
pub fn gen_user_create_command(user: &str) -> String {
    format!("id -u {0} >/dev/null 2>&1 || useradd -m -s /bin/bash {0}", user)
}

pub fn gen_chmod_exec_command(path: &str) -> String {
    format!("chmod +x {}", path)
}

/// Parse the `yes`/`no` answer printed by the probe commands
pub fn parse_yes_no(output: &str) -> bool {
    output.trim() == "yes"
}

/// Parse `pgrep -l` output into process names
pub fn parse_process_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}
