use crate::error::{describe_failure, CoreError};
use crate::executor::{run_checked, CommandOutput, Executor};
use std::sync::Arc;

const SYSTEMCTL: &str = "/usr/bin/systemctl";
const JOURNALCTL: &str = "/usr/bin/journalctl";

/// Reports longer than this are cut, keeping them readable in a chat message.
const MAX_REPORT_LENGTH: usize = 3500;

/// The operator's firewall script that opens or closes the guarded port for everyone at once.
///
/// Invoked as `<script> enable`, `<script> disable` and `<script> status`.
pub struct MasterSwitch {
    executor: Arc<dyn Executor>,
    script: String,
}

impl MasterSwitch {
    pub fn new(executor: Arc<dyn Executor>, script: String) -> Self {
        Self { executor, script }
    }

    pub fn enable(&self) -> Result<(), CoreError> {
        self.run("enable").map(|_| ())
    }

    pub fn disable(&self) -> Result<(), CoreError> {
        self.run("disable").map(|_| ())
    }

    /// Asks the script whether the port is currently open.
    pub fn is_enabled(&self) -> Result<bool, CoreError> {
        Ok(self.run("status")?.stdout.contains("ENABLED"))
    }

    fn run(&self, action: &'static str) -> Result<CommandOutput, CoreError> {
        run_checked(self.executor.as_ref(), &[&self.script, action]).map_err(|output| {
            CoreError::ServiceControl {
                action,
                detail: describe_failure(&output),
            }
        })
    }
}

/// systemd operations on the proxy service itself.
pub struct ServiceManager {
    executor: Arc<dyn Executor>,
    unit: String,
}

impl ServiceManager {
    pub fn new(executor: Arc<dyn Executor>, unit: String) -> Self {
        Self { executor, unit }
    }

    /// Restarts the unit and confirms it came back up.
    pub fn restart(&self) -> Result<(), CoreError> {
        self.run("restart", &[SYSTEMCTL, "restart", &self.unit])?;

        let state = self
            .executor
            .run(&[SYSTEMCTL, "is-active", &self.unit])
            .map(|output| output.stdout.trim().to_string())
            .unwrap_or_default();

        if state != "active" {
            return Err(CoreError::ServiceControl {
                action: "restart",
                detail: format!("{} is {} after restart", self.unit, non_empty(&state)),
            });
        }

        log::info!("Restarted {}", self.unit);
        Ok(())
    }

    pub fn status_report(&self) -> Result<String, CoreError> {
        let output = self.run("status", &[SYSTEMCTL, "status", &self.unit])?;
        Ok(truncate_report(&output.stdout))
    }

    pub fn recent_logs(&self, lines: u32) -> Result<String, CoreError> {
        let lines = lines.to_string();
        let output = self.run("logs", &[JOURNALCTL, "-u", &self.unit, "-n", &lines])?;
        Ok(truncate_report(&output.stdout))
    }

    fn run(&self, action: &'static str, argv: &[&str]) -> Result<CommandOutput, CoreError> {
        run_checked(self.executor.as_ref(), argv).map_err(|output| CoreError::ServiceControl {
            action,
            detail: describe_failure(&output),
        })
    }
}

fn non_empty(state: &str) -> &str {
    if state.is_empty() {
        "unknown"
    } else {
        state
    }
}

fn truncate_report(report: &str) -> String {
    let report = report.trim_end();
    match report.char_indices().nth(MAX_REPORT_LENGTH) {
        Some((cut, _)) => report[..cut].to_string(),
        None => report.to_string(),
    }
}
