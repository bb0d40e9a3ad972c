use crate::error::CoreError;
use crate::grant_timer::{GrantExpired, GrantStatus, GrantTimer};
use crate::rule_store::{Rule, RuleStore};
use crate::service_control::{MasterSwitch, ServiceManager};
use tokio::sync::broadcast;
use tokio::time::Duration;

const LOG_LINES: u32 = 30;

/// Everything a front end may do to the guarded proxy. Holds no state of its own; errors are
/// passed through unchanged.
pub struct AccessController {
    rule_store: RuleStore,
    grant_timer: GrantTimer,
    switch_probe: MasterSwitch,
    service_manager: ServiceManager,
}

impl AccessController {
    pub fn new(
        rule_store: RuleStore,
        grant_timer: GrantTimer,
        switch_probe: MasterSwitch,
        service_manager: ServiceManager,
    ) -> Self {
        Self {
            rule_store,
            grant_timer,
            switch_probe,
            service_manager,
        }
    }

    pub fn allow_address(&self, address: &str) -> Result<(), CoreError> {
        self.rule_store.allow(address)
    }

    /// [`CoreError::NotFound`] here means there was nothing to revoke.
    pub fn revoke_address(&self, address: &str) -> Result<(), CoreError> {
        self.rule_store.revoke(address)
    }

    pub fn list_rules(&self) -> Result<Vec<Rule>, CoreError> {
        self.rule_store.list()
    }

    pub fn guarded_port(&self) -> u16 {
        self.rule_store.port()
    }

    /// Only flips the master switch; no source is added to the allow-list.
    pub fn enable_for(&self, duration: Option<Duration>) -> Result<(), CoreError> {
        self.grant_timer.enable(duration)
    }

    pub fn extend_by(&self, duration: Duration) -> Result<(), CoreError> {
        self.grant_timer.extend(duration)
    }

    pub fn disable(&self) -> Result<(), CoreError> {
        self.grant_timer.disable()
    }

    pub fn status(&self) -> GrantStatus {
        self.grant_timer.status()
    }

    pub fn on_grant_expired(&self) -> broadcast::Receiver<GrantExpired> {
        self.grant_timer.subscribe()
    }

    /// What the firewall script itself reports, independent of the grant.
    pub fn probe_switch(&self) -> Result<bool, CoreError> {
        self.switch_probe.is_enabled()
    }

    pub fn restart_service(&self) -> Result<(), CoreError> {
        self.service_manager.restart()
    }

    pub fn service_status(&self) -> Result<String, CoreError> {
        self.service_manager.status_report()
    }

    pub fn service_logs(&self) -> Result<String, CoreError> {
        self.service_manager.recent_logs(LOG_LINES)
    }
}
