mod command;
mod reporter;

use crate::access_controller::AccessController;
use crate::console::command::{format_duration, parse_command, Command, HELP};
use crate::console::reporter::{ReplyKind, Reporter};
use crate::error::CoreError;
use crate::grant_timer::GrantExpired;
use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Line-oriented operator console: one command per input line, one or more reply lines each.
pub struct Console {
    controller: Arc<AccessController>,
    reporter: Reporter,
}

impl Console {
    pub fn new(controller: Arc<AccessController>) -> Arc<Self> {
        Arc::new(Self {
            controller,
            reporter: Reporter {},
        })
    }

    /// Serves commands until `input` ends. Grant expiry notices are printed as they happen.
    pub async fn run(self: Arc<Self>, input: impl AsyncBufRead + Unpin) -> anyhow::Result<()> {
        let notices = tokio::spawn(self.clone().report_expiries(self.controller.on_grant_expired()));

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read command")? {
            match parse_command(&line) {
                Ok(None) => continue,
                Ok(Some(command)) => self.execute(command).await,
                Err(e) => self.reporter.reply(ReplyKind::Failed, format!("{:#}", e)),
            }
        }

        notices.abort();
        Ok(())
    }

    async fn execute(self: &Arc<Self>, command: Command) {
        // Firewall and service commands block
        let console = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || console.dispatch(command)).await {
            self.reporter
                .reply(ReplyKind::Failed, format!("Command did not complete: {}", e));
        }
    }

    fn dispatch(&self, command: Command) {
        let controller = &self.controller;
        let port = controller.guarded_port();

        let result = match command {
            Command::Allow(address) => controller
                .allow_address(&address)
                .map(|()| format!("{} allowed on port {}", address, port)),

            Command::Revoke(address) => controller
                .revoke_address(&address)
                .map(|()| format!("{} revoked on port {}", address, port)),

            Command::List => controller.list_rules().map(|rules| {
                for rule in &rules {
                    self.reporter.reply(ReplyKind::Detail, rule);
                }
                format!("{} rule(s) for port {}", rules.len(), port)
            }),

            Command::Enable(duration) => {
                controller.enable_for(duration).map(|()| match duration {
                    Some(duration) => format!("Access enabled for {}", format_duration(duration)),
                    None => "Access enabled without time limit".to_string(),
                })
            }

            Command::Extend(duration) => controller
                .extend_by(duration)
                .map(|()| format!("Access now ends in {}", format_duration(duration))),

            Command::Disable => controller
                .disable()
                .map(|()| "Access disabled".to_string()),

            Command::Status => {
                let status = controller.status();
                Ok(match (status.active, status.remaining) {
                    (false, _) => "Access DISABLED".to_string(),
                    (true, None) => "Access ENABLED, no time limit".to_string(),
                    (true, Some(remaining)) => format!(
                        "Access ENABLED, {} remaining",
                        format_duration(remaining)
                    ),
                })
            }

            Command::Probe => controller.probe_switch().map(|enabled| {
                format!(
                    "Firewall script reports {}",
                    if enabled { "ENABLED" } else { "DISABLED" }
                )
            }),

            Command::Restart => controller
                .restart_service()
                .map(|()| "Proxy service restarted".to_string()),

            Command::ServiceStatus => controller.service_status().map(|report| {
                self.report_text(&report);
                "Proxy service status".to_string()
            }),

            Command::Logs => controller.service_logs().map(|report| {
                self.report_text(&report);
                "Recent proxy service logs".to_string()
            }),

            Command::Help => {
                self.report_text(&HELP.join("\n"));
                Ok("Commands".to_string())
            }
        };

        match result {
            Ok(message) => self.reporter.reply(ReplyKind::Done, message),
            Err(e) => self.report_error(&e),
        }
    }

    fn report_text(&self, text: &str) {
        for line in text.lines() {
            self.reporter.reply(ReplyKind::Detail, line);
        }
    }

    fn report_error(&self, error: &CoreError) {
        if !error.is_failure() {
            self.reporter.reply(ReplyKind::NoOp, error);
            return;
        }

        self.reporter
            .reply(ReplyKind::Failed, format!("{}: {}", error.kind(), error));

        if let CoreError::RuleEdit { .. } = error {
            self.reporter.reply(
                ReplyKind::Detail,
                "Firewall state may differ from what was requested, check with 'list'",
            );
        }
    }

    async fn report_expiries(self: Arc<Self>, mut events: broadcast::Receiver<GrantExpired>) {
        loop {
            match events.recv().await {
                Ok(GrantExpired {
                    outcome: Ok(()), ..
                }) => self
                    .reporter
                    .reply(ReplyKind::Notice, "Access grant expired, access disabled"),
                Ok(GrantExpired {
                    outcome: Err(e), ..
                }) => self.reporter.reply(
                    ReplyKind::Notice,
                    format!(
                        "Access grant expired, but disabling failed: {}: {}",
                        e.kind(),
                        e
                    ),
                ),
                Err(RecvError::Lagged(n)) => {
                    log::warn!("Missed {} grant expiry notification(s)", n)
                }
                Err(RecvError::Closed) => return,
            }
        }
    }
}
