mod listing;

use crate::error::{describe_failure, CoreError};
use crate::executor::{run_checked, CommandOutput, Executor};
use crate::source_address::SourceAddress;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Accept,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    Any,
    Address(SourceAddress),
}

/// One guarded-port entry of the firewall chain.
///
/// `position` is only valid until the next edit of the chain by anyone, so it is never kept
/// across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub position: usize,
    pub action: RuleAction,
    pub source: RuleSource,
    pub port: u16,
}

impl Rule {
    fn is_drop_all(&self) -> bool {
        self.action == RuleAction::Drop && self.source == RuleSource::Any
    }

    /// iptables lists any `/0` source as `0.0.0.0/0`, which is parsed as [`RuleSource::Any`].
    fn accepts(&self, address: &SourceAddress) -> bool {
        if self.action != RuleAction::Accept {
            return false;
        }
        match self.source {
            RuleSource::Address(source) => source.matches(address),
            RuleSource::Any => address.is_any(),
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "ACCEPT"),
            Self::Drop => write!(f, "DROP"),
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Address(address) => write!(f, "{}", address),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:>3}  {:<6} {} -> tcp/{}",
            self.position, self.action, self.source, self.port
        )
    }
}

#[derive(Debug, Clone)]
pub struct RuleStoreConfig {
    pub iptables: String,
    pub persist_program: String,
    pub chain: String,
    pub port: u16,
}

/// Allow-list edits on the iptables chain guarding one port.
///
/// Every edit re-lists the chain first; nothing about the chain is cached. Calls are not
/// serialized against each other.
pub struct RuleStore {
    executor: Arc<dyn Executor>,
    config: RuleStoreConfig,
}

impl RuleStore {
    pub fn new(executor: Arc<dyn Executor>, config: RuleStoreConfig) -> Self {
        log::info!(
            "Guarding tcp port {} in chain \"{}\"",
            config.port,
            config.chain
        );
        Self { executor, config }
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Current guarded-port rules, in chain order.
    pub fn list(&self) -> Result<Vec<Rule>, CoreError> {
        self.list_for("all sources")
    }

    /// `address` only names the request in error messages.
    fn list_for(&self, address: &str) -> Result<Vec<Rule>, CoreError> {
        let output = self.run(
            "list",
            address,
            &[
                &self.config.iptables,
                "-L",
                &self.config.chain,
                "-n",
                "--line-numbers",
            ],
        )?;
        Ok(listing::parse_listing(&output.stdout, self.config.port))
    }

    /// Lets `address` through, ahead of the DROP-all rule if there is one.
    pub fn allow(&self, address: &str) -> Result<(), CoreError> {
        let address = SourceAddress::parse(address)?;
        let source = address.to_string();
        let port = self.config.port.to_string();

        let drop_all = self.list_for(&source)?.into_iter().find(Rule::is_drop_all);

        match drop_all {
            Some(drop_all) => {
                let position = drop_all.position.to_string();
                self.run(
                    "insert",
                    &source,
                    &[
                        &self.config.iptables,
                        "-I",
                        &self.config.chain,
                        &position,
                        "-p",
                        "tcp",
                        "--dport",
                        &port,
                        "-s",
                        &source,
                        "-j",
                        "ACCEPT",
                    ],
                )?;
            }
            None => {
                self.run(
                    "append",
                    &source,
                    &[
                        &self.config.iptables,
                        "-A",
                        &self.config.chain,
                        "-p",
                        "tcp",
                        "--dport",
                        &port,
                        "-s",
                        &source,
                        "-j",
                        "ACCEPT",
                    ],
                )?;
            }
        }

        self.persist(&source)?;
        log::info!("Allowed {} on port {}", source, port);
        Ok(())
    }

    /// Removes the first ACCEPT rule for `address`. Yields [`CoreError::NotFound`] if there is
    /// none.
    pub fn revoke(&self, address: &str) -> Result<(), CoreError> {
        let address = SourceAddress::parse(address)?;
        let source = address.to_string();

        let Some(rule) = self.list_for(&source)?.into_iter().find(|r| r.accepts(&address)) else {
            return Err(CoreError::NotFound {
                address: source,
                port: self.config.port,
            });
        };

        let position = rule.position.to_string();
        self.run(
            "delete",
            &source,
            &[&self.config.iptables, "-D", &self.config.chain, &position],
        )?;

        self.persist(&source)?;
        log::info!("Revoked {} on port {}", source, self.config.port);
        Ok(())
    }

    /// After this fails the running chain and the saved rules differ; callers should re-list.
    fn persist(&self, address: &str) -> Result<(), CoreError> {
        self.run("save", address, &[&self.config.persist_program, "save"])
            .map(|_| ())
    }

    fn run(
        &self,
        command: &'static str,
        address: &str,
        argv: &[&str],
    ) -> Result<CommandOutput, CoreError> {
        run_checked(self.executor.as_ref(), argv).map_err(|output| CoreError::RuleEdit {
            command,
            address: address.to_string(),
            detail: describe_failure(&output),
        })
    }
}
