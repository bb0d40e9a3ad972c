//! In-memory stand-in for iptables, the master switch script and the service manager.

use crate::executor::{CommandOutput, Executor};
use parking_lot::Mutex;
use std::collections::HashSet;

pub const IPTABLES: &str = "/usr/sbin/iptables";
pub const PERSIST: &str = "/usr/sbin/netfilter-persistent";
pub const SWITCH: &str = "/opt/proxy/firewall.sh";
pub const CHAIN: &str = "INPUT";
pub const PORT: u16 = 1080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRule {
    pub target: String,
    pub source: String,
    pub dport: Option<u16>,
}

impl FakeRule {
    pub fn new(target: &str, source: &str, dport: Option<u16>) -> Self {
        Self {
            target: target.to_string(),
            source: source.to_string(),
            dport,
        }
    }
}

#[derive(Default)]
struct FakeState {
    chain: Vec<FakeRule>,
    switch_enabled: bool,
    service_active: bool,
    calls: Vec<Vec<String>>,
    failing: HashSet<String>,
}

pub struct FakeFirewall {
    state: Mutex<FakeState>,
}

impl FakeFirewall {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                service_active: true,
                ..FakeState::default()
            }),
        }
    }

    /// Chain with an SSH rule, then the usual "drop everyone else" rule for the guarded port.
    pub fn with_drop_all() -> Self {
        let fake = Self::new();
        fake.push_rule(FakeRule::new("ACCEPT", "0.0.0.0/0", Some(22)));
        fake.push_rule(FakeRule::new("DROP", "0.0.0.0/0", Some(PORT)));
        fake
    }

    pub fn push_rule(&self, rule: FakeRule) {
        self.state.lock().chain.push(rule);
    }

    pub fn rules(&self) -> Vec<FakeRule> {
        self.state.lock().chain.clone()
    }

    /// Makes every command of the given family fail, e.g. `-I`, `save`, `disable`, `restart`.
    pub fn fail(&self, family: &str) {
        self.state.lock().failing.insert(family.to_string());
    }

    pub fn recover(&self, family: &str) {
        self.state.lock().failing.remove(family);
    }

    pub fn set_service_active(&self, active: bool) {
        self.state.lock().service_active = active;
    }

    pub fn switch_enabled(&self) -> bool {
        self.state.lock().switch_enabled
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state.lock().calls.clone()
    }

    pub fn count_calls(&self, family: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|argv| command_family(argv) == family)
            .count()
    }

    fn listing(chain: &[FakeRule]) -> String {
        let mut out = format!(
            "Chain {} (policy ACCEPT)\nnum  target     prot opt source               destination\n",
            CHAIN
        );
        for (i, rule) in chain.iter().enumerate() {
            let extra = match rule.dport {
                Some(port) => format!("tcp dpt:{}", port),
                None => String::new(),
            };
            out.push_str(&format!(
                "{:<4} {:<10} {:<4} {:<3} {:<20} {:<20} {}\n",
                i + 1,
                rule.target,
                "tcp",
                "--",
                rule.source,
                "0.0.0.0/0",
                extra
            ));
        }
        out
    }

    fn rule_from_args(args: &[String]) -> FakeRule {
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        FakeRule {
            target: value_of("-j").unwrap_or_default(),
            source: value_of("-s").unwrap_or_else(|| "0.0.0.0/0".to_string()),
            dport: value_of("--dport").and_then(|p| p.parse().ok()),
        }
    }

    fn iptables(state: &mut FakeState, argv: &[String]) -> Result<String, String> {
        match argv.get(1).map(String::as_str) {
            Some("-L") => Ok(Self::listing(&state.chain)),
            Some("-A") => {
                let rule = Self::rule_from_args(&argv[3..]);
                state.chain.push(rule);
                Ok(String::new())
            }
            Some("-I") => {
                let position: usize = argv[3].parse().map_err(|_| "Bad position".to_string())?;
                if position == 0 || position > state.chain.len() + 1 {
                    return Err("iptables: Index of insertion too big.".to_string());
                }
                let rule = Self::rule_from_args(&argv[4..]);
                state.chain.insert(position - 1, rule);
                Ok(String::new())
            }
            Some("-D") => {
                let position: usize = argv[3].parse().map_err(|_| "Bad position".to_string())?;
                if position == 0 || position > state.chain.len() {
                    return Err("iptables: Index of deletion too big.".to_string());
                }
                state.chain.remove(position - 1);
                Ok(String::new())
            }
            _ => Err("unsupported iptables invocation".to_string()),
        }
    }
}

fn command_family(argv: &[String]) -> &str {
    if argv.first().map(String::as_str) == Some(IPTABLES) {
        argv.get(1).map(String::as_str).unwrap_or("")
    } else {
        argv.iter()
            .skip(1)
            .find(|a| !a.starts_with('-'))
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl Executor for FakeFirewall {
    fn run(&self, argv: &[&str]) -> std::io::Result<CommandOutput> {
        let argv = argv.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        let mut state = self.state.lock();
        state.calls.push(argv.clone());

        let failure = |stderr: String| {
            Ok(CommandOutput {
                stdout: String::new(),
                stderr,
                status: Some(1),
            })
        };

        if state.failing.contains(command_family(&argv)) {
            return failure(format!("{}: simulated failure", argv[0]));
        }

        let result = match argv[0].as_str() {
            IPTABLES => Self::iptables(&mut state, &argv),
            PERSIST => Ok(String::new()),
            SWITCH => match argv.get(1).map(String::as_str) {
                Some("enable") => {
                    state.switch_enabled = true;
                    Ok(String::new())
                }
                Some("disable") => {
                    state.switch_enabled = false;
                    Ok(String::new())
                }
                Some("status") => Ok(if state.switch_enabled {
                    "SOCKS proxy: ENABLED\n".to_string()
                } else {
                    "SOCKS proxy: DISABLED\n".to_string()
                }),
                _ => Err("usage: firewall.sh enable|disable|status".to_string()),
            },
            "/usr/bin/systemctl" => match argv.get(1).map(String::as_str) {
                Some("restart") => {
                    state.service_active = true;
                    Ok(String::new())
                }
                Some("is-active") if state.service_active => Ok("active\n".to_string()),
                Some("is-active") => {
                    return Ok(CommandOutput {
                        stdout: "failed\n".to_string(),
                        stderr: String::new(),
                        status: Some(3),
                    })
                }
                Some("status") => Ok(format!(
                    "* {}.service\n   Active: active (running)\n",
                    argv[2]
                )),
                _ => Err("unsupported systemctl invocation".to_string()),
            },
            "/usr/bin/journalctl" => Ok("Oct 19 10:00:00 host danted[42]: info: started\n".to_string()),
            _ => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "No such file or directory",
                ))
            }
        };

        match result {
            Ok(stdout) => Ok(CommandOutput {
                stdout,
                stderr: String::new(),
                status: Some(0),
            }),
            Err(stderr) => failure(stderr),
        }
    }
}
