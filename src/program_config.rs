use clap::{Args, Parser, ValueEnum};

#[derive(Debug, Parser)]
#[clap(name = "proxy-gate")]
pub struct ProgramConfig {
    #[clap(flatten)]
    pub firewall: FirewallConfig,

    #[clap(flatten)]
    pub service: ServiceConfig,

    /// How often a running countdown checks whether it was superseded, in seconds
    #[clap(
        long,
        env = "PROXY_GATE_POLL_INTERVAL",
        default_value = "5",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,

    /// How external commands are run
    #[clap(
        long,
        env = "PROXY_GATE_EXECUTOR",
        value_enum,
        ignore_case = true,
        default_value = "system"
    )]
    pub executor: ExecutorKind,
}

#[derive(Debug, Args)]
pub struct FirewallConfig {
    /// TCP port of the proxy whose access is managed
    #[clap(long, env = "PROXY_GATE_PORT", default_value = "1080")]
    pub port: u16,

    /// Firewall chain holding the port's rules
    #[clap(long, env = "PROXY_GATE_CHAIN", default_value = "INPUT")]
    pub chain: String,

    /// Path to the iptables binary
    #[clap(long, env = "PROXY_GATE_IPTABLES", default_value = "/usr/sbin/iptables")]
    pub iptables: String,

    /// Program invoked as `<program> save` after every rule edit
    #[clap(
        long,
        env = "PROXY_GATE_PERSIST_PROGRAM",
        default_value = "/usr/sbin/netfilter-persistent"
    )]
    pub persist_program: String,

    /// Script invoked as `<script> enable|disable|status` to open or close the port for everyone
    #[clap(long, env = "PROXY_GATE_SWITCH_SCRIPT")]
    pub switch_script: String,
}

#[derive(Debug, Args)]
pub struct ServiceConfig {
    /// systemd unit of the proxy service
    #[clap(long, env = "PROXY_GATE_SERVICE_UNIT", default_value = "danted")]
    pub service_unit: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[allow(non_camel_case_types)]
pub enum ExecutorKind {
    system,
    dry_run,
}

impl ProgramConfig {
    pub fn parse() -> Self {
        Parser::parse()
    }
}
