use crate::executor::{CommandOutput, Executor};

/// Logs commands instead of running them; every command "succeeds" with empty output.
pub struct DryRunExecutor {
    _priv: (),
}

impl DryRunExecutor {
    pub fn new() -> Self {
        log::warn!("Dry run: no firewall or service command will be executed");
        Self { _priv: () }
    }
}

impl Executor for DryRunExecutor {
    fn run(&self, argv: &[&str]) -> std::io::Result<CommandOutput> {
        log::info!("Would run '{}'", argv.join(" "));
        Ok(CommandOutput {
            status: Some(0),
            ..CommandOutput::default()
        })
    }
}
