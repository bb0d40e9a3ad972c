pub mod dry_run;
#[cfg(test)]
pub mod fake;
pub mod system;

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` if the process was terminated by a signal
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs an external program by argument vector. Never goes through a shell.
///
/// Implementations block until the program exits. `Err` means the program could not be started
/// at all.
pub trait Executor: Send + Sync {
    fn run(&self, argv: &[&str]) -> std::io::Result<CommandOutput>;
}

/// Runs `argv` and collapses "could not start" and "non-zero exit" into one error value, keeping
/// the raw result for error reporting.
pub fn run_checked(
    executor: &dyn Executor,
    argv: &[&str],
) -> Result<CommandOutput, std::io::Result<CommandOutput>> {
    match executor.run(argv) {
        Ok(output) if output.success() => Ok(output),
        other => Err(other),
    }
}
