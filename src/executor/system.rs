use crate::executor::{CommandOutput, Executor};
use std::process::Command;

pub struct SystemExecutor {
    _priv: (),
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

impl Executor for SystemExecutor {
    fn run(&self, argv: &[&str]) -> std::io::Result<CommandOutput> {
        let Some((program, args)) = argv.split_first() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty argument vector",
            ));
        };

        let output = match Command::new(program).args(args).output() {
            Ok(output) => output,
            Err(e) => {
                log::error!("Failed to start {}: {}", program, e);
                return Err(e);
            }
        };

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        };

        if output.success() {
            log::debug!("'{}' succeeded", argv.join(" "));
        } else {
            log::error!(
                "'{}' failed: [{:?}] {}",
                argv.join(" "),
                output.status,
                output.stderr.trim_end()
            );
        }

        Ok(output)
    }
}
