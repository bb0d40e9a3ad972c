use anyhow::{anyhow, bail, Context};
use std::str::FromStr;
use tokio::time::Duration;

/// Longest grant the console accepts: one year.
pub const MAX_DURATION: Duration = Duration::from_secs(366 * 24 * 3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Allow(String),
    Revoke(String),
    List,
    Enable(Option<Duration>),
    Extend(Duration),
    Disable,
    Status,
    Probe,
    Restart,
    ServiceStatus,
    Logs,
    Help,
}

pub const HELP: &[&str] = &[
    "allow <address>[/prefix]   let a source reach the proxy",
    "revoke <address>[/prefix]  remove a source",
    "list                       show the port's firewall rules",
    "enable [duration]          open the proxy, optionally for a limited time",
    "extend <duration>          reset the deadline of an open proxy",
    "disable                    close the proxy",
    "status                     show grant state and remaining time",
    "probe                      ask the firewall script for its state",
    "restart                    restart the proxy service",
    "service-status             show the proxy service status",
    "logs                       show recent proxy service logs",
    "durations: 90, 90s, 45m, 3h",
];

/// Parses one console line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.split('#').next().unwrap_or_default().trim();

    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Ok(None);
    };
    let argument = tokens.next();
    if let Some(extra) = tokens.next() {
        bail!("Unexpected argument '{}'", extra);
    }

    let required = |what: &str| argument.ok_or_else(|| anyhow!("'{}' needs {}", verb, what));
    let no_argument = |command: Command| match argument {
        Some(argument) => Err(anyhow!("'{}' takes no argument, got '{}'", verb, argument)),
        None => Ok(command),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "allow" | "add" => Command::Allow(required("an address")?.to_string()),
        "revoke" | "remove" => Command::Revoke(required("an address")?.to_string()),
        "list" | "rules" => no_argument(Command::List)?,
        "enable" => Command::Enable(argument.map(parse_duration).transpose()?),
        "extend" | "timer" => Command::Extend(parse_duration(required("a duration")?)?),
        "disable" => no_argument(Command::Disable)?,
        "status" => no_argument(Command::Status)?,
        "probe" => no_argument(Command::Probe)?,
        "restart" => no_argument(Command::Restart)?,
        "service-status" => no_argument(Command::ServiceStatus)?,
        "logs" => no_argument(Command::Logs)?,
        "help" | "?" => no_argument(Command::Help)?,
        _ => bail!("Unknown command '{}', try 'help'", verb),
    };

    Ok(Some(command))
}

/// `90` and `90s` are seconds, `45m` minutes, `3h` hours. Zero and anything above
/// [`MAX_DURATION`] are rejected.
pub fn parse_duration(input: &str) -> anyhow::Result<Duration> {
    let (number, unit_seconds) = match input.char_indices().last() {
        Some((i, 's')) => (&input[..i], 1),
        Some((i, 'm')) => (&input[..i], 60),
        Some((i, 'h')) => (&input[..i], 3600),
        _ => (input, 1),
    };

    let number = u64::from_str(number).with_context(|| format!("Invalid duration '{}'", input))?;
    let seconds = number
        .checked_mul(unit_seconds)
        .ok_or_else(|| anyhow!("Duration '{}' is too long", input))?;

    if seconds == 0 {
        bail!("Duration must be longer than zero");
    }
    if seconds > MAX_DURATION.as_secs() {
        bail!(
            "Duration '{}' is too long, the limit is {}h",
            input,
            MAX_DURATION.as_secs() / 3600
        );
    }

    Ok(Duration::from_secs(seconds))
}

/// `HH:MM:SS`, hours not capped at 24.
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
