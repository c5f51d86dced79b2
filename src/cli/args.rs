//! Command-line argument parsing.

/// Options for streaming from an endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchOptions {
    /// Stream endpoint; derived from configuration when absent
    pub endpoint: Option<String>,
    /// Use a fixed retry delay instead of exponential backoff
    pub fixed: bool,
}

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Stream telemetry until interrupted (default)
    Watch(WatchOptions),
    /// Arguments could not be parsed
    Invalid(String),
}

/// Parse command-line arguments and return the appropriate command.
///
/// # Examples
///
/// ```
/// use benchscope::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["benchscope".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let mut options = WatchOptions::default();
    // Skip the program name
    let mut args = args.skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return CliCommand::Version,
            "--fixed" => options.fixed = true,
            "--endpoint" | "-e" => match args.next() {
                Some(endpoint) if !endpoint.starts_with('-') => {
                    options.endpoint = Some(endpoint)
                }
                _ => return CliCommand::Invalid(format!("{} requires a URL", arg)),
            },
            other => {
                if let Some(endpoint) = other.strip_prefix("--endpoint=") {
                    options.endpoint = Some(endpoint.to_string());
                } else {
                    return CliCommand::Invalid(format!("unknown argument '{}'", other));
                }
            }
        }
    }
    CliCommand::Watch(options)
}
