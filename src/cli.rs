use anyhow::{Result, anyhow, bail};
use std::path::PathBuf;

pub const USAGE: &str =
    "Usage: pdf-narrator <path-to-pdf-or-txt> [--config <path>] [--events-json]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub path: PathBuf,
    pub config_path: PathBuf,
    /// Print caller-facing events as JSON lines instead of readable text.
    pub events_json: bool,
}

/// Parse arguments (without the program name).
pub fn parse_args<I>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut path: Option<PathBuf> = None;
    let mut config_path = PathBuf::from("conf/config.toml");
    let mut events_json = false;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow!("--config requires a path\n{USAGE}"))?;
            }
            "--events-json" => events_json = true,
            "-h" | "--help" => bail!(USAGE),
            other if other.starts_with("--") => bail!("Unknown option {other}\n{USAGE}"),
            other => {
                if path.is_some() {
                    bail!("Only one document can be read at a time\n{USAGE}");
                }
                path = Some(PathBuf::from(other));
            }
        }
    }

    let path = path.ok_or_else(|| anyhow!(USAGE))?;
    Ok(CliArgs {
        path,
        config_path,
        events_json,
    })
}
