use std::env;
use std::path::PathBuf;

use crate::auth::PasswordGate;

pub const DEFAULT_BIND: &str = "127.0.0.1:8501";
pub const PASSWORD_ENV: &str = "FEATHERPACK_PASSWORD_SHA256";

/// Runtime settings for the server and the CLI.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the gear list files.
    pub dir: PathBuf,
    /// Address the web server listens on.
    pub bind: String,
    pub gate: PasswordGate,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dir: PathBuf::from("."),
            bind: DEFAULT_BIND.to_string(),
            gate: PasswordGate::default(),
        }
    }
}

impl Config {
    /// Parse `--dir`, `--bind` and `--password-sha256` flags. Anything that
    /// is not a flag is returned as a positional argument. The password
    /// digest falls back to the `FEATHERPACK_PASSWORD_SHA256` environment
    /// variable.
    pub fn from_args<I>(args: I) -> Result<(Config, Vec<String>), String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut positional = Vec::new();
        let mut digest = env::var(PASSWORD_ENV).ok();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--dir" => {
                    config.dir = PathBuf::from(args.next().ok_or("--dir needs a path")?);
                }
                "--bind" => {
                    config.bind = args.next().ok_or("--bind needs an address")?;
                }
                "--password-sha256" => {
                    digest = Some(args.next().ok_or("--password-sha256 needs a digest")?);
                }
                flag if flag.starts_with("--") => {
                    return Err(format!("Unknown flag: {}", flag));
                }
                _ => positional.push(arg),
            }
        }

        if let Some(digest) = digest {
            config.gate = PasswordGate::from_digest(&digest)
                .ok_or_else(|| "Password digest must be 64 hex characters".to_string())?;
        }

        Ok((config, positional))
    }
}
