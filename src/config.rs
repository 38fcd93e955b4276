use clap::Parser;
use std::{path::PathBuf, time::Duration};

/// Native control panel for the Automatic Report Generator.
#[derive(Debug, Clone, Parser)]
#[command(name = "argpanel", version, about)]
pub struct Config {
    /// Base url of the ARG service.
    #[arg(long, env = "ARGPANEL_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Keep the session in this file so it survives restarts. In memory when omitted.
    #[arg(long, env = "ARGPANEL_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Request timeout; runs can take minutes.
    #[arg(long = "timeout-secs", default_value_t = 600, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use clap::Parser;

    #[test]
    fn defaults_apply_without_arguments() {
        let config = Config::try_parse_from(["argpanel"]).unwrap();
        assert_eq!(config.timeout_secs, 600);
        assert!(config.api_url.starts_with("http"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Config::try_parse_from(["argpanel", "--timeout-secs", "0"]).is_err());
    }

    #[test]
    fn session_file_is_optional() {
        let config =
            Config::try_parse_from(["argpanel", "--session-file", "/tmp/session.json"]).unwrap();
        assert_eq!(
            config.session_file.as_deref(),
            Some(std::path::Path::new("/tmp/session.json"))
        );
    }
}
