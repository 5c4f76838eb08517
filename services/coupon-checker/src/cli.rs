//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// IIJmio coupon checker
#[derive(Parser, Debug)]
#[command(name = "iijmio-coupon", version, about = "Check and switch IIJmio coupon usage")]
pub struct Cli {
    /// Config file (default: iijmio-coupon.toml)
    #[arg(long, env = "CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Authorize in the browser and store the access token
    Auth,
    /// Print coupon information as JSON
    Show,
    /// Enable or disable coupon use for a line
    Switch {
        /// hdoServiceCode of the line
        hdo_service_code: String,
        state: SwitchState,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    pub fn enabled(self) -> bool {
        self == SwitchState::On
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_simple_commands() {
        let cli = Cli::try_parse_from(["iijmio-coupon", "auth"]).unwrap();
        assert_eq!(cli.command, Command::Auth);
        let cli = Cli::try_parse_from(["iijmio-coupon", "show"]).unwrap();
        assert_eq!(cli.command, Command::Show);
    }

    #[test]
    fn parses_switch() {
        let cli = Cli::try_parse_from(["iijmio-coupon", "switch", "hdo1234", "off"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Switch {
                hdo_service_code: "hdo1234".into(),
                state: SwitchState::Off,
            }
        );
        assert!(SwitchState::On.enabled());
        assert!(!SwitchState::Off.enabled());
    }

    #[test]
    fn config_flag_before_or_after_command() {
        let cli =
            Cli::try_parse_from(["iijmio-coupon", "show", "--config", "/etc/iijmio.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/iijmio.toml")));

        let cli = Cli::try_parse_from(["iijmio-coupon", "--config", "a.toml", "auth"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
        assert_eq!(cli.command, Command::Auth);
    }

    #[test]
    fn rejects_bad_input() {
        for args in [
            &["iijmio-coupon"][..],
            &["iijmio-coupon", "status"],
            &["iijmio-coupon", "switch", "hdo1"],
            &["iijmio-coupon", "switch", "hdo1", "maybe"],
            &["iijmio-coupon", "show", "--config"],
            &["iijmio-coupon", "show", "--verbose"],
        ] {
            assert!(Cli::try_parse_from(args).is_err(), "accepted: {args:?}");
        }
    }
}
