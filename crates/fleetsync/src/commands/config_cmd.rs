//! Config subcommand handlers.

use fleetsync_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Copy of the config with plaintext tokens masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(REDACTED.into());
        }
    }
    cfg
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(
                &fleetsync_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = fleetsync_config::load_config()?;
            let rendered = toml::to_string_pretty(&redacted(&cfg))?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fleetsync_config::Profile;

    use super::*;

    #[test]
    fn show_masks_plaintext_tokens() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                server: "https://fleet.example.com".into(),
                token: Some("s3cret".into()),
                ..Profile::default()
            },
        );

        let rendered = toml::to_string_pretty(&redacted(&cfg)).unwrap();
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains(REDACTED));
        assert!(rendered.contains("fleet.example.com"));
    }
}
