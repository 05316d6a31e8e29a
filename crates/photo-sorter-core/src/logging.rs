use log::LevelFilter;

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Initialize console logging. The default level is Info, or Warn when the
/// run is quiet; a parseable `PHOTOS_LOG` environment variable overrides
/// either, in both directions.
pub fn init_logger(quiet: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = resolve_level(quiet, std::env::var("PHOTOS_LOG").ok().as_deref());

    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{h({l})} Photos: {m}{n}")))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(Root::builder().appender("console").build(level))
        .map_err(|e| format!("Failed to build log config: {}", e))?;

    log4rs::init_config(config).map_err(|e| format!("Failed to initialize log4rs: {}", e))?;
    Ok(())
}

// The root must be built at the final level: the facade's max-level can
// only restrict below what the root allows, never raise it.
fn resolve_level(quiet: bool, env_override: Option<&str>) -> LevelFilter {
    env_override
        .and_then(|v| v.parse().ok())
        .unwrap_or(if quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        })
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override_raises_verbosity() {
        assert_eq!(resolve_level(false, Some("debug")), LevelFilter::Debug);
        assert_eq!(resolve_level(true, Some("trace")), LevelFilter::Trace);
    }

    #[test]
    fn test_env_override_lowers_verbosity() {
        assert_eq!(resolve_level(false, Some("error")), LevelFilter::Error);
    }

    #[test]
    fn test_defaults_without_override() {
        assert_eq!(resolve_level(false, None), LevelFilter::Info);
        assert_eq!(resolve_level(true, None), LevelFilter::Warn);
        assert_eq!(resolve_level(false, Some("not-a-level")), LevelFilter::Info);
    }
}
