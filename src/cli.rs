use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .usage(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}

/// Whether the invocation runs a single command and exits instead of serving
pub fn is_one_shot(args: &Args) -> bool {
    args.warm_once || args.list_config || args.new_api_domain.is_some() || args.version
}

/// Discovery events service
///
/// Aggregates program sessions from the sports-management API across a
/// tenant's organizations and serves them as cached event lists and
/// week schedules.
///
/// Routes:
/// - GET /events?slug=… or ?orgIds=…&apiKey=…
/// - GET /schedule?slug=…&weeks=…
/// - GET /cron/warm-discovery (bearer secret)
/// - DELETE /cache/discovery[/{slug}] (bearer secret)
#[derive(Parser, Debug, Default)]
#[command(about, long_about = None)]
#[command(disable_version_flag = true)]
#[command(styles = get_styles())]
pub struct Args {
    /// Path of the TOML config file. Overrides DISCOVERY_CONFIG.
    #[arg(long = "config-file", short = 'c', value_name = "PATH", help_heading = "Configuration")]
    pub config_file: Option<String>,

    /// Address to bind, e.g. 127.0.0.1:8080. Overrides the configured listen address.
    #[arg(long = "listen", value_name = "ADDR", help_heading = "Server")]
    pub listen: Option<String>,

    /// Run one warming pass, print the JSON summary and exit
    #[arg(long = "warm-once", help_heading = "Server")]
    pub warm_once: bool,

    /// Update the API domain in the config file
    #[arg(long = "set-api-domain", value_name = "API_DOMAIN", help_heading = "Configuration")]
    pub new_api_domain: Option<String>,

    /// List current configuration settings
    #[arg(long = "list-config", short = 'l', help_heading = "Configuration")]
    pub list_config: bool,

    /// Show version information
    #[arg(short = 'V', long = "version", help_heading = "Info")]
    pub version: bool,

    /// Log at debug level
    #[arg(long = "debug", help_heading = "Debug")]
    pub debug: bool,

    /// Specify a custom log file path. If not provided, logs will be written to the default location.
    #[arg(long = "log-file", help_heading = "Debug")]
    pub log_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_args() {
        let args = Args::parse_from(["discovery_events", "--listen", "127.0.0.1:8080", "--debug"]);
        assert_eq!(args.listen.as_deref(), Some("127.0.0.1:8080"));
        assert!(args.debug);
        assert!(!is_one_shot(&args));
    }

    #[test]
    fn test_one_shot_commands() {
        let warm = Args::parse_from(["discovery_events", "--warm-once", "-c", "/tmp/c.toml"]);
        assert!(is_one_shot(&warm));
        assert_eq!(warm.config_file.as_deref(), Some("/tmp/c.toml"));

        let domain = Args::parse_from(["discovery_events", "--set-api-domain", "api.example.com"]);
        assert!(is_one_shot(&domain));
        assert!(is_one_shot(&Args::parse_from(["discovery_events", "-l"])));
    }
}
