use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use time::Duration;

const DEFAULT_AUTH_COOKIE_NAME: &str = "listhub_auth";

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(SocketAddr, listhub::config::AppConfig),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    if let Some(Command::AuthKey) = cli.command {
        let code = run_auth_key();
        return RunOutcome::Exit(code);
    }
    if let Some(Command::HashPassword(args)) = cli.command {
        let code = run_hash_password(args);
        return RunOutcome::Exit(code);
    }

    let users_path = match cli.users.as_ref() {
        Some(path) => path.clone(),
        None => {
            eprintln!("error: --users is required unless using a subcommand");
            return RunOutcome::Exit(2);
        }
    };
    let users = match listhub::users::UserRegistry::load(&users_path) {
        Ok(users) => users,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };
    if users.is_empty() {
        eprintln!("error: user registry {} has no users", users_path.display());
        return RunOutcome::Exit(2);
    }

    let service_url = match cli.service_url.as_ref() {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            eprintln!("error: --service-url is required unless using a subcommand");
            return RunOutcome::Exit(2);
        }
    };

    let auth = match resolve_auth_config(&cli) {
        Ok(auth) => auth,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    RunOutcome::Serve(
        cli.listen,
        listhub::config::AppConfig {
            app_name: cli.app_name,
            settings_path: cli.settings,
            service_url,
            users,
            auth,
        },
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "listhub",
    version,
    about = "Small mailing list subscription portal"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    #[arg(long, default_value = "Listhub")]
    app_name: String,
    /// TOML user registry (see `hash-password` for the hash field).
    #[arg(long)]
    users: Option<PathBuf>,
    /// Mutable settings file; created on first save.
    #[arg(long, default_value = "settings.toml")]
    settings: PathBuf,
    /// Base URL of the remote list-management service.
    #[arg(long, env = "LISTHUB_SERVICE_URL")]
    service_url: Option<String>,
    #[arg(long, env = "LISTHUB_AUTH_KEY")]
    auth_key: Option<String>,
    #[arg(long, env = "LISTHUB_AUTH_TOKEN_TTL")]
    auth_token_ttl: Option<String>,
    #[arg(long, env = "LISTHUB_AUTH_COOKIE_NAME")]
    auth_cookie_name: Option<String>,
    #[arg(long, env = "LISTHUB_AUTH_COOKIE_SECURE")]
    auth_cookie_secure: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a signing key for --auth-key.
    AuthKey,
    /// Hash a password for the user registry.
    HashPassword(HashPasswordArgs),
}

#[derive(Args, Debug)]
struct HashPasswordArgs {
    password: String,
}

fn run_auth_key() -> i32 {
    let secret = match listhub::auth::generate_auth_key() {
        Ok(secret) => secret,
        Err(err) => {
            eprintln!("failed to generate auth key: {err}");
            return 1;
        }
    };
    println!("{secret}");
    0
}

fn run_hash_password(args: HashPasswordArgs) -> i32 {
    let hash = match listhub::auth::hash_password(&args.password) {
        Ok(hash) => hash,
        Err(err) => {
            eprintln!("failed to hash password: {err}");
            return 1;
        }
    };
    println!("{hash}");
    0
}

fn resolve_auth_config(cli: &Cli) -> Result<listhub::config::AuthConfig, String> {
    let auth_key = cli
        .auth_key
        .as_ref()
        .ok_or("--auth-key (or LISTHUB_AUTH_KEY) is required; generate one with `listhub auth-key`")?
        .trim();
    if auth_key.is_empty() {
        return Err("auth key cannot be empty".to_string());
    }

    if let Some(name) = cli.auth_cookie_name.as_deref()
        && name.trim().is_empty()
    {
        return Err("auth cookie name cannot be empty".to_string());
    }

    let token_ttl = match cli.auth_token_ttl.as_deref() {
        Some(raw) => parse_auth_token_ttl(raw)?,
        None => default_auth_token_ttl(),
    };
    let cookie_name = cli
        .auth_cookie_name
        .as_deref()
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| DEFAULT_AUTH_COOKIE_NAME.to_string());

    Ok(listhub::config::AuthConfig {
        key: auth_key.to_string(),
        token_ttl,
        cookie_name,
        cookie_secure: cli.auth_cookie_secure,
    })
}

fn default_auth_token_ttl() -> Duration {
    Duration::days(14)
}

fn parse_auth_token_ttl(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("auth token ttl cannot be empty".to_string());
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"))?;

    if amount <= 0 {
        return Err("auth token ttl must be greater than 0".to_string());
    }

    match unit {
        's' => Ok(Duration::seconds(amount)),
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(format!(
            "invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"
        )),
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            command: None,
            listen: "127.0.0.1:3000".parse().expect("listen addr"),
            app_name: "Listhub".to_string(),
            users: Some(PathBuf::from("users.toml")),
            settings: PathBuf::from("settings.toml"),
            service_url: Some("http://lists.example".to_string()),
            auth_key: None,
            auth_token_ttl: None,
            auth_cookie_name: None,
            auth_cookie_secure: false,
        }
    }

    #[test]
    fn parse_auth_token_ttl__should_parse_seconds_when_unit_missing() {
        // When
        let duration = parse_auth_token_ttl("30").expect("parse ttl");

        // Then
        assert_eq!(duration, Duration::seconds(30));
    }

    #[test]
    fn parse_auth_token_ttl__should_parse_units() {
        // When
        let duration = parse_auth_token_ttl("15m").expect("parse ttl");

        // Then
        assert_eq!(duration, Duration::minutes(15));
    }

    #[test]
    fn parse_auth_token_ttl__should_reject_invalid_values() {
        // Then
        assert!(parse_auth_token_ttl("").is_err());
        assert!(parse_auth_token_ttl("0").is_err());
        assert!(parse_auth_token_ttl("abc").is_err());
    }

    #[test]
    fn resolve_auth_config__should_require_auth_key() {
        // Given
        let cli = base_cli();

        // When
        let result = resolve_auth_config(&cli);

        // Then
        assert!(result.is_err());
    }

    #[test]
    fn resolve_auth_config__should_apply_defaults_when_auth_key_present() {
        // Given
        let mut cli = base_cli();
        cli.auth_key = Some("base64-key".to_string());

        // When
        let config = resolve_auth_config(&cli).expect("resolve auth config");

        // Then
        assert_eq!(config.key, "base64-key");
        assert_eq!(config.token_ttl, default_auth_token_ttl());
        assert_eq!(config.cookie_name, DEFAULT_AUTH_COOKIE_NAME);
        assert!(!config.cookie_secure);
    }
}
