use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use galley::backend::HttpBackend;
use galley::core::auth;
use galley::core::config::{self, ResolvedConfig, galley_dir};
use galley::core::manager::EndReason;
use galley::core::session::SessionStore;
use log::{error, info};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

#[derive(Parser)]
#[command(name = "galley", version, about = "Terminal client for a recipe-assistant chat service")]
struct Args {
    /// Server base URL (overrides GALLEY_SERVER_URL and the config file)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Open the chat (default)
    Chat,
    /// Sign in and remember the session
    Login {
        username: String,
        /// Prompted for when not given
        #[arg(long, env = "GALLEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Register {
        username: String,
        #[arg(long)]
        email: Option<String>,
        /// Prompted for when not given
        #[arg(long, env = "GALLEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
}

/// Loads `.env` (or `env_file`) first so env-backed arguments can read it.
fn load_args<I, T>(env_file: Option<&Path>, argv: I) -> Result<Args, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match env_file {
        Some(path) => {
            dotenv::from_path(path).ok();
        }
        None => {
            dotenv::dotenv().ok();
        }
    }
    Args::try_parse_from(argv)
}

fn init_logging() {
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let path = galley_dir()
        .filter(|dir| fs::create_dir_all(dir).is_ok())
        .map(|dir| dir.join("galley.log"))
        .unwrap_or_else(|| "galley.log".into());
    if let Ok(log_file) = File::create(path) {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }
}

fn read_password() -> io::Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn password_or_prompt(password: Option<String>) -> Result<String, ExitCode> {
    match password {
        Some(p) => Ok(p),
        None => read_password().map_err(|e| {
            eprintln!("galley: could not read password: {e}");
            ExitCode::FAILURE
        }),
    }
}

async fn login(
    config: &ResolvedConfig,
    mut store: SessionStore,
    username: &str,
    password: Option<String>,
) -> ExitCode {
    let password = match password_or_prompt(password) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let backend = HttpBackend::new(config.base_url.clone());
    match auth::login(&backend, &mut store, username, &password).await {
        Ok(credentials) => {
            println!("{}", config.language.logged_in(&credentials.display_name));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Login failed: {}", e);
            eprintln!("galley: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn register(
    config: &ResolvedConfig,
    mut store: SessionStore,
    username: &str,
    email: Option<&str>,
    password: Option<String>,
) -> ExitCode {
    let password = match password_or_prompt(password) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let backend = HttpBackend::new(config.base_url.clone());
    match auth::register(&backend, &mut store, username, email, &password).await {
        Ok(credentials) => {
            println!("{}", config.language.logged_in(&credentials.display_name));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Registration failed: {}", e);
            eprintln!("galley: {e}");
            ExitCode::FAILURE
        }
    }
}

fn chat(config: &ResolvedConfig, store: SessionStore) -> ExitCode {
    if !store.get().is_logged_in() {
        eprintln!("{}", config.language.not_logged_in());
        return ExitCode::FAILURE;
    }
    match galley::tui::run(config, store) {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(EndReason::Logout)) => {
            println!("{}", config.language.logged_out());
            ExitCode::SUCCESS
        }
        Ok(Some(EndReason::Expired)) => {
            eprintln!("{}", config.language.session_expired());
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Terminal error: {}", e);
            eprintln!("galley: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = load_args(None, std::env::args_os()).unwrap_or_else(|e| e.exit());
    init_logging();

    let file_config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("galley: {e}");
            return ExitCode::FAILURE;
        }
    };
    let config = config::resolve(&file_config, args.server.as_deref());
    info!(
        "Galley starting (server {}, language {:?})",
        config.base_url, config.language
    );

    let store = SessionStore::open(
        config
            .session_path
            .clone()
            .unwrap_or_else(SessionStore::default_path),
    );

    match args.command.unwrap_or(Cmd::Chat) {
        Cmd::Chat => chat(&config, store),
        Cmd::Login { username, password } => login(&config, store, &username, password).await,
        Cmd::Register {
            username,
            email,
            password,
        } => register(&config, store, &username, email.as_deref(), password).await,
        Cmd::Logout => {
            let mut store = store;
            match auth::logout(&mut store) {
                Ok(()) => {
                    println!("{}", config.language.logged_out());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("galley: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_from_env_file_reaches_login() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        fs::write(&env_file, "GALLEY_PASSWORD=desde-env\n").unwrap();

        let args = load_args(Some(&env_file), ["galley", "login", "ana"]).unwrap();
        match args.command {
            Some(Cmd::Login { username, password }) => {
                assert_eq!(username, "ana");
                assert_eq!(password.as_deref(), Some("desde-env"));
            }
            _ => panic!("expected the login command"),
        }
    }

    #[test]
    fn chat_is_the_default_command() {
        let args = load_args(None, ["galley", "--server", "http://localhost:9"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.server.as_deref(), Some("http://localhost:9"));
    }
}
