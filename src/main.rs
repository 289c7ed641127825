mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use mq_core::config::Config;
use mq_core::Role;

fn load_config(path: Option<&Path>, host: Option<String>, port: Option<u16>) -> Config {
    let mut config = Config::load_or_default(path);
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config
}

async fn start_server(config: Config) -> Result<()> {
    tracing::info!("Starting marquee");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    mq_server::start(config).await?;
    Ok(())
}

/// Create an admin account, or promote and re-password an existing one.
fn create_admin(
    config: &Config,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> Result<()> {
    mq_server::validation::username(username)?;
    mq_server::validation::password(password)?;
    if let Some(email) = email {
        mq_server::validation::email(email)?;
    }

    let db_path = &config.server.db_path;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let pool = mq_db::pool::init_pool(&db_path.to_string_lossy())?;
    let conn = mq_db::pool::get_conn(&pool)?;

    let hash = mq_server::routes::auth::hash_password(password, config.auth.bcrypt_cost)?;

    match mq_db::queries::users::get_user_by_username(&conn, username)? {
        Some(existing) => {
            mq_db::queries::users::update_user_role(&conn, existing.id, Role::Admin)?;
            mq_db::queries::users::update_password(&conn, existing.id, &hash)?;
            mq_db::queries::sessions::delete_user_sessions(&conn, existing.id, None)?;
            println!("Promoted existing user '{username}' to admin and reset the password");
        }
        None => {
            let user =
                mq_db::queries::users::create_user(&conn, username, email, &hash, Role::Admin)?;
            mq_db::queries::profiles::create_profile(
                &conn,
                user.id,
                &user.username,
                None,
                false,
                config.profiles.max_per_user.max(1),
            )?;
            println!("Created admin '{username}' ({})", user.id);
        }
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents =
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            Config::from_json(&contents)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.server.db_path.display());
    println!("  Registration open: {}", config.auth.allow_registration);
    println!("  Video dir: {}", config.media.video_dir.display());
    println!("  Upload dir: {}", config.media.upload_dir.display());
    println!("  Profiles per account: {}", config.profiles.max_per_user);
    println!(
        "  Activity log: {}",
        if config.activity.enabled {
            config.activity.path.display().to_string()
        } else {
            "disabled".to_string()
        }
    );

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("Configuration is valid");
    } else {
        for w in &warnings {
            println!("  warning: {w}");
        }
        println!("Configuration is usable with {} warning(s)", warnings.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the defaults picked by --verbose.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "marquee=trace,mq_server=trace,mq_db=debug,mq_core=debug,tower_http=debug".to_string()
        } else {
            "marquee=debug,mq_server=debug,mq_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let config = load_config(cli.config.as_deref(), host, port);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(config))
        }
        Commands::CreateAdmin {
            username,
            password,
            email,
        } => {
            let config = load_config(cli.config.as_deref(), None, None);
            create_admin(&config, &username, &password, email.as_deref())
        }
        Commands::HashPassword { password } => {
            let config = load_config(cli.config.as_deref(), None, None);
            let hash = mq_server::routes::auth::hash_password(&password, config.auth.bcrypt_cost)?;
            println!("{hash}");
            Ok(())
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("marquee {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
