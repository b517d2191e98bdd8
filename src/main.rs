// ABOUTME: Diagnostic CLI that selects the backend for this session and exercises each operation
// ABOUTME: Useful for checking portal permissions, compositor scripts and shortcut delivery by hand

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pie_backend::{Backend, Config, Environment, KeyEvent, Shortcut, create_backend, select_kind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pie-backend")]
#[command(about = "Exercise the pie menu platform backend for this desktop session")]
#[command(version)]
struct Cli {
    /// Config file path (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override backend.force from the config
    #[arg(long)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the detected environment and the backend's capabilities
    Info,
    /// Print the focused window, pointer position and work area
    WmInfo,
    /// Move the pointer by a relative offset
    Move {
        #[arg(allow_hyphen_values = true)]
        dx: i32,
        #[arg(allow_hyphen_values = true)]
        dy: i32,
    },
    /// Send key events given as name:down|up[:delay_ms], e.g. ControlLeft:down KeyC:down KeyC:up ControlLeft:up
    Keys {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Bind a shortcut and log every activation until Ctrl-C
    Bind { id: String, trigger: String },
    /// List the icons of the current icon theme
    Icons,
    /// List installed applications
    Apps,
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Config::default_config_path(),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(&config_path(cli)?)?;
    if let Some(backend) = &cli.backend {
        config.backend.force = Some(backend.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn start_backend(config: &Config) -> Result<Box<dyn Backend>> {
    let backend = create_backend(config).await?;
    backend.init().await.context("Backend failed to initialize")?;
    Ok(backend)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if let Command::InitConfig { force } = &cli.command {
        let path = config_path(&cli)?;
        if path.exists() && !force {
            anyhow::bail!("{} already exists, pass --force to overwrite it", path.display());
        }
        Config::save_default_config(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = load_config(&cli)?;

    match &cli.command {
        Command::Info => {
            let env = Environment::from_env();
            println!("os:       {}", env.os);
            println!("desktop:  {}", env.desktop);
            println!("session:  {}", env.session);
            match select_kind(&env) {
                Some(kind) => println!("detected: {}", kind),
                None => println!("detected: none"),
            }
            if let Some(force) = &config.backend.force {
                println!("forced:   {}", force);
            }

            let backend = start_backend(&config).await?;
            let info = backend.backend_info();
            println!("backend:  {}", info.name);
            println!("window:   {}", info.window_type);
            println!("shortcuts: {}", info.supports_shortcuts);
            if let Some(hint) = info.shortcut_hint {
                println!("hint:     {}", hint);
            }
        }
        Command::WmInfo => {
            let backend = start_backend(&config).await?;
            let info = backend.wm_info().await?;
            println!("window:  {}", info.window_name);
            println!("app:     {}", info.app_name);
            println!("pointer: {}, {}", info.pointer_x, info.pointer_y);
            match info.work_area {
                Some(area) => println!(
                    "work area: {}x{} at {}, {}",
                    area.width, area.height, area.x, area.y
                ),
                None => println!("work area: unknown"),
            }
        }
        Command::Move { dx, dy } => {
            let backend = start_backend(&config).await?;
            backend.move_pointer(*dx, *dy).await?;
        }
        Command::Keys { keys } => {
            let events = keys
                .iter()
                .map(|spec| KeyEvent::parse(spec))
                .collect::<Result<Vec<_>>>()?;
            let backend = start_backend(&config).await?;
            backend.simulate_keys(&events).await?;
        }
        Command::Bind { id, trigger } => {
            let backend = start_backend(&config).await?;
            let info = backend.backend_info();
            if !info.supports_shortcuts {
                if let Some(hint) = &info.shortcut_hint {
                    tracing::warn!("{}", hint);
                }
            }

            let activated = id.clone();
            backend
                .bind_shortcut(Shortcut::new(id, trigger, &format!("Test shortcut {}", id), move || {
                    tracing::info!("Shortcut '{}' activated", activated);
                }))
                .await?;
            println!("Bound '{}' to {}. Press Ctrl-C to stop.", id, trigger);

            tokio::signal::ctrl_c().await?;
            backend.unbind_all_shortcuts().await?;
        }
        Command::Icons => list_icons(&config).await?,
        Command::Apps => list_apps()?,
        Command::InitConfig { .. } => {}
    }

    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
async fn list_icons(config: &Config) -> Result<()> {
    for icon in pie_backend::platform::unix::icons::system_icons(&config.icons).await? {
        println!("{}", icon.display());
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
async fn list_icons(_config: &Config) -> Result<()> {
    Err(pie_backend::BackendError::Unsupported("Icon theme discovery").into())
}

#[cfg(target_os = "linux")]
fn list_apps() -> Result<()> {
    for app in pie_backend::platform::unix::apps::installed_apps() {
        println!("{}\t{}\t{}", app.id, app.name, app.command);
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn list_apps() -> Result<()> {
    Err(pie_backend::BackendError::Unsupported("Application discovery").into())
}
