mod commands;
mod helpers;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "skylark")]
#[command(about = "Skylark - a small Bluesky client for the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c', env = "SKYLARK_CONFIG")]
    config: Option<PathBuf>,

    /// PDS URL (overrides config)
    #[arg(long, env = "SKYLARK_PDS_URL")]
    pds_url: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a handle and app password
    Login {
        /// Handle to sign in as (prompted if omitted)
        handle: Option<String>,
        /// App password (prompted if omitted)
        #[arg(long, env = "SKYLARK_APP_PASSWORD", hide_env_values = true)]
        app_password: Option<String>,
    },
    /// Sign out and forget the saved login
    Logout {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show the signed-in account
    Whoami,
    /// Show the home timeline
    Timeline {
        /// Cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,
        /// Number of pages to fetch
        #[arg(long, default_value = "1")]
        pages: u32,
    },
    /// Show someone's profile
    Profile {
        /// Handle to look up
        handle: String,
    },
    /// List notifications
    Notifications {
        /// Cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Publish a text post
    Post {
        /// Post text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .with_syntax_highlighting(miette::highlighters::SyntectHighlighter::default())
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    use tracing_appender::rolling;
    use tracing_subscriber::{
        EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    };

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skylark")
        .join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = rolling::daily(&log_dir, "skylark.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = if cli.debug {
        EnvFilter::new("skylark_core=debug,skylark_auth=debug,skylark_cli=debug,skylark=debug,info")
    } else {
        EnvFilter::new("skylark_core=warn,skylark_auth=warn,skylark_cli=warn,skylark=warn,warn")
    };

    let terminal_layer = if cli.debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_timer(fmt::time::ChronoLocal::rfc_3339())
            .with_writer(std::io::stderr)
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    // Telemetry events only go to the file.
    let file_env_filter = EnvFilter::new(
        "skylark_core=debug,skylark_auth=debug,skylark_cli=debug,skylark::telemetry=info,info",
    );

    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .with_ansi(false)
        .with_writer(non_blocking)
        .pretty();

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .with(file_layer.with_filter(file_env_filter))
        .init();

    info!(
        "Logging initialized. Logs are being written to: {:?}",
        log_dir.join("skylark.log")
    );

    let config = helpers::load_config(cli.config.as_deref(), cli.pds_url.as_deref()).await?;
    let skylark = helpers::open_client(config).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Commands::Login {
            handle,
            app_password,
        } => commands::login::login(&skylark, &cancel, handle, app_password).await?,
        Commands::Logout { yes } => commands::logout::logout(&skylark, yes).await?,
        Commands::Whoami => commands::whoami::whoami(&skylark, &cancel).await?,
        Commands::Timeline { cursor, pages } => {
            commands::timeline::show(&skylark, &cancel, cursor, pages).await?
        }
        Commands::Profile { handle } => commands::profile::show(&skylark, &cancel, &handle).await?,
        Commands::Notifications { cursor } => {
            commands::notifications::list(&skylark, &cancel, cursor).await?
        }
        Commands::Post { text } => commands::post::create(&skylark, &cancel, &text.join(" ")).await?,
    }

    Ok(())
}
