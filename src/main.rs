use amil::api::{data_service, DataService};
use amil::args::{Args, Command};
use amil::error::{ErrorType, IntoResult};
use amil::session::FileSessionStore;
use amil::{commands, Config, Mode, Result, Settings};
use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().amil_home().path();

    // This allows for running the program without a hosted backend. When AMIL_IN_TEST_MODE is set
    // and non-zero in length, then the mode will be Mode::Test, otherwise it will be Mode::Remote.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => {
            let settings = Settings {
                data_url: init_args.data_url().to_string(),
                data_key: init_args.data_key().to_string(),
                cloud_name: init_args.cloud_name().to_string(),
                upload_preset: init_args.upload_preset().to_string(),
            };
            commands::init(home, settings).await?.print()
        }

        Command::Login(login_args) => {
            let config = load_config(home).await?;
            let service = service(&config, mode).await?;
            commands::login(
                &*service,
                &session_store(&config),
                login_args.username(),
                login_args.password(),
            )
            .await?
            .print()
        }

        Command::Logout => {
            let config = load_config(home).await?;
            commands::logout(&session_store(&config)).await?.print()
        }

        Command::Whoami => {
            let config = load_config(home).await?;
            commands::whoami(&session_store(&config)).await?.print()
        }

        Command::Report(report_args) => {
            let config = load_config(home).await?;
            let service = service(&config, mode).await?;
            let out = commands::report(&config, &*service, report_args.filter()).await?;
            if report_args.json() {
                out.print_json()?
            } else {
                out.print()
            }
        }

        Command::Export(export_args) => {
            let config = load_config(home).await?;
            let service = service(&config, mode).await?;
            commands::export(&config, &*service, export_args)
                .await?
                .print()
        }

        Command::List(list_args) => {
            let config = load_config(home).await?;
            let service = service(&config, mode).await?;
            let out = commands::list(&*service, list_args).await?;
            if list_args.json() {
                out.print_json()?
            } else {
                out.print()
            }
        }

        Command::Insert(insert_args) => {
            let config = load_config(home).await?;
            let service = service(&config, mode).await?;
            commands::insert(
                &*service,
                &session_store(&config),
                insert_args.table(),
                insert_args.json(),
            )
            .await?
            .print()
        }

        Command::Update(update_args) => {
            let config = load_config(home).await?;
            let service = service(&config, mode).await?;
            commands::update(
                &*service,
                &session_store(&config),
                update_args.table(),
                update_args.id(),
                update_args.json(),
            )
            .await?
            .print()
        }

        Command::Delete(delete_args) => {
            let config = load_config(home).await?;
            let service = service(&config, mode).await?;
            commands::delete(
                &*service,
                &session_store(&config),
                delete_args.table(),
                delete_args.id(),
            )
            .await?
            .print()
        }

        Command::Upload(upload_args) => {
            let config = load_config(home).await?;
            commands::upload(&config, &session_store(&config), upload_args.file())
                .await?
                .print()
        }

        Command::ImageUrl(image_url_args) => commands::image_url(image_url_args)?.print(),

        Command::Watch(watch_args) => {
            let config = load_config(home).await?;
            let service = service(&config, mode).await?;
            commands::watch(
                service,
                watch_args.table(),
                config.poll_interval(),
                config.bucket_rule(),
                watch_args.count(),
            )
            .await?
            .print()
        }
    };
    Ok(())
}

async fn load_config(home: &Path) -> Result<Config> {
    Config::load(home).await.pub_result(ErrorType::Config)
}

async fn service(config: &Config, mode: Mode) -> Result<Arc<dyn DataService>> {
    data_service(config, mode)
        .await
        .context("Unable to connect to the data service")
        .pub_result(ErrorType::Config)
}

fn session_store(config: &Config) -> FileSessionStore {
    FileSessionStore::new(config.session_path())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
