use clap::Parser;
use owo_colors::{OwoColorize, Style};
use questr_core::config::EngineConfig;
use questr_core::engine::QuestEngine;
use questr_core::error::CoreError;
use questr_core::storage::SqliteStore;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod util;
mod views;

use cli::Commands;

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "questr=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Commands that run the start-of-session sync before doing their work.
fn needs_sync(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::Sync | Commands::Reset(_) | Commands::Dismiss | Commands::Types(_)
    )
}

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose);

    let config = config::Config::new().unwrap_or_else(|e| {
        warn!(error = %e, "Could not load configuration, using defaults");
        config::Config::default()
    });

    let timezone = match config::validate_timezone(&config.timezone) {
        Ok(tz) => tz,
        Err(message) => {
            handle_error(anyhow::anyhow!(message));
            std::process::exit(1);
        }
    };

    let store = match SqliteStore::open(&config.database_path).await {
        Ok(store) => store,
        Err(e) => {
            handle_error(e.into());
            std::process::exit(1);
        }
    };

    let engine = match QuestEngine::new(store, EngineConfig::with_timezone(timezone.name())) {
        Ok(engine) => engine,
        Err(e) => {
            handle_error(e.into());
            std::process::exit(1);
        }
    };

    if needs_sync(&cli.command) {
        let report = engine.sync().await;
        commands::sync::print_report(&report, false);
    }

    let show_level_up = !matches!(cli.command, Commands::Dismiss | Commands::Reset(_) | Commands::Status);

    let result = match cli.command {
        Commands::Add(command) => commands::add::add_task(&engine, command).await,
        Commands::List(command) => commands::list::list_tasks(&engine, command).await,
        Commands::Today => commands::list::today(&engine).await,
        Commands::Do(command) => commands::r#do::do_task(&engine, command).await,
        Commands::Undo(command) => commands::undo::undo_task(&engine, command).await,
        Commands::Delete(command) => commands::delete::delete_task(&engine, command).await,
        Commands::Edit(command) => commands::edit::edit_task(&engine, command).await,
        Commands::Copy(command) => commands::copy::copy_task(&engine, command).await,
        Commands::Hide(command) => commands::hide::set_hidden(&engine, command, true).await,
        Commands::Unhide(command) => commands::hide::set_hidden(&engine, command, false).await,
        Commands::Status => commands::status::status(&engine).await,
        Commands::Types(command) => commands::types::types_command(&engine, command).await,
        Commands::Sync => commands::sync::sync(&engine).await,
        Commands::History(command) => commands::history::history(&engine, command, &timezone).await,
        Commands::Dismiss => commands::status::dismiss(&engine).await,
        Commands::Reset(command) => commands::reset::reset(&engine, command).await,
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }

    if show_level_up {
        if let Some(level_up) = engine.level_up().await {
            views::table::display_level_up(level_up);
        }
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
            }
            CoreError::AmbiguousId(tasks) => {
                eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
                eprintln!("Did you mean one of these?");
                for (id, title) in tasks {
                    eprintln!("  {} ({})", id.yellow(), title);
                }
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
    }
}
