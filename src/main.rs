//! Command-line view of the favourites store
//!
//! Usage: `larry-butter [favourites|characters|spells]`

use anyhow::{anyhow, Context};
use app_core::favourite_rows;
use larry_butter::{init_tracing, App, AppConfig, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let command: Command = match std::env::args().nth(1) {
        Some(arg) => arg.parse().map_err(|e: String| anyhow!(e))?,
        None => Command::Favourites,
    };
    let config = AppConfig::from_env().context("loading configuration")?;
    let app = App::start(config).await.context("starting application")?;

    let outcome = run(&app, command).await;
    app.shutdown().await.context("shutting down")?;
    outcome
}

async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    let store = app.favourites();

    match command {
        Command::Favourites => {
            for row in favourite_rows(store) {
                println!("{:<16} {:<28} {}", row.key(), row.title, row.subtitle);
            }
        }
        Command::Characters => {
            for character in app.catalog().characters().await.context("fetching characters")? {
                let marker = if store.is_favourite(&character.id) { "*" } else { " " };
                println!("{} {:<6} {:<28} {}", marker, character.id, character.name, character.house);
            }
        }
        Command::Spells => {
            for spell in app.catalog().spells().await.context("fetching spells")? {
                let marker = if store.is_favourite_spell(&spell.id) { "*" } else { " " };
                println!("{} {:<38} {}", marker, spell.id, spell.name);
            }
        }
    }

    Ok(())
}
