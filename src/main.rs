mod app;
mod backend;
mod config;
mod models;
mod services;
mod ui;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use app::{App, AppMsg};
use backend::HttpBackend;
use config::{ClientConfig, APP_NAME};
use services::files::FsReader;
use services::{theme, PreferenceStore};
use ui::commands::{self, Input};
use ui::terminal::TerminalView;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env().context("Invalid configuration")?;
    let theme = theme::init(
        PreferenceStore::new(config.preferences_path.clone()),
        config.default_theme,
    );
    tracing::info!(
        "Starting {} against {} ({} theme)",
        APP_NAME,
        config.api_base,
        theme.as_str()
    );

    let backend = Arc::new(HttpBackend::new(config.api_base.as_str()));
    let view = TerminalView::new(std::io::stdout());
    let (mut app, mut cmds, mut blurs) = App::new(backend, Arc::new(FsReader), config, Box::new(view));
    let mut summary_changes = app.summary_changes();

    println!("{} - type /help for commands", APP_NAME);
    app.update(AppMsg::LoadCatalog).await;
    app.update(AppMsg::ListConversations).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                match commands::parse_line(&line, app.is_renaming()) {
                    Some(Input::Msg(msg)) => app.update(msg).await,
                    Some(Input::Batch(msgs)) => {
                        for msg in msgs {
                            app.update(msg).await;
                        }
                    }
                    Some(Input::Help) => println!("{}", commands::HELP),
                    Some(Input::Invalid(reason)) => eprintln!("{}", reason),
                    Some(Input::Quit) => break,
                    None => {}
                }
            }
            Some(cmd) = cmds.recv() => app.update_cmd(cmd).await,
            Some(ticket) = blurs.recv() => app.update(AppMsg::RenameBlurElapsed(ticket)).await,
            Ok(()) = summary_changes.changed() => app.update(AppMsg::RefreshConversations).await,
        }
    }

    tracing::info!("Exiting");
    Ok(())
}
