mod api;
mod bot;
mod config;
mod data;
mod db;
mod engine;

use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_rent=info,tower_http=info".into()),
        )
        .init();

    let cfg = Arc::new(config::Config::from_env()?);
    let db = Arc::new(db::Db::new(&cfg.database_url)?);

    if cfg.allow_unsigned_auth {
        tracing::warn!("ALLOW_UNSIGNED_AUTH is on: unsigned WebApp credentials will be accepted");
    }
    if cfg.generate_test_data {
        data::seed::seed_if_empty(&db)?;
    }

    let bot = Bot::new(&cfg.bot_token);
    let state = Arc::new(api::AppState {
        db: db.clone(),
        config: cfg.clone(),
        notifier: cfg.run_bot.then(|| bot.clone()),
    });

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Social Rent API listening");
    let server = tokio::spawn(api::serve(listener, state));

    if cfg.run_bot {
        tracing::info!("Social Rent bot starting...");

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<bot::commands::Command>()
                    .endpoint(bot::commands::handle),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.web_app_data().is_some())
                    .endpoint(bot::webapp::handle_data),
            )
            .branch(Update::filter_message().endpoint(bot::webapp::handle_other));

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![cfg.clone()])
            .enable_ctrlc_handler()
            .build();

        return supervise(dispatcher.dispatch(), server).await;
    }

    server.await??;
    Ok(())
}

/// Runs the bot until it exits or the HTTP server task ends, whichever comes first.
async fn supervise(
    bot: impl Future<Output = ()>,
    mut server: JoinHandle<anyhow::Result<()>>,
) -> anyhow::Result<()> {
    tokio::select! {
        () = bot => (&mut server).await?,
        joined = &mut server => {
            match &joined {
                Ok(Ok(())) => tracing::info!("HTTP server stopped, stopping bot"),
                Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed, stopping bot"),
                Err(e) => tracing::error!(error = %e, "HTTP server task aborted, stopping bot"),
            }
            joined?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_failure_stops_a_running_bot() {
        let server = tokio::spawn(async { Err(anyhow::anyhow!("address in use")) });
        let err = supervise(std::future::pending(), server).await.unwrap_err();
        assert_eq!(err.to_string(), "address in use");
    }

    #[tokio::test]
    async fn bot_exit_waits_for_server() {
        let server = tokio::spawn(async { Ok(()) });
        supervise(async {}, server).await.unwrap();
    }
}
