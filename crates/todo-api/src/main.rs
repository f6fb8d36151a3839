//! todo-api バイナリのエントリポイント
//! ローカル開発用に HTTP サーバを起動します。

use anyhow::Context;
use shared::Config;
use todo_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    shared::init_tracing(config.log_format).map_err(|e| anyhow::anyhow!(e))?;

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, environment = %config.environment, "server starting");

    let state = AppState::from_config(&config).await;
    axum::serve(listener, app(state))
        .await
        .context("server error")?;

    Ok(())
}
