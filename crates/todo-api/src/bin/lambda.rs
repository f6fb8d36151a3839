//! Lambda 用エントリポイント
//! API Gateway (HTTP API) からのイベントを同じルータで処理します。

use lambda_http::{run, Error};
use shared::Config;
use todo_api::{app, AppState};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;
    shared::init_tracing(config.log_format)?;

    let state = AppState::from_config(&config).await;
    run(app(state)).await
}
