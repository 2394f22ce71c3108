use std::error::Error;

use foodgram::{api, config::Config, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("foodgram=info"))
        .init();

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr;

    tokio::fs::create_dir_all(&config.media_root).await?;
    let state = AppState::connect(config).await?;

    sqlx::migrate!().run(&state.pool).await?;
    log::info!("Migrations applied");

    log::info!("Listening on {bind_addr}");
    warp::serve(api::routes(state)).run(bind_addr).await;

    Ok(())
}
