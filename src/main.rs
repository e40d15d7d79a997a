use imagetruth::{create_router, init, AppState, Config, Result, ResultExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the application
    init()?;

    let config = Config::from_env()?;
    let addr = config.bind_addr;

    // Load the model once; failures leave the app running in a degraded state
    let state = AppState::new(config);
    if let Some(reason) = state.model.unavailable_reason() {
        log::warn!("Serving without a model: {}", reason);
    }

    // Build our application with routes
    let app = create_router(state);

    // Set up the server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
