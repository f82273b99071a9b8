use mailroom_agent::app;
use mailroom_agent::config::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export BOTMAILROOM_API_KEY=... OPENAI_API_KEY=... (or put them in .env)");
        std::process::exit(1);
    });

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("📬 Mailroom Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", settings.model);
    eprintln!("   Database: {}", settings.database_path().display());
    eprintln!("   Max response cycles: {}", settings.max_response_cycles);
    eprintln!(
        "   Webhook: http://{}/receive-email{}",
        settings.bind_address,
        if settings.botmailroom_webhook_secret.is_some() {
            " (signed)"
        } else {
            " (unsigned)"
        }
    );

    let app = app::build(&settings).await?;

    let listener = tokio::net::TcpListener::bind(settings.bind_address).await?;
    tracing::info!(address = %settings.bind_address, "Webhook server started");
    axum::serve(listener, app.router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
