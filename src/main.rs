use anyhow::Context;
use centime::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "centime=info".into()),
        )
        .init();
    if std::env::var("ENV").ok().as_deref() != Some("prod") {
        dotenvy::dotenv().ok();
    }

    let db_path = centime::db_path();
    let conn = centime::open(&db_path)?;
    centime::init_db(&conn)?;
    // Global defaults exist before the first registration ever runs.
    centime::seed_default_categories(&conn)?;
    drop(conn);

    let state = AppState {
        db_path,
        jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
    };
    let app = centime::app(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
