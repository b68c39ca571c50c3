use sea_orm_migration::MigratorTrait;

use crudbase::config::Settings;
use crudbase::migration::Migrator;
use crudbase::session::{BackendId, SessionProvider};
use crudbase::{logging, routes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    logging::init(&settings.log_level);
    tracing::info!(project = %settings.project_name, "Starting");

    let provider = SessionProvider::connect(&settings.backends).await?;
    let session = provider.acquire(BackendId::Primary).await?;
    Migrator::up(session.conn(), None).await?;
    session.commit().await?;

    let app = routes::app(&settings, provider);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(
        addr = %settings.bind_addr,
        base = %settings.api_base(),
        "Listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
