use kindred_config::DatabaseSettings;
use mongodb::{Client, Database, options::ClientOptions};
use std::time::Duration;
use tracing::info;

pub async fn connect(settings: &DatabaseSettings) -> Result<Database, mongodb::error::Error> {
    let mut client_options = ClientOptions::parse(&settings.url).await?;
    client_options.app_name = Some("kindred".to_string());
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = settings.max_pool_size;
    client_options.min_pool_size = settings.min_pool_size;

    let client = Client::with_options(client_options)?;

    client
        .database("admin")
        .run_command(bson::doc! { "ping": 1 })
        .await?;

    info!(
        db = %settings.name,
        max_pool = ?settings.max_pool_size,
        "Connected to MongoDB"
    );

    Ok(client.database(&settings.name))
}
