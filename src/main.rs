use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Map, Value};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use waafipay_integration::api::{self, AppState};
use waafipay_integration::config::Config;
use waafipay_integration::gateway::WaafiPayGateway;
use waafipay_integration::pipeline::rates::FixedRates;
use waafipay_integration::pipeline::ReconciliationPipeline;
use waafipay_integration::store::documents::{Document, GatewayCredentials};
use waafipay_integration::store::memory::InMemoryStore;
use waafipay_integration::store::doctype;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Log startup info
    tracing::info!("Starting WaafiPay integration backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Gateway account: {}", config.gateway.credentials_name);
    tracing::info!("Gateway base URL: {}", config.gateway.base_url);

    // In-memory store binding: the credentials document is seeded from the
    // environment; the production document-store binding lives in the ERP.
    let store = InMemoryStore::new();
    seed_credentials(&store, &config);

    let credentials =
        GatewayCredentials::load(&store, &config.gateway.credentials_name).await?;
    let gateway = WaafiPayGateway::new(credentials, config.gateway.request_timeout_secs)?;

    let pipeline = ReconciliationPipeline::new(
        Arc::new(store),
        Arc::new(gateway),
        Arc::new(FixedRates::new()),
        config.gateway.credentials_name.as_str(),
    );

    // Build router
    let app = api::router(AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
    })
    .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn seed_credentials(store: &InMemoryStore, config: &Config) {
    let gateway = &config.gateway;

    let mut fields = Map::new();
    fields.insert("merchant_uid".into(), Value::from(gateway.merchant_uid.as_str()));
    fields.insert("api_user_id".into(), Value::from(gateway.api_user_id.as_str()));
    fields.insert("api_base_url".into(), Value::from(gateway.base_url.as_str()));
    fields.insert(
        "supported_currencies".into(),
        Value::from(gateway.supported_currencies.clone()),
    );
    fields.insert("success_url".into(), Value::from(gateway.success_url.as_str()));
    fields.insert("failure_url".into(), Value::from(gateway.failure_url.as_str()));
    if let Some(store_id) = &gateway.store_id {
        fields.insert("store_id".into(), Value::from(store_id.as_str()));
    }

    store.insert(Document::new(
        doctype::CREDENTIALS,
        &gateway.credentials_name,
        fields,
    ));
    store.set_password(
        doctype::CREDENTIALS,
        &gateway.credentials_name,
        "api_key",
        &gateway.api_key,
    );
    if let Some(hpp_key) = &gateway.hpp_key {
        store.set_password(
            doctype::CREDENTIALS,
            &gateway.credentials_name,
            "hpp_key",
            hpp_key,
        );
    }
}
