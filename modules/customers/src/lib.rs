//! Demo collection: customers served through the OData envelope at `GET /api/customers`.

pub mod api;
pub mod domain;
pub mod infra;

use std::sync::Arc;

use axum::Router;
use odata_core::ODataSettings;
use sea_orm::DatabaseConnection;

pub use api::rest::dto::CustomerDto;
pub use domain::service::Service;
pub use infra::storage::migration::{ensure_schema, seed};

pub struct CustomersModule {
    service: Arc<Service>,
}

impl CustomersModule {
    /// Prepare the schema and wire the service over `db`.
    pub async fn init(db: DatabaseConnection, settings: ODataSettings) -> anyhow::Result<Self> {
        ensure_schema(&db).await?;
        tracing::info!("customers module initialized");
        Ok(Self {
            service: Arc::new(Service::new(db, settings)),
        })
    }

    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    pub fn router(&self) -> Router {
        api::rest::routes::register_routes(Router::new(), self.service.clone())
    }
}
