use odata_core::{build_envelope, ODataQuery, ODataSettings, Outcome, RequestContext, SortDir};
use odata_db::SeaOrmSource;
use sea_orm::DatabaseConnection;
use tracing::instrument;

use crate::api::rest::dto::CustomerDto;
use crate::infra::storage::entity::Entity;
use crate::infra::storage::mapper::{entity_to_dto, field_map};

/// Customer queries over the SeaORM engine.
pub struct Service {
    source: SeaOrmSource<Entity, CustomerDto>,
    settings: ODataSettings,
}

impl Service {
    pub fn new(db: DatabaseConnection, settings: ODataSettings) -> Self {
        Self {
            source: SeaOrmSource::new(db, field_map(), ("id", SortDir::Asc), entity_to_dto),
            settings,
        }
    }

    #[instrument(
        name = "customers.service.list_customers",
        skip_all,
        fields(path = %ctx.path)
    )]
    pub async fn list_customers(
        &self,
        query: ODataQuery,
        ctx: RequestContext,
    ) -> Outcome<CustomerDto> {
        build_envelope(&self.source, query, ctx, &self.settings).await
    }
}
