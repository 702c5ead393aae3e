use std::sync::Arc;

use axum::Extension;
use odata_http::{EnvelopeResponse, OData, ODataRequest};
use tracing::debug;

use crate::api::rest::dto::CustomerDto;
use crate::domain::service::Service;

/// List customers honouring `$filter`, `$orderby`, `$select`, `$top`, `$skip` and `$count`.
pub async fn list_customers(
    Extension(svc): Extension<Arc<Service>>,
    OData(query): OData,
    ODataRequest(ctx): ODataRequest,
) -> EnvelopeResponse<CustomerDto> {
    debug!(query = ?ctx.query, "listing customers");
    EnvelopeResponse(svc.list_customers(query, ctx).await)
}
