use axum::{routing::get, Extension, Router};
use std::sync::Arc;

use crate::api::rest::handlers;
use crate::domain::service::Service;

pub const CUSTOMERS_PATH: &str = "/api/customers";

pub fn register_routes(router: Router, service: Arc<Service>) -> Router {
    router
        .route(CUSTOMERS_PATH, get(handlers::list_customers))
        .layer(Extension(service))
}
