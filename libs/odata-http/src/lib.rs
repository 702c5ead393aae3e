//! axum glue for the envelope pipeline: directive extraction, request context and
//! the JSON shapes of the three outcomes.

pub mod error;
pub mod odata;
pub mod request;
pub mod response;

pub use error::{bad_request, catch_panic, odata_error_to_response, ErrorMessage, ErrorResponse};
pub use odata::{extract_odata_query, parse_orderby, OData, ODataParams};
pub use request::ODataRequest;
pub use response::{EnvelopeResponse, ResultsBody};
