//! SeaORM query engine for the envelope pipeline.
//!
//! - [`odata`]: filter/order compilation against a whitelisted [`FieldMap`]
//! - [`SeaOrmSource`]: a [`odata_core::QuerySource`] over one entity
//! - [`connect`]: pooled connections from [`DatabaseConfig`]

pub mod connect;
pub mod odata;
mod source;

pub use connect::{connect, DatabaseConfig};
pub use odata::{
    expr_to_condition, Field, FieldKind, FieldMap, ODataBuildError, ODataBuildResult, ODataExt,
    ODataOrderExt,
};
pub use source::{ModelMapper, SeaOrmSource};
