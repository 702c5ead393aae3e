use odata_db::{FieldKind, FieldMap};

use crate::api::rest::dto::CustomerDto;
use crate::infra::storage::entity::{Column, Entity, Model};

/// Convert a database row to its wire shape.
pub fn entity_to_dto(m: Model) -> CustomerDto {
    CustomerDto {
        id: m.id,
        first_name: m.first_name,
        last_name: m.last_name,
        company_name: m.company_name,
        email_address: m.email_address,
        phone: m.phone,
        credit_limit: m.credit_limit,
        is_active: m.is_active,
        modified_date: m.modified_date,
    }
}

/// Fields clients may filter, order and select on, under their JSON names.
pub fn field_map() -> FieldMap<Entity> {
    FieldMap::new()
        .insert("id", Column::Id, FieldKind::I64)
        .insert("firstName", Column::FirstName, FieldKind::String)
        .insert("lastName", Column::LastName, FieldKind::String)
        .insert("companyName", Column::CompanyName, FieldKind::String)
        .insert("emailAddress", Column::EmailAddress, FieldKind::String)
        .insert("phone", Column::Phone, FieldKind::String)
        .insert("creditLimit", Column::CreditLimit, FieldKind::F64)
        .insert("isActive", Column::IsActive, FieldKind::Bool)
        .insert("modifiedDate", Column::ModifiedDate, FieldKind::DateTimeUtc)
}
