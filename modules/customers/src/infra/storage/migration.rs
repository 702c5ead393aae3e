use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, Schema, Set,
};
use tracing::info;

use crate::infra::storage::entity::{ActiveModel, Entity};

const FIRST_NAMES: [&str; 10] = [
    "Orlando", "Keith", "Donna", "Janet", "Lucy", "Rosmarie", "Dominic", "Kathleen", "Katherine",
    "Johnny",
];
const LAST_NAMES: [&str; 8] = [
    "Gee", "Harris", "Carreras", "Gates", "Harrington", "Carroll", "Gash", "Garza",
];
const COMPANIES: [&str; 6] = [
    "A Bike Store",
    "Progressive Sports",
    "Advanced Bike Components",
    "Modular Cycle Systems",
    "Metropolitan Sports Supply",
    "Aerobic Exercise Company",
];

// Keeps multi-row inserts under SQLite's bound-parameter limit.
const INSERT_CHUNK: usize = 100;

/// Create the `customers` table if it does not exist yet.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(Entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

fn base_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2008, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Deterministic demo row number `id` (1-based).
fn demo_customer(id: i64) -> ActiveModel {
    let i = (id - 1) as usize;
    let first = FIRST_NAMES[i % FIRST_NAMES.len()];
    let last = LAST_NAMES[(i / FIRST_NAMES.len()) % LAST_NAMES.len()];

    ActiveModel {
        id: Set(id),
        first_name: Set(first.to_string()),
        last_name: Set(last.to_string()),
        company_name: Set((id % 4 != 0).then(|| COMPANIES[i % COMPANIES.len()].to_string())),
        email_address: Set(Some(format!(
            "{}.{}{id}@example.com",
            first.to_ascii_lowercase(),
            last.to_ascii_lowercase()
        ))),
        phone: Set((id % 5 != 0).then(|| format!("245-555-{:04}", id % 10_000))),
        credit_limit: Set(((id * 250) % 10_000) as f64),
        is_active: Set(id % 3 != 0),
        modified_date: Set(base_date() + Duration::days(id)),
    }
}

/// Insert `n` demo customers when the table is empty; returns how many rows were added.
pub async fn seed(db: &DatabaseConnection, n: u64) -> Result<u64, DbErr> {
    let existing = Entity::find().count(db).await?;
    if existing > 0 {
        info!(existing, "customers already present, skipping seed");
        return Ok(0);
    }

    let rows: Vec<ActiveModel> = (1..=n as i64).map(demo_customer).collect();
    for chunk in rows.chunks(INSERT_CHUNK) {
        Entity::insert_many(chunk.to_vec())
            .exec_without_returning(db)
            .await?;
    }
    info!(inserted = n, "seeded demo customers");
    Ok(n)
}
