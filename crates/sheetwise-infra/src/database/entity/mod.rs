//! SeaORM entities.

pub mod rate_record;
