//! Rate record entity for SeaORM.

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::Set;
use sea_orm::entity::prelude::*;

use sheetwise_core::ports::StoreError;
use sheetwise_core::{ClientKey, Endpoint, RateKey, RateRecord};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rate_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub client_key: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub endpoint: String,
    pub count: i32,
    pub window_start: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Primary key value for a domain key.
pub fn primary_key(key: &RateKey) -> (String, String) {
    (
        key.client.as_str().to_string(),
        key.endpoint.as_str().to_string(),
    )
}

/// Build an ActiveModel with every column set.
pub fn active_model(key: &RateKey, count: u32, window_start: DateTimeUtc) -> ActiveModel {
    ActiveModel {
        client_key: Set(key.client.as_str().to_string()),
        endpoint: Set(key.endpoint.as_str().to_string()),
        count: Set(count_column(count)),
        window_start: Set(window_start.into()),
    }
}

/// `TIMESTAMPTZ` keeps microseconds; round-trips need the same precision.
pub(crate) fn column_instant(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

pub(crate) fn count_column(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Conversion from SeaORM Model to the domain record.
impl TryFrom<Model> for RateRecord {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let endpoint: Endpoint = model.endpoint.parse().map_err(|_| {
            StoreError::Unavailable(format!(
                "rate_records row has unknown endpoint '{}'",
                model.endpoint
            ))
        })?;

        Ok(Self {
            client: ClientKey::new(model.client_key),
            endpoint,
            count: u32::try_from(model.count).unwrap_or(0),
            window_start: model.window_start.into(),
        })
    }
}
