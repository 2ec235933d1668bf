use crate::{Destination, Family};
use serde::{Deserialize, Serialize};
use typesafe_repository::async_ops::{Get, Save};
use typesafe_repository::{GetIdentity, Identity, Repository};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImportWatermarkKey {
    pub tenant: String,
    pub family: Family,
    pub destination: Destination,
    pub filename: String,
}

/// Cursor of the last processed row for a (tenant, family, destination, filename).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ImportWatermark {
    pub key: ImportWatermarkKey,
    /// Seconds since epoch of the latest row timestamp observed
    pub timestamp: i64,
    pub version: i64,
}

impl ImportWatermark {
    /// Whether a row stamped `row_timestamp` was already covered by this watermark under `filter_version`.
    pub fn covers(&self, row_timestamp: i64, filter_version: i64) -> bool {
        row_timestamp <= self.timestamp && self.version >= filter_version
    }

    /// Next watermark after a pass that observed `observed` as the latest row timestamp.
    /// Never moves the timestamp backwards.
    pub fn advance(&self, observed: Option<i64>, filter_version: i64) -> ImportWatermark {
        ImportWatermark {
            key: self.key.clone(),
            timestamp: observed.map_or(self.timestamp, |o| o.max(self.timestamp)),
            version: self.version.max(filter_version),
        }
    }
}

impl Identity for ImportWatermark {
    type Id = ImportWatermarkKey;
}

impl GetIdentity for ImportWatermark {
    fn id(&self) -> Self::Id {
        self.key.clone()
    }
}

pub trait ImportWatermarkRepository:
    Repository<ImportWatermark, Error = anyhow::Error>
    + Get<ImportWatermark>
    + Save<ImportWatermark>
    + Send
    + Sync
{
}
