use crate::CrawlerMetadata;
use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use time::OffsetDateTime;

/// A timestamp split into whole Unix seconds and sub-second nanoseconds.
///
/// Both parts are exact, so equality in the compare-and-set survives the
/// round trip, and seconds cover every year a timestamp can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StoredTimestamp {
    pub(crate) secs: i64,
    pub(crate) nanos: i64,
}
impl From<OffsetDateTime> for StoredTimestamp {
    fn from(timestamp: OffsetDateTime) -> Self {
        Self {
            secs: timestamp.unix_timestamp(),
            nanos: i64::from(timestamp.nanosecond()),
        }
    }
}
impl TryFrom<StoredTimestamp> for OffsetDateTime {
    type Error = Error;
    fn try_from(stored: StoredTimestamp) -> Result<Self> {
        let nanos = u32::try_from(stored.nanos).or_raise(|| ErrorKind::InvalidData("last commit nanoseconds"))?;
        OffsetDateTime::from_unix_timestamp(stored.secs)
            .or_raise(|| ErrorKind::InvalidData("last commit seconds"))?
            .replace_nanosecond(nanos)
            .or_raise(|| ErrorKind::InvalidData("last commit nanoseconds"))
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct MetadataRow {
    pub(crate) crawler: String,
    #[sqlx(default)]
    pub(crate) last_commit_secs: Option<i64>,
    #[sqlx(default)]
    pub(crate) last_commit_nanos: Option<i64>,
}
impl TryFrom<MetadataRow> for (String, CrawlerMetadata) {
    type Error = Error;
    fn try_from(row: MetadataRow) -> std::result::Result<Self, Self::Error> {
        let last_commit_at = match (row.last_commit_secs, row.last_commit_nanos) {
            (None, None) => None,
            (secs, nanos) => {
                let secs = secs.ok_or_raise(|| ErrorKind::InvalidData("last commit seconds"))?;
                let nanos = nanos.ok_or_raise(|| ErrorKind::InvalidData("last commit nanoseconds"))?;
                Some(OffsetDateTime::try_from(StoredTimestamp { secs, nanos })?)
            },
        };
        Ok((row.crawler, CrawlerMetadata { last_commit_at }))
    }
}
