mod metadata;

pub(crate) use self::metadata::{MetadataRow, StoredTimestamp};
