//! Change Detector: classifies a source listing against the catalog's
//! latest-per-URI records.
//!
//! Size and mtime pre-filters let most syncs skip content hashing; the
//! file processor does the actual fetch+hash for anything classified
//! `Modified` or `New`.

use std::collections::{HashMap, HashSet};

use docsync_core::domain::{FileRecord, FileRecordStatus};
use docsync_core::ports::FileDescriptor;

/// Tolerance for the mtime pre-filter: a listing's `source_modified_at`
/// within this window of the stored value is treated as unchanged.
const MTIME_TOLERANCE_SECS: i64 = 2;

/// What happened to one URI between the latest catalog record and the
/// current source listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Not previously seen, or reappearing after a `deleted` record
    /// (a restoration — the processor reuses the prior `uuid_filename`).
    New,
    /// Size differs from the stored record: always a real change, the
    /// hash-equality downgrade to `Unchanged` does not apply.
    ModifiedConfirmed,
    /// Size matches but mtime is absent or outside tolerance: the processor
    /// fetches and hashes, downgrading to `Unchanged` if the hash matches.
    ModifiedTentative,
    Unchanged,
    Deleted,
}

/// One URI's classification, carrying whatever the detector needed from
/// the listing and/or the latest record to reach its verdict.
#[derive(Debug, Clone)]
pub struct Classification {
    pub original_uri: String,
    pub change_type: ChangeType,
    /// Present for everything except `Deleted`.
    pub descriptor: Option<FileDescriptor>,
    /// The prior latest record, when one exists (restorations, modifications,
    /// unchanged rows, and deletions all carry it).
    pub existing_record: Option<FileRecord>,
}

/// Classifies a source listing `listing` against `latest`, the map
/// produced by `ICatalogRepository::latest_records_by_kb`.
#[must_use]
pub fn classify(
    listing: &[FileDescriptor],
    latest: &HashMap<String, FileRecord>,
) -> Vec<Classification> {
    let mut out = Vec::with_capacity(listing.len());
    let mut seen: HashSet<&str> = HashSet::with_capacity(listing.len());

    for descriptor in listing {
        seen.insert(descriptor.original_uri.as_str());

        let change_type = match latest.get(&descriptor.original_uri) {
            None => ChangeType::New,
            Some(record) if !record.status.is_live() => ChangeType::New,
            Some(record) => classify_live(descriptor, record),
        };

        out.push(Classification {
            original_uri: descriptor.original_uri.clone(),
            change_type,
            descriptor: Some(descriptor.clone()),
            existing_record: latest.get(&descriptor.original_uri).cloned(),
        });
    }

    for (uri, record) in latest {
        if record.status.is_live() && !seen.contains(uri.as_str()) {
            out.push(Classification {
                original_uri: uri.clone(),
                change_type: ChangeType::Deleted,
                descriptor: None,
                existing_record: Some(record.clone()),
            });
        }
    }

    out
}

fn classify_live(descriptor: &FileDescriptor, record: &FileRecord) -> ChangeType {
    if descriptor.size != record.file_size {
        return ChangeType::ModifiedConfirmed;
    }

    if let (Some(listed_mtime), Some(stored_mtime)) =
        (descriptor.source_modified_at, record.source_modified_at)
    {
        let delta = (listed_mtime - stored_mtime).num_seconds().abs();
        if delta <= MTIME_TOLERANCE_SECS {
            return ChangeType::Unchanged;
        }
    }

    ChangeType::ModifiedTentative
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use docsync_core::domain::newtypes::{FileContentHash, FileRecordId, OriginalUri, RagUri, SyncRunId};

    fn descriptor(uri: &str, size: u64, mtime: Option<chrono::DateTime<Utc>>) -> FileDescriptor {
        FileDescriptor {
            original_uri: uri.to_string(),
            size,
            content_type: None,
            source_created_at: None,
            source_modified_at: mtime,
            source_path: None,
            metadata: None,
        }
    }

    fn record(uri: &str, status: FileRecordStatus, size: u64, mtime: Option<chrono::DateTime<Utc>>) -> FileRecord {
        FileRecord {
            id: FileRecordId::new(1),
            sync_run_id: SyncRunId::new(1),
            original_uri: OriginalUri::new(uri.to_string()).unwrap(),
            rag_uri: RagUri::new(format!("kb/{uri}")).unwrap(),
            file_hash: FileContentHash::empty(),
            uuid_filename: "existing-uuid.txt".to_string(),
            upload_time: mtime.unwrap_or_else(|| Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            file_size: size,
            status,
            error_message: None,
            source_id: None,
            source_type: None,
            source_path: None,
            content_type: None,
            source_metadata: None,
            source_created_at: None,
            source_modified_at: mtime,
            tags: None,
        }
    }

    fn ts(secs_offset: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs_offset)
    }

    #[test]
    fn uri_absent_from_catalog_is_new() {
        let listing = vec![descriptor("a.txt", 10, None)];
        let latest = HashMap::new();
        let result = classify(&listing, &latest);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].change_type, ChangeType::New);
        assert!(result[0].existing_record.is_none());
    }

    #[test]
    fn deleted_record_reappearing_is_restoration_new() {
        let listing = vec![descriptor("a.txt", 10, None)];
        let mut latest = HashMap::new();
        latest.insert("a.txt".to_string(), record("a.txt", FileRecordStatus::Deleted, 10, None));
        let result = classify(&listing, &latest);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].change_type, ChangeType::New);
        assert!(result[0].existing_record.is_some());
    }

    #[test]
    fn size_mismatch_is_modified_confirmed() {
        let listing = vec![descriptor("a.txt", 20, Some(ts(0)))];
        let mut latest = HashMap::new();
        latest.insert("a.txt".to_string(), record("a.txt", FileRecordStatus::Unchanged, 10, Some(ts(0))));
        let result = classify(&listing, &latest);
        assert_eq!(result[0].change_type, ChangeType::ModifiedConfirmed);
    }

    #[test]
    fn mtime_within_tolerance_is_unchanged() {
        let listing = vec![descriptor("a.txt", 10, Some(ts(1)))];
        let mut latest = HashMap::new();
        latest.insert("a.txt".to_string(), record("a.txt", FileRecordStatus::Unchanged, 10, Some(ts(0))));
        let result = classify(&listing, &latest);
        assert_eq!(result[0].change_type, ChangeType::Unchanged);
    }

    #[test]
    fn mtime_outside_tolerance_is_modified_tentative() {
        let listing = vec![descriptor("a.txt", 10, Some(ts(10)))];
        let mut latest = HashMap::new();
        latest.insert("a.txt".to_string(), record("a.txt", FileRecordStatus::Unchanged, 10, Some(ts(0))));
        let result = classify(&listing, &latest);
        assert_eq!(result[0].change_type, ChangeType::ModifiedTentative);
    }

    #[test]
    fn missing_mtime_on_either_side_is_modified_tentative() {
        let listing = vec![descriptor("a.txt", 10, None)];
        let mut latest = HashMap::new();
        latest.insert("a.txt".to_string(), record("a.txt", FileRecordStatus::Unchanged, 10, Some(ts(0))));
        let result = classify(&listing, &latest);
        assert_eq!(result[0].change_type, ChangeType::ModifiedTentative);
    }

    #[test]
    fn live_record_absent_from_listing_is_deleted() {
        let listing: Vec<FileDescriptor> = vec![];
        let mut latest = HashMap::new();
        latest.insert("a.txt".to_string(), record("a.txt", FileRecordStatus::Unchanged, 10, None));
        let result = classify(&listing, &latest);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].change_type, ChangeType::Deleted);
    }

    #[test]
    fn already_deleted_record_absent_from_listing_produces_no_row() {
        let listing: Vec<FileDescriptor> = vec![];
        let mut latest = HashMap::new();
        latest.insert("a.txt".to_string(), record("a.txt", FileRecordStatus::Deleted, 10, None));
        let result = classify(&listing, &latest);
        assert!(result.is_empty());
    }

    #[test]
    fn unrelated_uris_classify_independently() {
        let listing = vec![descriptor("new.txt", 5, None), descriptor("same.txt", 10, Some(ts(0)))];
        let mut latest = HashMap::new();
        latest.insert("same.txt".to_string(), record("same.txt", FileRecordStatus::Unchanged, 10, Some(ts(0))));
        latest.insert("gone.txt".to_string(), record("gone.txt", FileRecordStatus::Unchanged, 1, None));
        let result = classify(&listing, &latest);
        assert_eq!(result.len(), 3);
        let by_uri: HashMap<&str, ChangeType> = result.iter().map(|c| (c.original_uri.as_str(), c.change_type)).collect();
        assert_eq!(by_uri["new.txt"], ChangeType::New);
        assert_eq!(by_uri["same.txt"], ChangeType::Unchanged);
        assert_eq!(by_uri["gone.txt"], ChangeType::Deleted);
    }
}
