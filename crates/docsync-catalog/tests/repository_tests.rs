//! Integration tests for `SqliteCatalogRepository`
//!
//! Each test opens a fresh in-memory database to ensure isolation, then
//! exercises the catalog through its public `ICatalogRepository` surface
//! rather than raw SQL.

use chrono::Utc;

use docsync_catalog::{DatabasePool, SqliteCatalogRepository};
use docsync_core::domain::{
    DeltaToken, FileContentHash, FileRecord, FileRecordId, FileRecordStatus, KbId, KbName,
    OriginalUri, RagUri, SourceId, SyncCounters, SyncRunStatus, UuidFilename,
};
use docsync_core::ports::ICatalogRepository;

async fn setup() -> SqliteCatalogRepository {
    let pool = DatabasePool::in_memory()
        .await
        .expect("failed to create in-memory catalog database");
    SqliteCatalogRepository::new(pool)
}

fn blank_record(sync_run_id: docsync_core::domain::SyncRunId, uri: &str) -> FileRecord {
    FileRecord {
        id: FileRecordId::new(0),
        sync_run_id,
        original_uri: OriginalUri::new(uri.to_string()).unwrap(),
        rag_uri: RagUri::new(format!("kb/{}", UuidFilename::generate("txt"))).unwrap(),
        file_hash: FileContentHash::from_bytes(uri.as_bytes()),
        uuid_filename: UuidFilename::generate("txt").to_string(),
        upload_time: Utc::now(),
        file_size: uri.len() as u64,
        status: FileRecordStatus::New,
        error_message: None,
        source_id: None,
        source_type: None,
        source_path: None,
        content_type: Some("text/plain".to_string()),
        source_metadata: None,
        source_created_at: None,
        source_modified_at: None,
        tags: None,
    }
}

#[tokio::test]
async fn full_sync_run_lifecycle_persists_counters_and_records() {
    let repo = setup().await;

    let kb_name = KbName::new("docs".to_string()).unwrap();
    let placeholder = repo
        .create_placeholder_kb(&kb_name, "mock", &serde_json::json!({}), KbId::new(1))
        .await
        .expect("create placeholder kb");

    let run_id = repo
        .create_sync_run(placeholder.id, SyncRunStatus::Running, None)
        .await
        .expect("create sync run");

    let rec_a = blank_record(run_id, "/docs/a.txt");
    let mut rec_b = blank_record(run_id, "/docs/b.txt");
    rec_b.status = FileRecordStatus::Error;
    rec_b.rag_uri = RagUri::error_sentinel("docs", 1_700_000_000);
    rec_b.uuid_filename = String::new();
    rec_b.error_message = Some("fetch timed out".to_string());

    repo.insert_file_record(&rec_a).await.expect("insert a");
    repo.insert_file_record(&rec_b).await.expect("insert b");

    let counters = SyncCounters {
        total: 2,
        new: 1,
        modified: 0,
        deleted: 0,
        errors: 1,
    };
    repo.update_sync_run(
        run_id,
        counters,
        Some(Utc::now()),
        SyncRunStatus::Completed,
        None,
    )
    .await
    .expect("finalize sync run");

    let stored = repo
        .get_sync_run(run_id)
        .await
        .expect("query sync run")
        .expect("sync run exists");
    assert_eq!(stored.status, SyncRunStatus::Completed);
    assert_eq!(stored.counters.total, 2);
    assert_eq!(stored.counters.errors, 1);
    assert_eq!(stored.counters.unchanged(), 1);

    let latest = repo
        .latest_records_by_kb(&kb_name)
        .await
        .expect("latest records");
    assert_eq!(latest.len(), 2);
    let error_row = &latest["/docs/b.txt"];
    assert!(error_row.status.is_error());
    assert!(error_row.rag_uri.is_error_sentinel());
    assert_eq!(error_row.uuid_filename(), None);
}

#[tokio::test]
async fn records_by_uri_returns_history_newest_first() {
    let repo = setup().await;
    let kb_name = KbName::new("docs".to_string()).unwrap();
    let kb = repo
        .create_placeholder_kb(&kb_name, "mock", &serde_json::json!({}), KbId::new(1))
        .await
        .unwrap();

    let run1 = repo
        .create_sync_run(kb.id, SyncRunStatus::Completed, None)
        .await
        .unwrap();
    let mut first = blank_record(run1, "/docs/a.txt");
    first.status = FileRecordStatus::New;
    repo.insert_file_record(&first).await.unwrap();

    let run2 = repo
        .create_sync_run(kb.id, SyncRunStatus::Completed, None)
        .await
        .unwrap();
    let mut second = blank_record(run2, "/docs/a.txt");
    second.status = FileRecordStatus::Modified;
    repo.insert_file_record(&second).await.unwrap();

    let history = repo.records_by_uri(kb.id, "/docs/a.txt").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, FileRecordStatus::Modified);
    assert_eq!(history[1].status, FileRecordStatus::New);
}

#[tokio::test]
async fn schema_bridge_finds_compatible_kb_then_falls_back_to_placeholder() {
    let repo = setup().await;

    let multi_name = KbName::new("combined".to_string()).unwrap();
    assert!(repo
        .find_compatible_kb_by_prefix(&multi_name.compatible_prefix())
        .await
        .unwrap()
        .is_none());

    let placeholder = repo
        .create_placeholder_kb(
            &KbName::new(multi_name.placeholder_name()).unwrap(),
            "azure_blob",
            &serde_json::json!({ "container": "docs" }),
            KbId::new(42),
        )
        .await
        .unwrap();
    assert_eq!(placeholder.source_type, "multi_source_placeholder");

    let found = repo
        .find_compatible_kb_by_prefix(&multi_name.compatible_prefix())
        .await
        .unwrap()
        .expect("placeholder should now be a compatible match");
    assert_eq!(found.id, placeholder.id);
}

#[tokio::test]
async fn recent_sync_runs_orders_newest_first_and_respects_limit() {
    let repo = setup().await;
    let kb_name = KbName::new("docs".to_string()).unwrap();
    let kb = repo
        .create_placeholder_kb(&kb_name, "mock", &serde_json::json!({}), KbId::new(1))
        .await
        .unwrap();

    for _ in 0..3 {
        let run_id = repo
            .create_sync_run(kb.id, SyncRunStatus::Running, None)
            .await
            .unwrap();
        repo.update_sync_run(
            run_id,
            SyncCounters::default(),
            Some(Utc::now()),
            SyncRunStatus::Completed,
            None,
        )
        .await
        .unwrap();
    }

    let recent = repo.recent_sync_runs(kb.id, 2).await.unwrap();
    assert_eq!(recent.len(), 2);
}

#[tokio::test]
async fn delta_token_round_trips_across_sources() {
    let repo = setup().await;
    let sp1 = SourceId::new("sp1".to_string()).unwrap();
    let sp2 = SourceId::new("sp2".to_string()).unwrap();

    let token1 = DeltaToken::new("cursor-sp1".to_string()).unwrap();
    let token2 = DeltaToken::new("cursor-sp2".to_string()).unwrap();

    repo.save_delta_token(&sp1, "sharepoint", "drive-1", &token1)
        .await
        .unwrap();
    repo.save_delta_token(&sp2, "sharepoint", "drive-1", &token2)
        .await
        .unwrap();

    assert_eq!(
        repo.get_delta_token(&sp1, "drive-1").await.unwrap(),
        Some(token1)
    );
    assert_eq!(
        repo.get_delta_token(&sp2, "drive-1").await.unwrap(),
        Some(token2)
    );

    repo.clear_delta_token(&sp1, "drive-1").await.unwrap();
    assert_eq!(repo.get_delta_token(&sp1, "drive-1").await.unwrap(), None);
    assert!(repo.get_delta_token(&sp2, "drive-1").await.unwrap().is_some());
}

#[tokio::test]
async fn sync_run_carries_originating_multi_source_kb_id() {
    let repo = setup().await;
    let kb_name = KbName::new("combined".to_string()).unwrap();
    let placeholder = repo
        .create_placeholder_kb(&kb_name, "mock", &serde_json::json!({}), KbId::new(7))
        .await
        .expect("create placeholder kb");

    let multi_run = repo
        .create_sync_run(placeholder.id, SyncRunStatus::Running, Some(KbId::new(7)))
        .await
        .expect("create multi-source-backed sync run");
    let single_run = repo
        .create_sync_run(placeholder.id, SyncRunStatus::Running, None)
        .await
        .expect("create plain sync run");

    let multi_stored = repo.get_sync_run(multi_run).await.unwrap().unwrap();
    assert_eq!(multi_stored.multi_source_kb_id, Some(KbId::new(7)));

    let single_stored = repo.get_sync_run(single_run).await.unwrap().unwrap();
    assert_eq!(single_stored.multi_source_kb_id, None);
}
