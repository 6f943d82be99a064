use super::*;
use crate::database::lancedb::DistanceMetric;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_catalog() -> Result<(TempDir, Catalog)> {
    let temp_dir = TempDir::new()?;
    let catalog = Catalog::open_in_dir(temp_dir.path()).await?;
    Ok((temp_dir, catalog))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (temp_dir, catalog) = create_test_catalog().await?;

    assert!(temp_dir.path().join(CATALOG_FILE_NAME).exists());

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx%'",
    )
    .fetch_all(catalog.pool())
    .await?;

    let expected_tables: HashSet<&'static str> =
        ["collections", "ingested_documents"].into_iter().collect();
    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, expected_tables);

    Ok(())
}

#[tokio::test]
async fn integration_counter_survives_reopen() -> Result<()> {
    let (temp_dir, catalog) = create_test_catalog().await?;

    catalog
        .create_collection(NewCollection {
            name: "wiki_pages".to_string(),
            distance_metric: DistanceMetric::Cosine,
            dimension: 4,
            next_record_id: 0,
        })
        .await?;
    assert_eq!(catalog.reserve_ids("wiki_pages", 7).await?, 0);
    catalog.close().await;

    let reopened = Catalog::open_in_dir(temp_dir.path()).await?;
    let entry = reopened
        .get_collection("wiki_pages")
        .await?
        .expect("collection should persist");
    assert_eq!(entry.next_record_id(), 7);
    assert_eq!(reopened.reserve_ids("wiki_pages", 1).await?, 7);

    Ok(())
}

#[tokio::test]
async fn integration_document_history() -> Result<()> {
    let (_temp_dir, catalog) = create_test_catalog().await?;

    catalog
        .create_collection(NewCollection {
            name: "wiki_pages".to_string(),
            distance_metric: DistanceMetric::L2,
            dimension: 4,
            next_record_id: 0,
        })
        .await?;

    let first = catalog.reserve_ids("wiki_pages", 2).await?;
    let recorded = catalog
        .record_document(NewIngestedDocument {
            collection: "wiki_pages".to_string(),
            title: "Overfitting".to_string(),
            chunk_count: 2,
            first_record_id: first,
        })
        .await?;

    assert_eq!(recorded.title, "Overfitting");
    assert_eq!(catalog.count_documents("wiki_pages").await?, 1);
    assert_eq!(catalog.list_documents("wiki_pages").await?, vec![recorded]);
    assert_eq!(catalog.list_collections().await?.len(), 1);

    Ok(())
}
