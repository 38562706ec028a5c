// Integration tests for ConsumptionRepository
//
// These need a PostgreSQL database; they are skipped when DATABASE_URL is unset.

mod common;

use common::{at, test_pool};
use enedis_gap_filler::db::ConsumptionRepository;
use enedis_gap_filler::series::{Record, Source};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_replace_all_and_find_by_year() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = ConsumptionRepository::new(pool);

    let records = vec![
        Record::original(at(2023, 1, 1, 0), Some(0.5)),
        Record::borrowed(at(2023, 1, 1, 1), 0.65, 2024),
        Record::original(at(2023, 1, 1, 2), None),
        Record::original(at(2024, 1, 1, 1), Some(0.65)),
    ];

    let stored = repo
        .replace_all(&records)
        .await
        .expect("Failed to store records");
    assert_eq!(stored, 3, "records without a value are not stored");

    let year = repo.find_by_year(2023).await.expect("Failed to query 2023");
    assert_eq!(year.len(), 2);
    assert_eq!(year[0].timestamp, at(2023, 1, 1, 0));
    assert_eq!(year[1].source, Source::Borrowed(2024));
    assert_eq!(year[1].value, Some(0.65));

    let next = repo.find_by_year(2024).await.unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].source, Source::Original);
}

#[tokio::test]
#[serial]
async fn test_replace_all_discards_previous_rows() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = ConsumptionRepository::new(pool);

    repo.replace_all(&[
        Record::original(at(2022, 6, 1, 12), Some(1.0)),
        Record::original(at(2022, 6, 1, 13), Some(1.1)),
    ])
    .await
    .unwrap();
    assert_eq!(repo.count().await.unwrap(), 2);

    repo.replace_all(&[Record::original(at(2023, 6, 1, 12), Some(2.0))])
        .await
        .unwrap();

    assert_eq!(repo.count().await.unwrap(), 1);
    assert!(repo.find_by_year(2022).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_replace_all_keeps_first_duplicate() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = ConsumptionRepository::new(pool);

    let stored = repo
        .replace_all(&[
            Record::original(at(2023, 3, 1, 0), Some(1.0)),
            Record::borrowed(at(2023, 3, 1, 0), 9.0, 2024),
        ])
        .await
        .unwrap();

    assert_eq!(stored, 1);
    let year = repo.find_by_year(2023).await.unwrap();
    assert_eq!(year[0].value, Some(1.0));
    assert_eq!(year[0].source, Source::Original);
}
