//! Handle retrieval and the on-disk export cache

use std::sync::Arc;
use tempfile::TempDir;

use county_crop_harvester::downloader::Retriever;
use county_crop_harvester::quickstats::ResultHandle;

use crate::support::FakeQuickStats;

#[tokio::test]
async fn retrieve_writes_export() {
    let temp = TempDir::new().unwrap();
    let api = Arc::new(FakeQuickStats::new().with_export("H1", "Year,Value\n2020,1\n"));
    let destination = temp.path().join("CORN__yield__2020__H1.csv");

    let handle = ResultHandle::parse("H1").unwrap();
    assert!(Retriever::new(api.clone()).retrieve(&handle, &destination).await);

    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "Year,Value\n2020,1\n");
    assert_eq!(api.downloads(), 1);
}

#[tokio::test]
async fn existing_export_is_never_downloaded_again() {
    let temp = TempDir::new().unwrap();
    let destination = temp.path().join("CORN__yield__2020__H1.csv");
    std::fs::write(&destination, "cached").unwrap();
    let api = Arc::new(FakeQuickStats::new().with_export("H1", "fresh"));

    let handle = ResultHandle::parse("H1").unwrap();
    assert!(Retriever::new(api.clone()).retrieve(&handle, &destination).await);

    assert_eq!(api.downloads(), 0);
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "cached");
}

#[tokio::test]
async fn failed_download_leaves_no_file() {
    let temp = TempDir::new().unwrap();
    let destination = temp.path().join("CORN__yield__2020__GONE.csv");
    let api = Arc::new(FakeQuickStats::new());

    let handle = ResultHandle::parse("GONE").unwrap();
    assert!(!Retriever::new(api.clone()).retrieve(&handle, &destination).await);

    assert_eq!(api.downloads(), 1);
    assert!(!destination.exists());
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}
