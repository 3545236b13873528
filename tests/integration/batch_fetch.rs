//! Batch fetching over a fake QuickStats

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use county_crop_harvester::downloader::{BatchFetcher, FetchUnit};
use county_crop_harvester::quickstats::candidate_descriptions;
use county_crop_harvester::Metric;

use crate::support::FakeQuickStats;

fn fetcher(api: Arc<FakeQuickStats>, temp: &TempDir) -> BatchFetcher {
    BatchFetcher::new(api, temp.path())
        .with_concurrency(3)
        .with_request_delay(Duration::ZERO)
}

#[tokio::test]
async fn cached_unit_makes_no_network_calls() {
    let temp = TempDir::new().unwrap();
    let cached = temp.path().join("CORN__yield__2020__OLD.csv");
    std::fs::write(&cached, "Year,Value\n2020,180\n").unwrap();
    let api = Arc::new(FakeQuickStats::new());

    let report = fetcher(api.clone(), &temp)
        .run(vec![FetchUnit::new("CORN", Metric::Yield, 2020)])
        .await;

    assert_eq!(report.cache_hits, 1);
    assert_eq!(report.retrieved, vec![cached]);
    assert_eq!(api.encodes(), 0);
    assert_eq!(api.downloads(), 0);
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let temp = TempDir::new().unwrap();
    let candidates = candidate_descriptions("CORN", Metric::Yield);
    let api = Arc::new(
        FakeQuickStats::new()
            .with_handle(&candidates[0], 2021, "H21")
            .with_export("H21", "Year,Value\n2021,190\n"),
    );

    let first = fetcher(api.clone(), &temp)
        .run(vec![FetchUnit::new("CORN", Metric::Yield, 2021)])
        .await;
    assert_eq!(first.downloaded, 1);
    assert!(temp.path().join("CORN__yield__2021__H21.csv").exists());

    let second = fetcher(api.clone(), &temp)
        .run(vec![FetchUnit::new("CORN", Metric::Yield, 2021)])
        .await;
    assert_eq!(second.cache_hits, 1);
    assert_eq!(second.retrieved, first.retrieved);
    assert_eq!(api.encodes(), 1);
    assert_eq!(api.downloads(), 1);
}

#[tokio::test]
async fn unresolvable_unit_fails_without_output() {
    let temp = TempDir::new().unwrap();
    let api = Arc::new(FakeQuickStats::new());
    let unit = FetchUnit::new("OATS", Metric::AcresPlanted, 2019);

    let report = fetcher(api.clone(), &temp).run(vec![unit.clone()]).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.failed_units, vec![unit]);
    assert!(report.retrieved.is_empty());
    assert_eq!(
        api.encodes(),
        candidate_descriptions("OATS", Metric::AcresPlanted).len()
    );
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn failed_download_falls_through_to_next_candidate() {
    let temp = TempDir::new().unwrap();
    let candidates = candidate_descriptions("CORN", Metric::Yield);
    let api = Arc::new(
        FakeQuickStats::new()
            .with_handle(&candidates[0], 2020, "BROKEN")
            .with_handle(&candidates[1], 2020, "WORKS")
            .with_export("WORKS", "Year,Value\n2020,185.3\n"),
    );

    let report = fetcher(api.clone(), &temp)
        .run(vec![FetchUnit::new("CORN", Metric::Yield, 2020)])
        .await;

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.retrieved, vec![temp.path().join("CORN__yield__2020__WORKS.csv")]);
    assert!(!temp.path().join("CORN__yield__2020__BROKEN.csv").exists());
    assert_eq!(api.encodes(), 2);
    assert_eq!(api.downloads(), 2);
}

#[tokio::test]
async fn one_failing_unit_does_not_affect_the_rest() {
    let temp = TempDir::new().unwrap();
    let corn = candidate_descriptions("CORN", Metric::Yield);
    let api = Arc::new(
        FakeQuickStats::new()
            .with_handle(&corn[0], 2020, "C20")
            .with_handle(&corn[0], 2021, "C21")
            .with_export("C20", "Year,Value\n2020,1\n")
            .with_export("C21", "Year,Value\n2021,2\n"),
    );

    let units = FetchUnit::cross_product(&["CORN", "RICE"], &[Metric::Yield], 2020..=2021);
    let report = fetcher(api, &temp).run(units).await;

    assert_eq!(report.total, 4);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.completed(), 4);
    assert!(report.failed_units.iter().all(|unit| unit.crop == "RICE"));
    assert!(report.summary().starts_with("4 of 4 units done"));
}
