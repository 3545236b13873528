//! Shutdown during a batch

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use county_crop_harvester::cli::commands::merge_retrieved;
use county_crop_harvester::cli::CliError;
use county_crop_harvester::downloader::{BatchFetcher, BatchReport, FetchUnit, RequestPacer};
use county_crop_harvester::merge::MergeError;
use county_crop_harvester::quickstats::candidate_descriptions;
use county_crop_harvester::shutdown::ShutdownCoordinator;
use county_crop_harvester::Metric;

use crate::support::{export_csv, FakeQuickStats};

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            true
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn shutdown_requested_before_wait_does_not_deadlock() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let handle = shutdown.clone();
    let waiter = tokio::spawn(async move {
        handle.wait_for_shutdown().await;
    });

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok(), "wait_for_shutdown() deadlocked despite shutdown already requested");
}

#[tokio::test]
async fn pacer_wakes_early_on_shutdown() {
    let shutdown = ShutdownCoordinator::shared();
    let pacer = RequestPacer::new(Duration::from_secs(60)).with_shutdown(shutdown.clone());

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.request_shutdown();
    });

    let result = tokio::time::timeout(Duration::from_secs(2), pacer.pause()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn shutdown_before_start_schedules_nothing() {
    let temp = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let units = FetchUnit::cross_product(&["CORN"], &[Metric::Yield], 2000..=2010);
    let report = BatchFetcher::new(Arc::new(FakeQuickStats::new()), temp.path())
        .with_request_delay(Duration::ZERO)
        .with_shutdown(shutdown)
        .run(units)
        .await;

    assert!(report.interrupted);
    assert_eq!(report.total, 11);
    assert!(report.completed() < report.total);
    assert!(report.summary().contains("interrupted"));
}

/// Every year of CORN yield resolvable at rank 0 with a one-row export
fn corn_yield_years(years: std::ops::RangeInclusive<i32>) -> FakeQuickStats {
    let description = candidate_descriptions("CORN", Metric::Yield)[0].clone();
    years.fold(FakeQuickStats::new(), |api, year| {
        let handle = format!("H{year}");
        let year_text = year.to_string();
        let csv = export_csv(&[(
            year_text.as_str(),
            "IOWA",
            "19",
            "STORY",
            "169",
            "CORN",
            description.as_str(),
            "180",
        )]);
        api.with_handle(&description, year, &handle)
            .with_export(&handle, &csv)
    })
}

/// One unit per request delay; shutdown lands while the second unit waits
async fn run_interrupted_after_first_unit(raw: &std::path::Path) -> BatchReport {
    let shutdown = ShutdownCoordinator::shared();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        trigger.request_shutdown();
    });

    let units = FetchUnit::cross_product(&["CORN"], &[Metric::Yield], 2000..=2005);
    BatchFetcher::new(Arc::new(corn_yield_years(2000..=2005)), raw)
        .with_concurrency(1)
        .with_request_delay(Duration::from_secs(2))
        .with_shutdown(shutdown)
        .run(units)
        .await
}

#[tokio::test(start_paused = true)]
async fn interrupted_batch_keeps_completed_exports() {
    let temp = TempDir::new().unwrap();

    let report = run_interrupted_after_first_unit(temp.path()).await;

    assert!(report.interrupted);
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.retrieved.len(), 1);
    assert!(report.retrieved[0].ends_with("CORN__yield__2000__H2000.csv"));
    assert!(report.retrieved[0].is_file());
    assert!(report.summary().starts_with("1 of 6 units done"));
}

#[tokio::test(start_paused = true)]
async fn interrupted_fetch_still_merges_what_finished() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("processed.csv");

    let report = run_interrupted_after_first_unit(temp.path()).await;
    let dataset = merge_retrieved(&report, &output).unwrap().unwrap();

    assert_eq!(dataset.records.len(), 1);
    assert_eq!(dataset.records[0].key.year, Some(2000));
    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.ends_with("IOWA,19,STORY,169,2000,CORN,180,,,,1\n"));
}

#[test]
fn interrupted_fetch_with_nothing_retrieved_skips_merge() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("processed.csv");
    let report = BatchReport {
        total: 4,
        interrupted: true,
        ..BatchReport::default()
    };

    assert!(merge_retrieved(&report, &output).unwrap().is_none());
    assert!(!output.exists());
}

#[test]
fn completed_fetch_with_nothing_retrieved_fails() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("processed.csv");
    let report = BatchReport {
        total: 4,
        failed: 4,
        ..BatchReport::default()
    };

    assert!(matches!(
        merge_retrieved(&report, &output),
        Err(CliError::MergeError(MergeError::NothingToMerge { .. }))
    ));
    assert!(!output.exists());
}
