//! Tracing setup and structured fields

use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

use county_crop_harvester::merge::merge;

#[test]
fn test_tracing_subscriber_initialization() {
    // Either installs or finds another test's subscriber already in place
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("county_crop_harvester=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[test]
fn test_tracing_json_format() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("county_crop_harvester=info"))
        .with_test_writer()
        .try_init();

    info!(crop = "CORN", metric = "yield", year = 2020, "Resolved query");
}

#[test]
fn test_env_filter_directives_parse() {
    for directive in [
        "info",
        "county_crop_harvester=debug",
        "warn,county_crop_harvester=trace",
    ] {
        assert!(EnvFilter::try_new(directive).is_ok(), "{directive}");
    }
}

#[test]
fn test_structured_logging_inside_unit_span() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("county_crop_harvester=debug"))
        .with_test_writer()
        .try_init();

    let span = info_span!("fetch_unit", crop = "OATS", metric = "acres_planted", year = 2019);
    let _guard = span.enter();
    warn!(rank = 2, "Download failed, trying next candidate");
}

#[test]
fn test_merge_logs_without_subscriber_side_effects() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("CORN__yield__2020__H.csv");
    std::fs::write(&path, "Year,State,commodity_desc,Value\n2020,IOWA,CORN,180\n").unwrap();

    let dataset = merge(&[&path]).unwrap();
    assert_eq!(dataset.records.len(), 1);
}
