//! Metric classification cascade, crop detection and value parsing

use county_crop_harvester::merge::classify::{
    classify, classify_description, classify_file_name, determine_crop, explicit_tag, parse_value,
};
use county_crop_harvester::Metric;
use rust_decimal::Decimal;
use std::str::FromStr;

#[test]
fn test_explicit_tag_beats_description() {
    let file_name = "CORN__production__2020__H.csv";
    let explicit = explicit_tag(file_name);
    assert_eq!(explicit, Some(Metric::Production));
    assert_eq!(
        classify(explicit, Some("CORN, GRAIN - YIELD, MEASURED IN BU / ACRE"), file_name),
        Some(Metric::Production)
    );
}

#[test]
fn test_description_beats_file_name() {
    assert_eq!(
        classify(None, Some("OATS - ACRES HARVESTED"), "oats_yield_legacy.csv"),
        Some(Metric::AcresHarvested)
    );
}

#[test]
fn test_file_name_is_last_resort() {
    assert_eq!(classify(None, None, "sorghum_planted.csv"), Some(Metric::AcresPlanted));
    assert_eq!(classify(None, Some("SORGHUM - PRICE RECEIVED"), "misc.csv"), None);
}

#[test]
fn test_description_keywords() {
    assert_eq!(classify_description("corn, grain - yield"), Some(Metric::Yield));
    assert_eq!(classify_description("ACRES PLANTED"), Some(Metric::AcresPlanted));
    assert_eq!(
        classify_description("WHEAT - PRODUCTION, MEASURED IN BU"),
        Some(Metric::Production)
    );
    assert_eq!(classify_description("PLANTED"), None);
}

#[test]
fn test_file_name_keywords() {
    assert_eq!(classify_file_name("area_harvested.csv"), Some(Metric::AcresHarvested));
    assert_eq!(classify_file_name("acres.csv"), Some(Metric::AcresPlanted));
    assert_eq!(classify_file_name("production.csv"), Some(Metric::Production));
    assert_eq!(classify_file_name("notes.csv"), None);
}

#[test]
fn test_crop_from_commodity_or_description() {
    assert_eq!(determine_crop(Some(" CORN "), Some("SOYBEANS - YIELD")), Some("CORN".to_string()));
    assert_eq!(
        determine_crop(None, Some("CORN, GRAIN - YIELD, MEASURED IN BU / ACRE")),
        Some("CORN".to_string())
    );
    assert_eq!(determine_crop(Some(""), Some("OATS - ACRES PLANTED")), Some("OATS".to_string()));
    assert_eq!(determine_crop(None, Some("ACRES PLANTED")), None);
    assert_eq!(determine_crop(None, None), None);
}

#[test]
fn test_value_parsing() {
    assert_eq!(parse_value("1,234,567"), Some(Decimal::from(1_234_567)));
    assert_eq!(parse_value(" 185.3 "), Some(Decimal::from_str("185.3").unwrap()));
    assert_eq!(parse_value("(D)"), None);
    assert_eq!(parse_value("(Z)"), None);
    assert_eq!(parse_value(""), None);
}
