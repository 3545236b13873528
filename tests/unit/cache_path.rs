//! Cache filenames and raw-directory lookups

use county_crop_harvester::output::path::{
    cache_filename, consolidated_filename, find_cached_export, list_exports, table_filename, unit_prefix,
};
use county_crop_harvester::output::ExportName;
use county_crop_harvester::quickstats::ResultHandle;
use county_crop_harvester::{sanitize_crop_name, Metric};
use tempfile::TempDir;

#[test]
fn test_cache_filename_parses_back() {
    let handle = ResultHandle::parse("\"7A1B2C3D\"").unwrap();
    let name = cache_filename("SWEET_CORN", Metric::AcresHarvested, 2011, &handle);
    assert_eq!(name, "SWEET_CORN__acres_harvested__2011__7A1B2C3D.csv");

    let parsed = ExportName::parse(&name).unwrap();
    assert_eq!(parsed.crop_tag, "SWEET_CORN");
    assert_eq!(parsed.metric, Metric::AcresHarvested);
    assert_eq!(parsed.year, 2011);
    assert_eq!(parsed.handle, "7A1B2C3D");
}

#[test]
fn test_non_canonical_names_are_rejected() {
    for name in [
        "CORN__yield__2020.csv",
        "CORN__price__2020__H.csv",
        "CORN__yield__twenty__H.csv",
        "CORN__yield__2020__H.txt",
        "__yield__2020__H.csv",
        "us_corn_yield_county_all_years.csv",
    ] {
        assert!(ExportName::parse(name).is_none(), "{name}");
    }
}

#[test]
fn test_unit_prefix_does_not_match_longer_crop_tags() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("CORN_SILAGE__yield__2020__H1.csv"), "x").unwrap();

    assert!(find_cached_export(temp.path(), "CORN", Metric::Yield, 2020).is_none());
    assert_eq!(unit_prefix("CORN", Metric::Yield, 2020), "CORN__yield__2020__");
}

#[test]
fn test_cached_export_choice_is_stable() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("OATS__yield__2020__ZZ.csv"), "x").unwrap();
    std::fs::write(temp.path().join("OATS__yield__2020__AA.csv"), "x").unwrap();

    let found = find_cached_export(temp.path(), "OATS", Metric::Yield, 2020).unwrap();
    assert!(found.ends_with("OATS__yield__2020__AA.csv"));
}

#[test]
fn test_list_exports_ignores_other_files() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("RYE__production__2001__H.csv"), "x").unwrap();
    std::fs::write(temp.path().join("county_centroids.csv"), "x").unwrap();
    std::fs::write(temp.path().join("us_rye_production_county_all_years.csv"), "x").unwrap();
    std::fs::create_dir(temp.path().join("BARLEY__yield__2001__H.csv")).unwrap();

    let exports = list_exports(temp.path()).unwrap();
    assert_eq!(exports.len(), 1);
    assert!(exports[0].ends_with("RYE__production__2001__H.csv"));
}

#[test]
fn test_derived_filenames() {
    assert_eq!(
        consolidated_filename("CORN", Metric::AcresPlanted),
        "us_corn_area_planted_county_all_years.csv"
    );
    assert_eq!(table_filename(Metric::AcresHarvested), "us_major_crops_area_harvested.csv");
    assert_eq!(sanitize_crop_name(" upland cotton "), "UPLAND_COTTON");
}

#[test]
fn test_every_accepted_handle_parses_back_from_its_filename() {
    assert!(ResultHandle::parse("7A1B__2C3D").is_none());

    let handle = ResultHandle::parse("7A1B_2C3D").unwrap();
    let name = cache_filename("CORN", Metric::Yield, 2020, &handle);
    assert_eq!(ExportName::parse(&name).unwrap().handle, "7A1B_2C3D");
}
