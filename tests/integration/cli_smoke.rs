//! Binary smoke tests that stay off the network

use assert_cmd::Command;
use tempfile::TempDir;

fn harvester() -> Command {
    Command::cargo_bin("county-crop-harvester").unwrap()
}

#[test]
fn help_lists_every_command() {
    let output = harvester().arg("--help").output().unwrap();
    assert!(output.status.success());

    let text = String::from_utf8_lossy(&output.stdout);
    for command in ["fetch", "merge", "consolidate", "table", "soil"] {
        assert!(text.contains(command), "missing {command}");
    }
}

#[test]
fn invalid_concurrency_is_rejected() {
    harvester()
        .args(["--concurrency", "64", "merge"])
        .assert()
        .failure();
}

#[test]
fn merge_of_cached_exports_writes_dataset() {
    let temp = TempDir::new().unwrap();
    let raw = temp.path().join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(
        raw.join("CORN__yield__2020__H1.csv"),
        "Year,State,State ANSI,County,County ANSI,Commodity,Data Item,Value\n\
         2020,IOWA,19,STORY,169,CORN,\"CORN, GRAIN - YIELD, MEASURED IN BU / ACRE\",185.3\n",
    )
    .unwrap();
    std::fs::write(
        raw.join("CORN__acres_planted__2020__H2.csv"),
        "Year,State,State ANSI,County,County ANSI,Commodity,Data Item,Value\n\
         2020,IOWA,19,STORY,169,CORN,\"CORN - ACRES PLANTED\",\"1,200\"\n",
    )
    .unwrap();

    let output = harvester()
        .args(["--output-format", "json", "--data-dir"])
        .arg(temp.path())
        .arg("merge")
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["command"], "merge");
    assert_eq!(summary["records"], 1);
    assert_eq!(summary["files_loaded"], 2);

    let merged = temp
        .path()
        .join("processed")
        .join("us_major_crops_county_all_years_major_crops.csv");
    let text = std::fs::read_to_string(merged).unwrap();
    assert!(text.ends_with("IOWA,19,STORY,169,2020,CORN,185.3,1200,,,2\n"));
}

#[test]
fn merge_without_exports_fails() {
    let temp = TempDir::new().unwrap();

    harvester()
        .arg("--data-dir")
        .arg(temp.path())
        .arg("merge")
        .assert()
        .failure();

    assert!(!temp
        .path()
        .join("processed")
        .join("us_major_crops_county_all_years_major_crops.csv")
        .exists());
}
