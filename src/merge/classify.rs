//! Row classification, crop detection and value coercion
//!
//! Classification is a strict cascade: the export's explicit metric tag (its
//! canonical cache filename), then keywords in the row's description, then
//! keywords in the filename. The first rule that yields a metric wins.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::output::path::ExportName;
use crate::Metric;

/// Metric for a row, or `None` when no rule applies
pub fn classify(explicit: Option<Metric>, description: Option<&str>, file_name: &str) -> Option<Metric> {
    explicit
        .or_else(|| description.and_then(classify_description))
        .or_else(|| classify_file_name(file_name))
}

/// Explicit tag carried by a canonical cache filename
pub fn explicit_tag(file_name: &str) -> Option<Metric> {
    ExportName::parse(file_name).map(|name| name.metric)
}

/// Keyword match on a statistic description
pub fn classify_description(description: &str) -> Option<Metric> {
    let upper = description.to_uppercase();
    if upper.contains("YIELD") {
        Some(Metric::Yield)
    } else if upper.contains("ACRES") && upper.contains("PLANTED") {
        Some(Metric::AcresPlanted)
    } else if upper.contains("ACRES") && upper.contains("HARVESTED") {
        Some(Metric::AcresHarvested)
    } else if upper.contains("PRODUCTION") {
        Some(Metric::Production)
    } else {
        None
    }
}

/// Keyword match on a filename
pub fn classify_file_name(file_name: &str) -> Option<Metric> {
    let upper = file_name.to_uppercase();
    if upper.contains("YIELD") {
        Some(Metric::Yield)
    } else if upper.contains("HARVESTED") {
        Some(Metric::AcresHarvested)
    } else if upper.contains("ACRES") || upper.contains("PLANTED") {
        Some(Metric::AcresPlanted)
    } else if upper.contains("PRODUCTION") {
        Some(Metric::Production)
    } else {
        None
    }
}

/// Crop for a row: the commodity field, else the leading part of the description
///
/// `"CORN, GRAIN - YIELD, ..."` gives `CORN`; `"OATS - ACRES PLANTED"` gives
/// `OATS`. A description with neither separator names no crop.
///
/// Behaviour change: a comma-free description used to become the crop
/// verbatim, so `"CORN - ACRES PLANTED"` was its own crop and a bare
/// `"YIELD"` row was kept under crop `YIELD`. The ` - ` head is taken now,
/// and bare descriptions are dropped as unkeyable.
pub fn determine_crop(commodity: Option<&str>, description: Option<&str>) -> Option<String> {
    if let Some(commodity) = commodity.map(str::trim).filter(|c| !c.is_empty()) {
        return Some(commodity.to_string());
    }

    let description = description?;
    let head = match description.split_once(',') {
        Some((head, _)) => head,
        None => description.split_once(" - ")?.0,
    };
    let head = head.trim();
    (!head.is_empty()).then(|| head.to_string())
}

/// Numeric value with thousands separators removed; suppression codes are `None`
pub fn parse_value(raw: &str) -> Option<Decimal> {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned)
        .or_else(|_| Decimal::from_scientific(cleaned))
        .ok()
}
