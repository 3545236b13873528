//! Query parameters, breadcrumb ordering and candidate descriptions
//!
//! The encode endpoint only resolves a query when the statistic description
//! (`short_desc`) matches QuickStats' naming exactly, and that naming varies
//! by crop. Each metric therefore carries a ranked list of description
//! templates; the resolver substitutes the crop and walks the list in order.

use crate::Metric;

/// Canonical breadcrumb sequence expected by the encode endpoint
pub const BREADCRUMB_ORDER: [&str; 8] = [
    "source_desc",
    "sector_desc",
    "group_desc",
    "commodity_desc",
    "statisticcat_desc",
    "short_desc",
    "agg_level_desc",
    "year",
];

/// Filters shared by every county-level field-crop survey query
pub const FIXED_FILTERS: [(&str, &str); 4] = [
    ("source_desc", "SURVEY"),
    ("sector_desc", "CROPS"),
    ("group_desc", "FIELD CROPS"),
    ("agg_level_desc", "COUNTY"),
];

const YIELD_TEMPLATES: &[&str] = &[
    "{crop}, GRAIN - YIELD, MEASURED IN BU / ACRE",
    "{crop} - YIELD, MEASURED IN BU / ACRE",
    "{crop}, YIELD, MEASURED IN BU / ACRE",
    "{crop}, YIELD, MEASURED IN BU/ACRE",
    "{crop} - YIELD",
    "YIELD",
];

const ACRES_PLANTED_TEMPLATES: &[&str] = &[
    "ACRES PLANTED",
    "{crop} - ACRES PLANTED",
    "{crop}, ACRES PLANTED",
    "{crop} - ACRES PLANTED, MEASURED IN ACRES",
    "{crop}, ACRES PLANTED, MEASURED IN ACRES",
];

const ACRES_HARVESTED_TEMPLATES: &[&str] = &[
    "{crop} - ACRES HARVESTED",
    "{crop}, ACRES HARVESTED",
    "{crop}, GRAIN - ACRES HARVESTED",
    "ACRES HARVESTED",
];

const PRODUCTION_TEMPLATES: &[&str] = &[
    "{crop}, GRAIN - PRODUCTION, MEASURED IN BU",
    "{crop} - PRODUCTION, MEASURED IN BU",
    "{crop}, PRODUCTION, MEASURED IN BU",
    "{crop} - PRODUCTION",
];

/// Ranked description templates for a metric (rank = index)
pub fn candidate_templates(metric: Metric) -> &'static [&'static str] {
    match metric {
        Metric::Yield => YIELD_TEMPLATES,
        Metric::AcresPlanted => ACRES_PLANTED_TEMPLATES,
        Metric::AcresHarvested => ACRES_HARVESTED_TEMPLATES,
        Metric::Production => PRODUCTION_TEMPLATES,
    }
}

/// Ranked descriptions with the crop substituted
pub fn candidate_descriptions(crop: &str, metric: Metric) -> Vec<String> {
    candidate_templates(metric)
        .iter()
        .map(|template| template.replace("{crop}", crop))
        .collect()
}

/// Filter fields for one QuickStats request
///
/// Built fresh for each candidate and never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    fields: Vec<(&'static str, String)>,
}

impl QueryParameters {
    /// Only the fixed survey filters
    pub fn base() -> Self {
        Self {
            fields: FIXED_FILTERS
                .iter()
                .map(|(name, value)| (*name, (*value).to_string()))
                .collect(),
        }
    }

    /// Encode-endpoint query for one candidate description
    pub fn for_candidate(crop: &str, metric: Metric, short_desc: &str, year: i32) -> Self {
        Self::base()
            .with("commodity_desc", crop)
            .with("statisticcat_desc", metric.category())
            .with("short_desc", short_desc)
            .with("year", year.to_string())
    }

    /// Keyed-API query spanning a year range for one crop and metric
    pub fn for_table(crop: &str, metric: Metric, start_year: i32, end_year: i32) -> Self {
        let params = Self::base()
            .with("commodity_desc", crop)
            .with("statisticcat_desc", metric.category());
        let params = match metric {
            Metric::Yield => params.with("unit_desc", "BU / ACRE"),
            _ => params,
        };
        params
            .with("year__GE", start_year.to_string())
            .with("year__LE", end_year.to_string())
    }

    /// Set a field, replacing any previous value
    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Value of a field, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Fields in insertion order
    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }

    /// Breadcrumb entries: the canonical order restricted to present fields
    pub fn breadcrumbs(&self) -> Vec<&'static str> {
        BREADCRUMB_ORDER
            .iter()
            .copied()
            .filter(|name| self.get(name).is_some())
            .collect()
    }

    /// Form body for the encode endpoint: fields, then one `breadcrumb` pair each
    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = self.fields.clone();
        form.extend(
            self.breadcrumbs()
                .into_iter()
                .map(|name| ("breadcrumb", name.to_string())),
        );
        form
    }
}
