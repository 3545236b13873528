//! Soil Data Access transport
//!
//! Queries are posted as JSON `{"query", "format"}` and answered with a
//! `Table` array. With `JSON+COLUMNNAME` the first element is the header row
//! and every cell is text; a county without surveyed map units comes back as
//! an empty object.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

use super::aggregate::HorizonRow;
use super::{CountyFips, SoilError};
use crate::downloader::config::SOIL_TIMEOUT;
use crate::quickstats::{build_client, send_with_retry, RetryPolicy};

/// Soil Data Access tabular endpoint
pub const SDA_URL: &str = "https://sdmdataaccess.sc.egov.usda.gov/tabular/post.rest";

const SDA_ORIGIN: &str = "https://sdmdataaccess.sc.egov.usda.gov";
const RESPONSE_FORMAT: &str = "JSON+COLUMNNAME";

/// Horizon columns selected by [`surface_horizon_query`], in order
const HORIZON_COLUMNS: [&str; 5] = ["comppct_r", "awc_r", "claytotal_r", "ph1to1h2o_r", "om_r"];

/// Source of surface-horizon rows per county
#[async_trait]
pub trait SoilDataSource: Send + Sync {
    /// Surface horizons of every component in the county's survey area
    async fn surface_horizons(&self, county: &CountyFips) -> Result<Vec<HorizonRow>, SoilError>;
}

#[derive(Serialize)]
struct SdaRequest<'a> {
    query: &'a str,
    format: &'a str,
}

/// SQL selecting the top horizon of every component in `county`
pub fn surface_horizon_query(county: &CountyFips) -> String {
    format!(
        "SELECT co.comppct_r, ch.awc_r, ch.claytotal_r, ch.ph1to1h2o_r, ch.om_r \
         FROM legend l \
         INNER JOIN mapunit mu ON mu.lkey = l.lkey \
         INNER JOIN component co ON co.mukey = mu.mukey \
         INNER JOIN chorizon ch ON ch.cokey = co.cokey \
         WHERE l.areasymbol = '{}' AND ch.hzdept_r = 0",
        county.areasymbol()
    )
}

/// [`SoilDataSource`] over HTTP
#[derive(Debug, Clone)]
pub struct SoilDataAccessClient {
    client: Arc<Client>,
    url: String,
    retry: RetryPolicy,
}

impl SoilDataAccessClient {
    /// Client posting to `url`
    pub fn new(client: Arc<Client>, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Client against the public endpoint
    pub fn connect() -> Result<Self, SoilError> {
        Ok(Self::new(Arc::new(build_client(SDA_ORIGIN)?), SDA_URL))
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl SoilDataSource for SoilDataAccessClient {
    async fn surface_horizons(&self, county: &CountyFips) -> Result<Vec<HorizonRow>, SoilError> {
        let query = surface_horizon_query(county);
        let request = SdaRequest {
            query: &query,
            format: RESPONSE_FORMAT,
        };
        let subject = county.areasymbol();

        let body = send_with_retry(self.retry, "soil", &self.url, &subject, || {
            self.client.post(&self.url).json(&request).timeout(SOIL_TIMEOUT)
        })
        .await?;

        let response: Value =
            serde_json::from_slice(&body).map_err(|e| SoilError::Parse(format!("{subject}: {e}")))?;
        parse_table(&response)
    }
}

/// Horizon rows from a Soil Data Access response
///
/// Accepts the header-row array layout and, for plain `JSON` responses,
/// arrays of objects. A missing `Table` means no rows.
pub fn parse_table(response: &Value) -> Result<Vec<HorizonRow>, SoilError> {
    let table = match response.get("Table") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(rows)) => rows,
        Some(other) => return Err(SoilError::Parse(format!("Table is not an array: {other}"))),
    };

    match table.first() {
        None => Ok(Vec::new()),
        Some(Value::Array(header)) => {
            let positions: Vec<Option<usize>> = HORIZON_COLUMNS
                .iter()
                .map(|column| header.iter().position(|h| h.as_str() == Some(*column)))
                .collect();
            table[1..]
                .iter()
                .map(|row| -> Result<HorizonRow, SoilError> {
                    let cells = row
                        .as_array()
                        .ok_or_else(|| SoilError::Parse(format!("row is not an array: {row}")))?;
                    Ok(horizon(|column| {
                        positions[column].and_then(|i| cells.get(i)).and_then(decimal)
                    }))
                })
                .collect()
        }
        Some(Value::Object(_)) => table
            .iter()
            .map(|row| -> Result<HorizonRow, SoilError> {
                let object = row
                    .as_object()
                    .ok_or_else(|| SoilError::Parse(format!("row is not an object: {row}")))?;
                Ok(horizon(|column| {
                    object.get(HORIZON_COLUMNS[column]).and_then(decimal)
                }))
            })
            .collect(),
        Some(other) => Err(SoilError::Parse(format!("unexpected row: {other}"))),
    }
}

fn horizon(cell: impl Fn(usize) -> Option<Decimal>) -> HorizonRow {
    HorizonRow {
        comppct: cell(0),
        awc: cell(1),
        clay: cell(2),
        ph: cell(3),
        om: cell(4),
    }
}

fn decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
