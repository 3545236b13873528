//! In-memory QuickStats double shared by the integration tests

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use county_crop_harvester::quickstats::{
    QueryParameters, QuickStatsApi, QuickStatsError, QuickStatsResult, ResultHandle, TableRecord,
};

/// Canned QuickStats responses with call counters
///
/// Encode requests are answered by `(short_desc, year)`; anything not
/// registered fails like a 400. Downloads are answered by handle.
#[derive(Default)]
pub struct FakeQuickStats {
    handles: HashMap<(String, String), String>,
    exports: HashMap<String, Bytes>,
    tables: HashMap<(String, String), Vec<TableRecord>>,
    pub encode_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub table_calls: AtomicUsize,
    pub encoded: Mutex<Vec<String>>,
}

impl FakeQuickStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the encode request for `short_desc` in `year` with `body`
    pub fn with_handle(mut self, short_desc: &str, year: i32, body: &str) -> Self {
        self.handles
            .insert((short_desc.to_string(), year.to_string()), body.to_string());
        self
    }

    /// Serve `csv` for `handle`
    pub fn with_export(mut self, handle: &str, csv: &str) -> Self {
        self.exports
            .insert(handle.to_string(), Bytes::from(csv.to_string()));
        self
    }

    /// Answer the table request for `commodity` / `category`
    pub fn with_table(mut self, commodity: &str, category: &str, records: Vec<TableRecord>) -> Self {
        self.tables
            .insert((commodity.to_string(), category.to_string()), records);
        self
    }

    pub fn encodes(&self) -> usize {
        self.encode_calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn table_requests(&self) -> usize {
        self.table_calls.load(Ordering::SeqCst)
    }

    pub fn encoded_descriptions(&self) -> Vec<String> {
        self.encoded.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuickStatsApi for FakeQuickStats {
    async fn encode_query(&self, params: &QueryParameters) -> QuickStatsResult<String> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        let short_desc = params.get("short_desc").unwrap_or_default().to_string();
        let year = params.get("year").unwrap_or_default().to_string();
        self.encoded.lock().unwrap().push(short_desc.clone());

        self.handles
            .get(&(short_desc, year))
            .cloned()
            .ok_or_else(|| QuickStatsError::HttpError("HTTP 400 Bad Request".to_string()))
    }

    async fn download_export(&self, handle: &ResultHandle) -> QuickStatsResult<Bytes> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.exports
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| QuickStatsError::RetriesExhausted {
                attempts: 3,
                last_error: "HTTP 503 Service Unavailable".to_string(),
            })
    }

    async fn fetch_table(&self, params: &QueryParameters) -> QuickStatsResult<Vec<TableRecord>> {
        self.table_calls.fetch_add(1, Ordering::SeqCst);
        let key = (
            params.get("commodity_desc").unwrap_or_default().to_string(),
            params.get("statisticcat_desc").unwrap_or_default().to_string(),
        );
        self.tables
            .get(&key)
            .cloned()
            .ok_or_else(|| QuickStatsError::HttpError("HTTP 400 Bad Request".to_string()))
    }

    fn base_url(&self) -> &str {
        "http://quickstats.test"
    }
}

/// Export with the columns QuickStats spreadsheets carry
pub fn export_csv(rows: &[(&str, &str, &str, &str, &str, &str, &str, &str)]) -> String {
    let mut csv = String::from(
        "Program,Year,State,State ANSI,County,County ANSI,Commodity,Data Item,Value,CV (%)\n",
    );
    for (year, state, state_ansi, county, county_ansi, commodity, item, value) in rows {
        csv.push_str(&format!(
            "SURVEY,{year},{state},{state_ansi},{county},{county_ansi},{commodity},\"{item}\",\"{value}\",\n"
        ));
    }
    csv
}
