//! Retry behaviour of the HTTP client against a scripted local server

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use county_crop_harvester::quickstats::{
    build_client, QueryParameters, QuickStatsApi, QuickStatsError, QuickStatsHttpClient, ResultHandle,
    RetryPolicy,
};
use county_crop_harvester::Metric;

/// Serves one scripted response per connection and records each request
struct ScriptedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

async fn serve(script: Vec<(u16, &'static str)>) -> ScriptedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));

    let recorded = requests.clone();
    tokio::spawn(async move {
        let mut script = script.into_iter().cycle();
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut socket).await;
            recorded.lock().unwrap().push(request);

            let (status, body) = script.next().unwrap();
            let response = format!(
                "HTTP/1.1 {status} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    ScriptedServer { base_url, requests }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buffer);
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn client(server: &ScriptedServer, attempts: u32) -> QuickStatsHttpClient {
    let http = build_client(&server.base_url).unwrap();
    QuickStatsHttpClient::new(Arc::new(http), server.base_url.clone())
        .with_retry_policy(RetryPolicy::new(attempts, Duration::from_millis(10)))
}

fn corn_yield_2020() -> QueryParameters {
    QueryParameters::for_candidate(
        "CORN",
        Metric::Yield,
        "CORN, GRAIN - YIELD, MEASURED IN BU / ACRE",
        2020,
    )
}

#[tokio::test]
async fn encode_retries_server_errors_then_succeeds() {
    let server = serve(vec![(503, "busy"), (200, "\"ABC123\"")]).await;

    let body = client(&server, 3).encode_query(&corn_yield_2020()).await.unwrap();

    assert_eq!(ResultHandle::parse(&body).unwrap().as_str(), "ABC123");
    let requests = server.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);

    let first = requests[0].to_lowercase();
    assert!(first.starts_with("post /uuid/encode"));
    assert!(first.contains("x-requested-with: xmlhttprequest"));
    assert!(first.contains("content-type: application/x-www-form-urlencoded"));
    assert!(requests[0].contains("breadcrumb=source_desc"));
    assert!(requests[0].contains("agg_level_desc=COUNTY"));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = serve(vec![(404, "missing")]).await;
    let handle = ResultHandle::parse("NOPE").unwrap();

    let result = client(&server, 3).download_export(&handle).await;

    assert!(matches!(result, Err(QuickStatsError::HttpError(_))));
    let requests = server.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET /data/spreadsheet/NOPE.csv"));
}

#[tokio::test]
async fn rate_limiting_is_retried_until_the_ceiling() {
    let server = serve(vec![(429, "slow down")]).await;

    let result = client(&server, 2).encode_query(&corn_yield_2020()).await;

    assert!(matches!(
        result,
        Err(QuickStatsError::RetriesExhausted { attempts: 2, .. })
    ));
    assert_eq!(server.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn table_request_carries_key_and_range() {
    let server = serve(vec![(200, r#"{"data": [{"Value": "1,200", "county_name": "STORY"}]}"#)]).await;

    let records = client(&server, 1)
        .with_api_key("SECRET")
        .fetch_table(&QueryParameters::for_table("CORN", Metric::Yield, 2000, 2020))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["county_name"], "STORY");
    let request = server.requests.lock().unwrap()[0].clone();
    assert!(request.starts_with("GET /api/api_GET/?key=SECRET"));
    assert!(request.contains("year__GE=2000"));
    assert!(request.contains("year__LE=2020"));
    assert!(request.contains("unit_desc=BU+%2F+ACRE"));
}
