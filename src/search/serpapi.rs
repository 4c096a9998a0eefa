// src/search/serpapi.rs — SerpApi Google Patents client

use async_trait::async_trait;

use super::PatentSearch;
use crate::core::types::PatentRecord;
use crate::infra::config::SearchConfig;
use crate::infra::errors::ScoutError;
use crate::util::normalize_patent_id;

const SERVICE: &str = "serpapi";

/// Google Patents accepts 10..=100 results per page.
const MIN_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

pub struct SerpApiClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    language: Option<String>,
    country: Option<String>,
}

impl SerpApiClient {
    pub fn new(api_key: String, client: reqwest::Client, config: &SearchConfig) -> Self {
        Self {
            api_key,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            country: config.country.clone(),
        }
    }

    async fn fetch_page(
        &self,
        query: &str,
        num: u32,
        page: u32,
    ) -> Result<serde_json::Value, ScoutError> {
        let mut params: Vec<(&str, String)> = vec![
            ("engine", "google_patents".into()),
            ("q", query.to_string()),
            ("num", num.to_string()),
            ("page", page.to_string()),
            ("api_key", self.api_key.clone()),
        ];
        if let Some(lang) = &self.language {
            params.push(("language", lang.clone()));
        }
        if let Some(country) = &self.country {
            params.push(("country", country.clone()));
        }

        tracing::debug!(query, num, page, "GET {}/search.json", self.base_url);

        let response = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| ScoutError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let msg = json["error"].as_str().unwrap_or("HTTP 429");
            return Err(ScoutError::quota(SERVICE, msg));
        }
        if !status.is_success() {
            if let Some(msg) = json["error"].as_str() {
                if let Some(err) = classify_api_error(msg) {
                    return Err(err);
                }
                // No-results reported with a non-2xx status
                return Ok(serde_json::json!({ "organic_results": [] }));
            }
            return Err(ScoutError::upstream(
                SERVICE,
                format!("HTTP {}: {}", status, body),
            ));
        }

        if let Some(msg) = json["error"].as_str() {
            if let Some(err) = classify_api_error(msg) {
                return Err(err);
            }
            tracing::info!("{}", msg);
            return Ok(serde_json::json!({ "organic_results": [] }));
        }

        if json.is_null() {
            return Err(ScoutError::upstream(SERVICE, "response body is not JSON"));
        }
        Ok(json)
    }
}

/// Classify an `error` string from a SerpApi response body.
///
/// Returns `None` when the message only says the query matched nothing.
pub(crate) fn classify_api_error(message: &str) -> Option<ScoutError> {
    let lower = message.to_lowercase();
    if lower.contains("hasn't returned any results") || lower.contains("no results") {
        return None;
    }
    if lower.contains("run out of searches")
        || lower.contains("exhausted")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        return Some(ScoutError::quota(SERVICE, message));
    }
    Some(ScoutError::upstream(SERVICE, message))
}

/// Convert `organic_results` into records, skipping entries without a number.
pub(crate) fn parse_organic_results(json: &serde_json::Value) -> Vec<PatentRecord> {
    let Some(results) = json["organic_results"].as_array() else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|item| {
            let number = str_field(item, "publication_number")
                .or_else(|| str_field(item, "patent_number"))
                .or_else(|| {
                    // "patent/US11734097B1/en"
                    str_field(item, "patent_id").and_then(|pid| pid.split('/').nth(1))
                })?;
            let id = normalize_patent_id(number);
            if id.is_empty() {
                return None;
            }

            let inventors = match &item["inventors"] {
                serde_json::Value::Array(names) => names
                    .iter()
                    .filter_map(|n| n.as_str().or_else(|| n["name"].as_str()))
                    .map(str::to_string)
                    .collect(),
                _ => str_field(item, "inventor")
                    .map(|s| vec![s.to_string()])
                    .unwrap_or_default(),
            };

            Some(PatentRecord {
                id,
                title: str_field(item, "title").unwrap_or_default().trim().to_string(),
                snippet: str_field(item, "snippet").unwrap_or_default().trim().to_string(),
                assignee: str_field(item, "assignee").unwrap_or_default().to_string(),
                publication_date: str_field(item, "publication_date")
                    .or_else(|| str_field(item, "grant_date"))
                    .unwrap_or_default()
                    .to_string(),
                filing_date: str_field(item, "filing_date").unwrap_or_default().to_string(),
                inventors,
                link: str_field(item, "link")
                    .or_else(|| str_field(item, "patent_link"))
                    .map(str::to_string),
                relevant: false,
            })
        })
        .collect()
}

fn str_field<'a>(item: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    item[key].as_str().filter(|s| !s.is_empty())
}

/// Page size for a whole paginated search. SerpApi offsets `page` by
/// `(page - 1) * num`, so `num` must stay fixed across pages.
pub(crate) fn page_size(count: u32) -> u32 {
    count.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

#[async_trait]
impl PatentSearch for SerpApiClient {
    async fn search(&self, query: &str, count: u32) -> Result<Vec<PatentRecord>, ScoutError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ScoutError::EmptyQuery);
        }
        if count == 0 {
            return Err(ScoutError::Config("result count must be positive".into()));
        }

        let num = page_size(count);
        let mut records: Vec<PatentRecord> = Vec::new();
        let mut page = 1;
        while (records.len() as u32) < count {
            let json = self.fetch_page(query, num, page).await?;
            let batch = parse_organic_results(&json);
            let short_page = (batch.len() as u32) < num;

            let before = records.len();
            for record in batch {
                if !records.iter().any(|r| r.id == record.id) {
                    records.push(record);
                }
            }

            // A page with nothing new means the upstream is repeating itself
            if short_page || records.len() == before {
                break;
            }
            page += 1;
        }

        records.truncate(count as usize);
        tracing::debug!(query, found = records.len(), "search complete");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    fn sample_response() -> serde_json::Value {
        serde_json::json!({
            "search_metadata": { "status": "Success" },
            "organic_results": [
                {
                    "position": 1,
                    "patent_id": "patent/JP2021123456A/ja",
                    "title": " 車載センサの較正方法 ",
                    "snippet": "自動運転車両のセンサを較正する",
                    "publication_date": "2021-08-30",
                    "filing_date": "2020-02-14",
                    "inventor": "山田 太郎",
                    "assignee": "トヨタ自動車株式会社",
                    "publication_number": "JP2021123456A",
                    "patent_link": "https://patents.google.com/patent/JP2021123456A/ja"
                },
                {
                    "position": 2,
                    "title": "Sensor fusion for autonomous vehicles",
                    "snippet": "Lidar and radar fusion",
                    "patent_number": "US 10,123,456 B2",
                    "inventors": ["A. Smith", "B. Jones"],
                    "grant_date": "2019-01-01",
                    "link": "https://example.com/US10123456B2"
                },
                {
                    "position": 3,
                    "title": "entry without a number"
                }
            ]
        })
    }

    #[test]
    fn test_parse_organic_results() {
        let records = parse_organic_results(&sample_response());
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].id, "JP2021123456A");
        assert_eq!(records[0].title, "車載センサの較正方法");
        assert_eq!(records[0].assignee, "トヨタ自動車株式会社");
        assert_eq!(records[0].inventors, vec!["山田 太郎".to_string()]);
        assert_eq!(records[0].publication_date, "2021-08-30");
        assert!(records[0].link.as_deref().unwrap().contains("JP2021123456A"));

        assert_eq!(records[1].id, "US10123456B2");
        assert_eq!(records[1].inventors.len(), 2);
        assert_eq!(records[1].publication_date, "2019-01-01");
        assert!(records.iter().all(|r| !r.relevant));
    }

    #[test]
    fn test_parse_id_from_patent_id_path() {
        let json = serde_json::json!({
            "organic_results": [{ "patent_id": "patent/EP1234567B1/en", "title": "t" }]
        });
        let records = parse_organic_results(&json);
        assert_eq!(records[0].id, "EP1234567B1");
    }

    #[test]
    fn test_parse_missing_results_key() {
        let json = serde_json::json!({ "search_metadata": {} });
        assert!(parse_organic_results(&json).is_empty());
    }

    #[test]
    fn test_classify_no_results_is_not_error() {
        assert!(
            classify_api_error("Google Patents hasn't returned any results for this query.")
                .is_none()
        );
    }

    #[test]
    fn test_classify_quota() {
        let err = classify_api_error("Your account has run out of searches.").unwrap();
        assert!(err.is_quota());
    }

    #[test]
    fn test_classify_invalid_key() {
        let err = classify_api_error("Invalid API key. Your API key should be here: ...").unwrap();
        assert!(err.is_upstream());
        assert!(!err.is_quota());
    }

    #[test]
    fn test_page_size_bounds() {
        assert_eq!(page_size(5), 10);
        assert_eq!(page_size(50), 50);
        assert_eq!(page_size(250), 100);
    }

    // ---------- Loopback SerpApi ----------

    type RequestLog = Arc<Mutex<Vec<(u32, u32)>>>;

    fn query_param(target: &str, key: &str) -> u32 {
        let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");
        query
            .split('&')
            .find_map(|kv| kv.strip_prefix(key)?.strip_prefix('='))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Serve `/search.json` on 127.0.0.1, logging `(num, page)` per request.
    fn serve(respond: impl Fn(u32, u32) -> (u16, String) + Send + 'static) -> (String, RequestLog) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
        let seen = log.clone();

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&head);
                let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (num, page) = (query_param(&target, "num"), query_param(&target, "page"));
                seen.lock().unwrap().push((num, page));

                let (status, body) = respond(num, page);
                let reply = format!(
                    "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });

        (format!("http://{addr}"), log)
    }

    /// Paginates `total` numbered patents the way SerpApi does: page `p`
    /// starts at offset `(p - 1) * num`.
    fn corpus(total: usize) -> impl Fn(u32, u32) -> (u16, String) + Send + 'static {
        move |num, page| {
            let start = ((page.max(1) - 1) * num) as usize;
            let end = (start + num as usize).min(total);
            let items: Vec<serde_json::Value> = (start.min(end)..end)
                .map(|i| {
                    serde_json::json!({
                        "publication_number": format!("US{:07}B2", i + 1),
                        "title": format!("Patent {}", i + 1),
                    })
                })
                .collect();
            (200, serde_json::json!({ "organic_results": items }).to_string())
        }
    }

    fn client_for(base_url: String) -> SerpApiClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        SerpApiClient::new(
            "key".into(),
            http,
            &SearchConfig {
                base_url,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_search_keeps_page_size_fixed_across_pages() {
        let (url, log) = serve(corpus(500));
        let records = client_for(url).search("lidar", 105).await.unwrap();

        assert_eq!(records.len(), 105);
        assert_eq!(records[0].id, "US0000001B2");
        assert_eq!(records[104].id, "US0000105B2");
        assert_eq!(*log.lock().unwrap(), vec![(100, 1), (100, 2)]);
    }

    #[tokio::test]
    async fn test_search_250_takes_three_requests() {
        let (url, log) = serve(corpus(500));
        let records = client_for(url).search("lidar", 250).await.unwrap();

        assert_eq!(records.len(), 250);
        assert_eq!(*log.lock().unwrap(), vec![(100, 1), (100, 2), (100, 3)]);
    }

    #[tokio::test]
    async fn test_search_stops_on_short_page() {
        let (url, log) = serve(corpus(30));
        let records = client_for(url).search("lidar", 100).await.unwrap();

        assert_eq!(records.len(), 30);
        assert_eq!(*log.lock().unwrap(), vec![(100, 1)]);
    }

    #[tokio::test]
    async fn test_search_small_count_uses_minimum_page() {
        let (url, log) = serve(corpus(500));
        let records = client_for(url).search("lidar", 5).await.unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(*log.lock().unwrap(), vec![(10, 1)]);
    }

    #[tokio::test]
    async fn test_search_stops_when_pages_repeat() {
        let first_page = corpus(100);
        let (url, log) = serve(move |num, _page| first_page(num, 1));
        let records = client_for(url).search("lidar", 300).await.unwrap();

        assert_eq!(records.len(), 100);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_http_429_is_quota() {
        let (url, _log) = serve(|_, _| {
            (429, r#"{"error":"Your account has run out of searches."}"#.to_string())
        });
        let err = client_for(url).search("lidar", 10).await.unwrap_err();
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn test_no_results_error_with_non_2xx_is_empty() {
        let (url, _log) = serve(|_, _| {
            (
                400,
                r#"{"error":"Google Patents hasn't returned any results for this query."}"#
                    .to_string(),
            )
        });
        let records = client_for(url).search("zzzz qqqq", 10).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_quota_error_body_with_200_status() {
        let (url, _log) = serve(|_, _| {
            (200, r#"{"error":"Your account has run out of searches."}"#.to_string())
        });
        let err = client_for(url).search("lidar", 10).await.unwrap_err();
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn test_non_json_200_is_upstream() {
        let (url, _log) = serve(|_, _| (200, "<html>gateway hiccup</html>".to_string()));
        let err = client_for(url).search("lidar", 10).await.unwrap_err();
        assert!(err.is_upstream());
        assert!(!err.is_quota());
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let (url, _log) = serve(|_, _| (503, "unavailable".to_string()));
        let err = client_for(url).search("lidar", 10).await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_blank_query_rejected_before_request() {
        let client = SerpApiClient::new(
            "key".into(),
            reqwest::Client::new(),
            &SearchConfig {
                base_url: "http://127.0.0.1:9".into(),
                ..Default::default()
            },
        );
        let err = client.search("   ", 10).await.unwrap_err();
        assert!(matches!(err, ScoutError::EmptyQuery));
    }
}
