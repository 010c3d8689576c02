//! Rate-limited MusicBrainz client.
//!
//! All upstream traffic flows through one FIFO queue drained by a single
//! worker task, so at most one request is ever outstanding and consecutive
//! attempts are separated by at least a second, measured from the end of
//! the previous attempt. Callers enqueue and await a completion signal;
//! they never touch the socket themselves.

use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub const MUSICBRAINZ_API_URL: &str = "https://musicbrainz.org/ws/2";

/// Floor between the end of one attempt and the start of the next.
const MIN_REQUEST_GAP: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: u32 = 2;
/// How much upstream body to keep for error details.
const BODY_SNIPPET_LEN: usize = 500;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata request timed out")]
    Timeout,

    #[error("metadata service returned {status}")]
    Http { status: u16, body: String },

    #[error("metadata request failed: {0}")]
    Network(String),

    #[error("metadata response was not the expected shape: {0}")]
    Decode(String),

    #[error("metadata worker is gone")]
    QueueClosed,
}

/// Best artist candidate for a free-text name.
#[derive(Debug, Clone)]
pub struct ArtistMatch {
    pub mbid: String,
    pub name: String,
    pub score: i64,
}

/// One release-group from the artist's canonical discography.
#[derive(Debug, Clone)]
pub struct ReleaseGroup {
    pub mb_release_group_id: String,
    pub title: String,
    pub year: Option<i64>,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
}

struct QueuedRequest {
    path: String,
    params: Vec<(String, String)>,
    respond_to: oneshot::Sender<Result<serde_json::Value, MetadataError>>,
}

/// Handle to the metadata worker. Cheap to clone; all clones share the one
/// queue and therefore the one rate limit.
#[derive(Clone)]
pub struct MetadataClient {
    queue: mpsc::UnboundedSender<QueuedRequest>,
}

impl MetadataClient {
    pub fn new(version: &str) -> Self {
        Self::with_base(MUSICBRAINZ_API_URL, version)
    }

    /// Point the client at a different base URL (tests).
    pub fn with_base(base: &str, version: &str) -> Self {
        let user_agent = format!("crate/{version} (selfhosted)");
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            // prefer v4: musicbrainz rate-limits by address and v6 routes
            // flap on some home networks
            .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(client, base.trim_end_matches('/').to_string(), rx));

        Self { queue: tx }
    }

    async fn get_json(
        &self,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<serde_json::Value, MetadataError> {
        let (tx, rx) = oneshot::channel();
        self.queue
            .send(QueuedRequest { path: path.to_string(), params, respond_to: tx })
            .map_err(|_| MetadataError::QueueClosed)?;
        rx.await.map_err(|_| MetadataError::QueueClosed)?
    }

    /// Search the artist index and return the best candidate, favouring
    /// exact (case-insensitive) name matches and earlier positions.
    pub async fn find_artist_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ArtistMatch>, MetadataError> {
        let value = self
            .get_json(
                "artist",
                vec![
                    ("query".into(), format!("artist:\"{name}\"")),
                    ("limit".into(), "5".into()),
                    ("fmt".into(), "json".into()),
                ],
            )
            .await?;

        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            artists: Vec<SearchArtist>,
        }
        #[derive(Deserialize)]
        struct SearchArtist {
            id: String,
            name: String,
            #[serde(default)]
            score: i64,
        }

        let response: SearchResponse =
            serde_json::from_value(value).map_err(|e| MetadataError::Decode(e.to_string()))?;

        let wanted = name.to_lowercase();
        let best = response
            .artists
            .into_iter()
            .enumerate()
            .max_by_key(|(position, artist)| {
                let exact_bonus = if artist.name.to_lowercase() == wanted { 20 } else { 0 };
                artist.score + exact_bonus - *position as i64
            })
            .map(|(_, artist)| ArtistMatch {
                mbid: artist.id,
                name: artist.name,
                score: artist.score,
            });

        Ok(best)
    }

    /// Page through the artist's release-groups, keeping albums and
    /// compilations.
    pub async fn fetch_artist_albums(
        &self,
        mbid: &str,
    ) -> Result<Vec<ReleaseGroup>, MetadataError> {
        #[derive(Deserialize)]
        struct ReleaseGroupPage {
            #[serde(rename = "release-groups", default)]
            release_groups: Vec<ReleaseGroupItem>,
            #[serde(rename = "release-group-count", default)]
            count: i64,
        }
        #[derive(Deserialize)]
        struct ReleaseGroupItem {
            id: String,
            title: String,
            #[serde(rename = "primary-type")]
            primary_type: Option<String>,
            #[serde(rename = "secondary-types", default)]
            secondary_types: Vec<String>,
            #[serde(rename = "first-release-date", default)]
            first_release_date: String,
        }

        let mut releases = Vec::new();
        let mut offset: i64 = 0;

        loop {
            let value = self
                .get_json(
                    "release-group",
                    vec![
                        ("artist".into(), mbid.to_string()),
                        ("limit".into(), "100".into()),
                        ("offset".into(), offset.to_string()),
                        ("fmt".into(), "json".into()),
                    ],
                )
                .await?;

            let page: ReleaseGroupPage =
                serde_json::from_value(value).map_err(|e| MetadataError::Decode(e.to_string()))?;

            if page.release_groups.is_empty() {
                break;
            }
            offset += page.release_groups.len() as i64;

            for item in page.release_groups {
                let included = matches!(
                    item.primary_type.as_deref(),
                    Some("Album") | Some("Compilation")
                );
                if !included {
                    continue;
                }

                let year = item
                    .first_release_date
                    .get(..4)
                    .filter(|prefix| prefix.chars().all(|c| c.is_ascii_digit()))
                    .and_then(|prefix| prefix.parse::<i64>().ok());

                releases.push(ReleaseGroup {
                    mb_release_group_id: item.id,
                    title: item.title,
                    year,
                    primary_type: item.primary_type,
                    secondary_types: item.secondary_types,
                });
            }

            if offset >= page.count {
                break;
            }
        }

        Ok(releases)
    }
}

async fn run_worker(
    client: reqwest::Client,
    base: String,
    mut queue: mpsc::UnboundedReceiver<QueuedRequest>,
) {
    let mut last_attempt_end: Option<Instant> = None;

    while let Some(request) = queue.recv().await {
        let result =
            execute_with_retry(&client, &base, &request, &mut last_attempt_end).await;
        // the caller may have given up (outer timeout); that is fine
        let _ = request.respond_to.send(result);
    }
}

async fn execute_with_retry(
    client: &reqwest::Client,
    base: &str,
    request: &QueuedRequest,
    last_attempt_end: &mut Option<Instant>,
) -> Result<serde_json::Value, MetadataError> {
    let url = format!("{}/{}", base, request.path);
    let mut attempt: u32 = 0;

    loop {
        if let Some(end) = *last_attempt_end {
            let since = end.elapsed();
            if since < MIN_REQUEST_GAP {
                tokio::time::sleep(MIN_REQUEST_GAP - since).await;
            }
        }

        debug!("musicbrainz GET {} (attempt {})", request.path, attempt + 1);
        let outcome = client.get(&url).query(&request.params).send().await;

        match outcome {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let parsed = response.json::<serde_json::Value>().await;
                    *last_attempt_end = Some(Instant::now());
                    return parsed.map_err(|e| MetadataError::Network(e.to_string()));
                }

                let retry_after = parse_retry_after(&response);
                let body = response.text().await.unwrap_or_default();
                *last_attempt_end = Some(Instant::now());

                let throttled =
                    status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE;
                if throttled && attempt < MAX_RETRIES {
                    let backoff = retry_after
                        .unwrap_or_else(|| Duration::from_millis(500) * 2u32.pow(attempt));
                    warn!(
                        "musicbrainz throttled ({}), retrying in {:?}",
                        status, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }

                return Err(MetadataError::Http {
                    status: status.as_u16(),
                    body: truncate_body(body),
                });
            }
            Err(err) => {
                *last_attempt_end = Some(Instant::now());

                // transient network trouble gets one retry
                if attempt == 0 {
                    warn!("musicbrainz request failed ({err}), retrying once");
                    attempt += 1;
                    continue;
                }

                return Err(if err.is_timeout() {
                    MetadataError::Timeout
                } else {
                    MetadataError::Network(err.to_string())
                });
            }
        }
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate_body(body: String) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        return body;
    }
    let mut cut = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body[..cut].to_string()
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    fn artist_json(entries: &[(&str, &str, i64)]) -> serde_json::Value {
        serde_json::json!({
            "artists": entries
                .iter()
                .map(|(id, name, score)| serde_json::json!({
                    "id": id, "name": name, "score": score
                }))
                .collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn find_artist_prefers_exact_case_insensitive_matches() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/artist").query_param("limit", "5");
                then.status(200).json_body(artist_json(&[
                    ("mbid-trib", "New Found Glory Tribute Band", 95),
                    ("mbid-real", "new found glory", 90),
                ]));
            })
            .await;

        let client = MetadataClient::with_base(&server.base_url(), "test");
        let found = client.find_artist_by_name("New Found Glory").await.unwrap().unwrap();
        // 90 + 20 - 1 beats 95 + 0 - 0
        assert_eq!(found.mbid, "mbid-real");
    }

    #[tokio::test]
    async fn find_artist_with_no_candidates_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/artist");
                then.status(200).json_body(serde_json::json!({ "artists": [] }));
            })
            .await;

        let client = MetadataClient::with_base(&server.base_url(), "test");
        assert!(client.find_artist_by_name("Nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_albums_paginates_and_filters_types() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/release-group").query_param("offset", "0");
                then.status(200).json_body(serde_json::json!({
                    "release-group-count": 3,
                    "release-groups": [
                        {
                            "id": "rg-1", "title": "Sticks and Stones",
                            "primary-type": "Album", "secondary-types": [],
                            "first-release-date": "2002-06-11"
                        },
                        {
                            "id": "rg-2", "title": "Single Thing",
                            "primary-type": "Single", "secondary-types": [],
                            "first-release-date": "2003"
                        }
                    ]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/release-group").query_param("offset", "2");
                then.status(200).json_body(serde_json::json!({
                    "release-group-count": 3,
                    "release-groups": [
                        {
                            "id": "rg-3", "title": "Hits",
                            "primary-type": "Compilation", "secondary-types": ["Live"],
                            "first-release-date": "unknown"
                        }
                    ]
                }));
            })
            .await;

        let client = MetadataClient::with_base(&server.base_url(), "test");
        let releases = client.fetch_artist_albums("mbid-x").await.unwrap();

        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].mb_release_group_id, "rg-1");
        assert_eq!(releases[0].year, Some(2002));
        assert_eq!(releases[1].mb_release_group_id, "rg-3");
        assert_eq!(releases[1].year, None);
        assert_eq!(releases[1].secondary_types, vec!["Live".to_string()]);
    }

    #[tokio::test]
    async fn non_retryable_failures_carry_status_and_truncated_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/artist");
                then.status(400).body("x".repeat(800));
            })
            .await;

        let client = MetadataClient::with_base(&server.base_url(), "test");
        let err = client.find_artist_by_name("X").await.unwrap_err();
        match err {
            MetadataError::Http { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body.len(), 500);
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn consecutive_requests_keep_the_minimum_gap() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/artist");
                then.status(200).json_body(serde_json::json!({ "artists": [] }));
            })
            .await;

        let client = MetadataClient::with_base(&server.base_url(), "test");
        let started = Instant::now();
        client.find_artist_by_name("A").await.unwrap();
        client.find_artist_by_name("B").await.unwrap();
        assert!(started.elapsed() >= MIN_REQUEST_GAP);
    }

    /// Tiny one-shot HTTP server: answers 429 with Retry-After once, then
    /// 200. httpmock cannot express call-count-dependent responses.
    async fn throttle_then_succeed() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for hit in 0..2 {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;

                let response = if hit == 0 {
                    "HTTP/1.1 429 Too Many Requests\r\nRetry-After: 2\r\n\
                     Content-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string()
                } else {
                    let body = r#"{"artists":[{"id":"mbid-1","name":"X","score":100}]}"#;
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    )
                };
                socket.write_all(response.as_bytes()).await.unwrap();
            }
        });

        addr
    }

    #[tokio::test]
    async fn rate_limited_responses_honor_retry_after() {
        let addr = throttle_then_succeed().await;
        let client = MetadataClient::with_base(&format!("http://{addr}"), "test");

        let started = Instant::now();
        let found = client.find_artist_by_name("X").await.unwrap().unwrap();

        assert_eq!(found.mbid, "mbid-1");
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
