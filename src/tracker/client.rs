//! HTTP tracker client
//!
//! Announces to the primary tracker and, when it cannot be reached, to each
//! backup tracker in order.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

use crate::error::{Result, TorrentError};
use crate::identity::PeerId;
use crate::tracker::response::TrackerResponse;

/// How long one announce may take before it counts as a network failure
pub const DEFAULT_TRACKER_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters sent with every announce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceParams {
    pub info_hash: [u8; 20],
    pub peer_id: PeerId,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
}

impl AnnounceParams {
    /// Percent-encoded query string. The compact peer list is always requested.
    pub fn to_query(&self) -> String {
        format!(
            "info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1",
            form_urlencoded::byte_serialize(&self.info_hash).collect::<String>(),
            form_urlencoded::byte_serialize(&self.peer_id).collect::<String>(),
            self.port,
            self.uploaded,
            self.downloaded,
            self.left
        )
    }
}

/// Tracker endpoints plus the HTTP client used to reach them
#[derive(Debug)]
pub struct TrackerClient {
    http: Client,
    announce: Url,
    backups: Vec<Url>,
    params: Option<AnnounceParams>,
}

impl TrackerClient {
    /// Build a client for a primary announce URL and its backups.
    ///
    /// Only the primary URL has to be valid. Backups that do not parse are
    /// logged and dropped.
    pub fn new(announce: &str, backups: &[String], timeout: Duration) -> Result<Self> {
        let announce = parse_announce_url(announce)?;

        let mut backup_urls: Vec<Url> = Vec::new();
        for backup in backups {
            match parse_announce_url(backup) {
                Ok(url) if url == announce || backup_urls.contains(&url) => {
                    debug!("Skipping repeated tracker URL: {}", url);
                }
                Ok(url) => backup_urls.push(url),
                Err(e) => warn!("Dropping backup tracker: {}", e),
            }
        }

        let http = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| TorrentError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        info!("Tracker client ready: {} ({} backups)", announce, backup_urls.len());
        Ok(Self {
            http,
            announce,
            backups: backup_urls,
            params: None,
        })
    }

    /// Set the announce parameters used by every following request
    pub fn init_params(&mut self, info_hash: [u8; 20], peer_id: PeerId, port: u16, left: u64) {
        debug!("Announce params: port={} left={}", port, left);
        self.params = Some(AnnounceParams {
            info_hash,
            peer_id,
            port,
            uploaded: 0,
            downloaded: 0,
            left,
        });
    }

    pub fn params(&self) -> Option<&AnnounceParams> {
        self.params.as_ref()
    }

    pub fn primary(&self) -> &Url {
        &self.announce
    }

    pub fn backups(&self) -> &[Url] {
        &self.backups
    }

    /// Full announce URL for `endpoint`, keeping any query it already has
    pub fn announce_url(&self, endpoint: &Url) -> Result<Url> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| TorrentError::config_error("Announce parameters not initialised"))?;

        let query = match endpoint.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, params.to_query()),
            _ => params.to_query(),
        };
        let mut url = endpoint.clone();
        url.set_query(Some(&query));
        Ok(url)
    }

    /// Announce, falling back to backups on network failures.
    ///
    /// A tracker that answers with an unusable body ends the call; only
    /// unreachable trackers move on to the next endpoint.
    pub async fn announce(&self) -> Result<TrackerResponse> {
        let mut last_err = None;
        let mut endpoints = std::iter::once(&self.announce).chain(self.backups.iter()).peekable();
        while let Some(endpoint) = endpoints.next() {
            match self.announce_to(endpoint).await {
                Ok(response) => return Ok(response),
                // The final failure is reported by the caller.
                Err(e) if e.is_network_failure() => {
                    if let Some(next) = endpoints.peek() {
                        warn!("Tracker {} unreachable ({}), trying {}", endpoint, e, next);
                    }
                    last_err = Some(e);
                }
                Err(e) => {
                    debug!("Tracker {} returned an unusable response, not failing over", endpoint);
                    return Err(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| TorrentError::network_failure("No tracker endpoints")))
    }

    /// Announce and return the raw compact peers string
    pub async fn request_peers(&self) -> Result<Vec<u8>> {
        Ok(self.announce().await?.peers)
    }

    async fn announce_to(&self, endpoint: &Url) -> Result<TrackerResponse> {
        let url = self.announce_url(endpoint)?;
        info!("Announcing to tracker: {}", endpoint);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TorrentError::network_failure_full(
                "Tracker returned an HTTP error",
                endpoint.to_string(),
                status.to_string(),
            ));
        }

        let body = response.bytes().await?;
        debug!("Tracker {} answered with {} bytes", endpoint, body.len());
        TrackerResponse::from_bencode(&body)
    }

    /// Print configured endpoints
    pub fn print_info(&self) {
        println!("===== Tracker =====");
        println!("Announce URL: {}", self.announce);
        for backup in &self.backups {
            println!("Backup Announce URL: {}", backup);
        }
    }
}

fn parse_announce_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| TorrentError::invalid_url(raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(TorrentError::invalid_url(raw, format!("unsupported scheme '{}'", scheme))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::capture_warnings;
    use crate::tracker::mock::{announce_body, unreachable_url, MockTracker};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn ready(announce: &str, backups: &[String]) -> TrackerClient {
        let mut tracker = TrackerClient::new(announce, backups, TIMEOUT).unwrap();
        tracker.init_params([0x12; 20], *b"-RT0100-abcdefghijkl", 6881, 4096);
        tracker
    }

    #[test]
    fn test_invalid_primary_url() {
        let err = TrackerClient::new("not a url", &[], TIMEOUT).unwrap_err();
        assert!(matches!(err, TorrentError::InvalidUrl { .. }));

        let err = TrackerClient::new("udp://tracker.example.com:80", &[], TIMEOUT).unwrap_err();
        assert!(matches!(err, TorrentError::InvalidUrl { .. }));
    }

    #[test]
    fn test_bad_backups_dropped() {
        let backups = vec![
            "::garbage::".to_string(),
            "http://backup.example.com/announce".to_string(),
            "http://primary.example.com/announce".to_string(),
            "udp://tracker.example.com:6969".to_string(),
        ];
        let tracker = TrackerClient::new("http://primary.example.com/announce", &backups, TIMEOUT).unwrap();

        assert_eq!(tracker.backups().len(), 1);
        assert_eq!(tracker.backups()[0].as_str(), "http://backup.example.com/announce");
    }

    #[test]
    fn test_query_encoding() {
        let tracker = ready("http://t.example/announce", &[]);
        let url = tracker.announce_url(tracker.primary()).unwrap();
        let query = url.query().unwrap();

        assert!(query.starts_with(&format!("info_hash={}", "%12".repeat(20))));
        assert!(query.contains("peer_id=-RT0100-abcdefghijkl"));
        assert!(query.contains("port=6881"));
        assert!(query.contains("uploaded=0"));
        assert!(query.contains("downloaded=0"));
        assert!(query.contains("left=4096"));
        assert!(query.ends_with("compact=1"));
    }

    #[test]
    fn test_existing_query_preserved() {
        let tracker = ready("http://t.example/announce?passkey=abc", &[]);
        let url = tracker.announce_url(tracker.primary()).unwrap();
        assert!(url.query().unwrap().starts_with("passkey=abc&info_hash="));
    }

    #[tokio::test]
    async fn test_announce_requires_params() {
        let tracker = TrackerClient::new("http://t.example/announce", &[], TIMEOUT).unwrap();
        assert!(matches!(tracker.announce().await, Err(TorrentError::ConfigError { .. })));
    }

    #[tokio::test]
    async fn test_request_peers() {
        let peers = [127, 0, 0, 1, 0x1a, 0xe1, 127, 0, 0, 1, 0x1a, 0xe2];
        let mock = MockTracker::serve(announce_body(&peers, 900)).await;

        let tracker = ready(&mock.url, &[]);
        assert_eq!(tracker.request_peers().await.unwrap(), peers.to_vec());

        let requests = mock.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("GET /announce?info_hash="));
        assert!(requests[0].contains("compact=1"));
    }

    #[tokio::test]
    async fn test_malformed_peer_list() {
        let mock = MockTracker::serve(announce_body(&[0u8; 7], 900)).await;
        let tracker = ready(&mock.url, &[]);

        assert!(matches!(
            tracker.request_peers().await,
            Err(TorrentError::MalformedPeerList { length: 7 })
        ));
    }

    #[tokio::test]
    async fn test_failover_to_backup() {
        let peers = [10, 0, 0, 1, 0x1a, 0xe1];
        let backup = MockTracker::serve(announce_body(&peers, 900)).await;
        let primary = unreachable_url().await;

        let (logs, _guard) = capture_warnings();
        let tracker = ready(&primary, &[backup.url.clone()]);
        assert_eq!(tracker.request_peers().await.unwrap(), peers.to_vec());
        assert_eq!(backup.requests().await.len(), 1);
        assert!(logs.contents().contains(&format!("trying {}", backup.url)));
    }

    #[tokio::test]
    async fn test_backups_tried_in_order() {
        let first = MockTracker::serve(announce_body(&[10, 0, 0, 1, 0x1a, 0xe1], 900)).await;
        let second = MockTracker::serve(announce_body(&[10, 0, 0, 2, 0x1a, 0xe1], 900)).await;
        let primary = unreachable_url().await;

        let tracker = ready(&primary, &[first.url.clone(), second.url.clone()]);
        assert_eq!(tracker.request_peers().await.unwrap(), vec![10, 0, 0, 1, 0x1a, 0xe1]);
        assert!(second.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_without_backups() {
        let (logs, _guard) = capture_warnings();
        let tracker = ready(&unreachable_url().await, &[]);
        assert!(matches!(
            tracker.request_peers().await,
            Err(TorrentError::NetworkFailure { .. })
        ));
        // The returned error is the only report of the failure.
        assert_eq!(logs.contents(), "");
    }

    #[tokio::test]
    async fn test_http_error_status_fails_over() {
        let primary = MockTracker::serve_status("503 Service Unavailable", Vec::new()).await;
        let backup = MockTracker::serve(announce_body(&[10, 0, 0, 3, 0x1a, 0xe1], 900)).await;

        let tracker = ready(&primary.url, &[backup.url.clone()]);
        assert_eq!(tracker.request_peers().await.unwrap(), vec![10, 0, 0, 3, 0x1a, 0xe1]);
    }

    #[tokio::test]
    async fn test_decode_failure_does_not_fail_over() {
        let primary = MockTracker::serve(b"d14:failure reason7:go awaye".to_vec()).await;
        let backup = MockTracker::serve(announce_body(&[10, 0, 0, 3, 0x1a, 0xe1], 900)).await;

        let (logs, _guard) = capture_warnings();
        let tracker = ready(&primary.url, &[backup.url.clone()]);
        assert!(matches!(
            tracker.request_peers().await,
            Err(TorrentError::DecodeFailure { .. })
        ));
        assert!(backup.requests().await.is_empty());
        assert_eq!(logs.contents(), "");
    }

    #[tokio::test]
    async fn test_silent_tracker_times_out_to_backup() {
        let primary = MockTracker::silent().await;
        let backup = MockTracker::serve(announce_body(&[10, 0, 0, 4, 0x1a, 0xe1], 900)).await;

        let mut tracker = TrackerClient::new(&primary.url, &[backup.url.clone()], Duration::from_secs(1)).unwrap();
        tracker.init_params([0x12; 20], *b"-RT0100-abcdefghijkl", 6881, 4096);

        let started = std::time::Instant::now();
        assert_eq!(tracker.request_peers().await.unwrap(), vec![10, 0, 0, 4, 0x1a, 0xe1]);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(primary.requests().await.len(), 1);
        assert_eq!(backup.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_silent_tracker_without_backups() {
        let primary = MockTracker::silent().await;
        let mut tracker = TrackerClient::new(&primary.url, &[], Duration::from_secs(1)).unwrap();
        tracker.init_params([0x12; 20], *b"-RT0100-abcdefghijkl", 6881, 4096);

        let result = tokio::time::timeout(Duration::from_secs(5), tracker.announce()).await;
        assert!(matches!(result, Ok(Err(TorrentError::NetworkFailure { .. }))));
    }

    #[test]
    fn test_init_params_resets_counters() {
        let tracker = ready("http://t.example/announce", &[]);
        assert_eq!(
            tracker.params(),
            Some(&AnnounceParams {
                info_hash: [0x12; 20],
                peer_id: *b"-RT0100-abcdefghijkl",
                port: 6881,
                uploaded: 0,
                downloaded: 0,
                left: 4096,
            })
        );
        assert!(TrackerClient::new("http://t.example/announce", &[], TIMEOUT).unwrap().params().is_none());
    }
}
