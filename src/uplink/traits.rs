//! HTTP client seam for the uplink

use core::future::Future;

/// Errors while reporting to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkError {
    /// WiFi link or IP configuration is down
    NotConnected,
    /// JSON body did not fit its buffer
    BodyTooLarge,
    /// DNS lookup failed
    Dns,
    /// TCP connect or TLS handshake failed
    Connect,
    /// Request could not be written or the response read
    Request,
}

/// Minimal HTTP client: one JSON POST, returning the status code
pub trait HttpClient {
    /// True once the network is up
    fn is_connected(&self) -> bool;

    fn post_json(&mut self, url: &str, body: &str)
        -> impl Future<Output = Result<u16, UplinkError>>;
}

/// Client for builds without an uplink; never connected
pub struct Disabled;

impl HttpClient for Disabled {
    fn is_connected(&self) -> bool {
        false
    }

    async fn post_json(&mut self, _url: &str, _body: &str) -> Result<u16, UplinkError> {
        Err(UplinkError::NotConnected)
    }
}

#[cfg(test)]
pub mod mock {
    //! Recording HTTP client for testing

    use super::*;
    use heapless::{String, Vec};

    #[derive(Debug, Clone)]
    pub struct PostRecord {
        pub url: String<64>,
        pub body: String<128>,
    }

    pub struct MockHttpClient {
        pub connected: bool,
        pub response: Result<u16, UplinkError>,
        pub posts: Vec<PostRecord, 8>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self {
                connected: true,
                response: Ok(200),
                posts: Vec::new(),
            }
        }
    }

    impl Default for MockHttpClient {
        fn default() -> Self {
            Self::new()
        }
    }

    impl HttpClient for MockHttpClient {
        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn post_json(&mut self, url: &str, body: &str) -> Result<u16, UplinkError> {
            let mut record = PostRecord {
                url: String::new(),
                body: String::new(),
            };
            let _ = record.url.push_str(url);
            let _ = record.body.push_str(body);
            let _ = self.posts.push(record);
            self.response
        }
    }
}
