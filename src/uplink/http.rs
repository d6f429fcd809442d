//! HTTPS client over embassy-net and reqwless
//!
//! Certificate validation is off (`TlsVerify::None`); the backend is reached
//! without authentication.

use super::traits::{HttpClient, UplinkError};
use core::sync::atomic::{AtomicBool, Ordering};
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::Stack;
use log::debug;
use reqwless::client::{HttpClient as ReqwlessClient, TlsConfig, TlsVerify};
use reqwless::headers::ContentType;
use reqwless::request::{Method, RequestBuilder};

/// TLS record buffers must hold a full 16 KiB record plus overhead
const TLS_READ_BUF: usize = 16640;
const TLS_WRITE_BUF: usize = 4096;
const RESPONSE_BUF: usize = 2048;
const TCP_BUF: usize = 1024;

/// Set by the WiFi task once the link is up and DHCP has configured the stack
pub static NETWORK_UP: AtomicBool = AtomicBool::new(false);

/// Buffers for one HTTPS request at a time
pub struct HttpsBuffers {
    tls_read: [u8; TLS_READ_BUF],
    tls_write: [u8; TLS_WRITE_BUF],
    response: [u8; RESPONSE_BUF],
    tcp_state: TcpClientState<1, TCP_BUF, TCP_BUF>,
}

impl HttpsBuffers {
    pub const fn new() -> Self {
        Self {
            tls_read: [0; TLS_READ_BUF],
            tls_write: [0; TLS_WRITE_BUF],
            response: [0; RESPONSE_BUF],
            tcp_state: TcpClientState::new(),
        }
    }
}

/// One-shot JSON POST client
pub struct HttpsClient<'a> {
    stack: Stack<'a>,
    buffers: &'a mut HttpsBuffers,
    seed: u64,
}

impl<'a> HttpsClient<'a> {
    /// `seed` feeds the TLS handshake randomness
    pub fn new(stack: Stack<'a>, buffers: &'a mut HttpsBuffers, seed: u64) -> Self {
        Self {
            stack,
            buffers,
            seed,
        }
    }
}

impl HttpClient for HttpsClient<'_> {
    fn is_connected(&self) -> bool {
        NETWORK_UP.load(Ordering::Acquire) && self.stack.is_config_up()
    }

    async fn post_json(&mut self, url: &str, body: &str) -> Result<u16, UplinkError> {
        self.seed = self.seed.wrapping_mul(6364136223846793005).wrapping_add(1);

        let buffers = &mut *self.buffers;
        let tcp = TcpClient::new(self.stack, &buffers.tcp_state);
        let dns = DnsSocket::new(self.stack);
        let tls = TlsConfig::new(
            self.seed,
            &mut buffers.tls_read,
            &mut buffers.tls_write,
            TlsVerify::None,
        );

        let mut client = ReqwlessClient::new_with_tls(&tcp, &dns, tls);

        let mut request = client
            .request(Method::POST, url)
            .await
            .map_err(|e| {
                debug!("HTTP connect failed: {:?}", e);
                match e {
                    reqwless::Error::Dns => UplinkError::Dns,
                    _ => UplinkError::Connect,
                }
            })?
            .body(body.as_bytes())
            .content_type(ContentType::ApplicationJson);

        let response = request
            .send(&mut buffers.response)
            .await
            .map_err(|e| {
                debug!("HTTP request failed: {:?}", e);
                UplinkError::Request
            })?;

        Ok(response.status.0)
    }
}
