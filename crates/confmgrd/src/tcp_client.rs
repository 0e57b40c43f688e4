//! Connection capability that tracks a daemon's TCP listener.
//!
//! `TcpProbeClient` holds a TCP connection to `localhost:<port>` of its
//! daemon. It gives the registry real connectivity without speaking any
//! configuration protocol, so every forwarded operation is refused.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use confmgr_core::{
    BulkPage, CapabilityCatalog, ClientError, ClientName, ClientResult, ConfigObject,
    ConnectionCapability,
};

/// How long a single connect attempt may take.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// TCP-backed connection capability.
pub struct TcpProbeClient {
    name: String,
    address: String,
    stream: Mutex<Option<TcpStream>>,
    connected: AtomicBool,
    connect_timeout: Duration,
}

impl TcpProbeClient {
    pub fn new() -> Self {
        Self::with_timeout(CONNECT_TIMEOUT)
    }

    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self {
            name: String::new(),
            address: String::new(),
            stream: Mutex::new(None),
            connected: AtomicBool::new(false),
            connect_timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn refuse<T>(&self, operation: &'static str) -> ClientResult<T> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected {
                client: self.name.clone(),
            });
        }
        Err(ClientError::Unsupported {
            client: self.name.clone(),
            operation,
        })
    }
}

impl Default for TcpProbeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionCapability for TcpProbeClient {
    fn initialize(&mut self, name: &ClientName, address: &str) {
        self.name = name.to_string();
        self.address = address.to_string();
    }

    async fn connect(&self) -> bool {
        let mut stream = self.stream.lock().await;
        if stream.is_some() {
            return true;
        }

        match timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(s)) => {
                *stream = Some(s);
                self.connected.store(true, Ordering::SeqCst);
                true
            }
            Ok(Err(e)) => {
                debug!(client = %self.name, address = %self.address, error = %e, "Connect failed");
                false
            }
            Err(_) => {
                debug!(client = %self.name, address = %self.address, "Connect timed out");
                false
            }
        }
    }

    async fn disconnect(&self) -> bool {
        let mut stream = self.stream.lock().await;
        self.connected.store(false, Ordering::SeqCst);
        match stream.take() {
            Some(mut s) => {
                if let Err(e) = s.shutdown().await {
                    debug!(client = %self.name, error = %e, "Shutdown failed");
                }
                true
            }
            None => false,
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn server_name(&self) -> &str {
        &self.name
    }

    async fn create(&self, _object: &ConfigObject) -> ClientResult<bool> {
        self.refuse("create")
    }

    async fn delete(&self, _object: &ConfigObject, _key: &str) -> ClientResult<bool> {
        self.refuse("delete")
    }

    async fn update(
        &self,
        _current: &ConfigObject,
        _desired: &ConfigObject,
        _changed: &[String],
        _key: &str,
    ) -> ClientResult<bool> {
        self.refuse("update")
    }

    async fn get(&self, _object: &ConfigObject) -> ClientResult<ConfigObject> {
        self.refuse("get")
    }

    async fn bulk_get(
        &self,
        _object: &ConfigObject,
        _marker: i64,
        _count: i64,
    ) -> ClientResult<BulkPage> {
        self.refuse("bulk_get")
    }

    async fn execute_action(&self, _object: &ConfigObject) -> ClientResult<()> {
        self.refuse("execute_action")
    }
}

/// Catalog offering `TcpProbeClient` for each of `names`.
pub fn tcp_catalog<S: AsRef<str>>(names: &[S]) -> CapabilityCatalog {
    let mut catalog = CapabilityCatalog::new();
    for name in names {
        catalog.register(name.as_ref(), || Box::new(TcpProbeClient::new()));
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpProbeClient::new();
        client.initialize(&ClientName::new("bgpd"), &addr.to_string());

        assert!(!client.is_connected());
        assert!(client.connect().await);
        assert!(client.is_connected());
        assert!(client.connect().await, "connecting twice is harmless");

        assert!(client.disconnect().await);
        assert!(!client.is_connected());
        assert!(!client.disconnect().await);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut client = TcpProbeClient::with_timeout(Duration::from_millis(500));
        client.initialize(&ClientName::new("vland"), &addr.to_string());

        assert!(!client.connect().await);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_operations_are_refused() {
        let mut client = TcpProbeClient::new();
        client.initialize(&ClientName::new("ribd"), "localhost:1");

        let err = client.create(&serde_json::json!({})).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::NotConnected {
                client: "ribd".to_string()
            }
        );
    }

    #[test]
    fn test_tcp_catalog() {
        let catalog = tcp_catalog(&["bgpd", "vland"]);
        assert_eq!(catalog.names(), vec!["bgpd", "vland"]);
        assert!(catalog.instantiate("ospfd").is_none());
    }
}
