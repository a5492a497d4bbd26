use crate::imap::error::{protocol_text, ImapError};
use crate::imap::session::{MailConnector, MailboxSession};
use crate::imap::types::{Credentials, MailboxInfo};
use async_imap::{types::Fetch, Client as AsyncImapClient, Session as AsyncImapSession};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use log;
use rustls::pki_types::ServerName as PkiServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream as TokioTcpStream;
use tokio::time::timeout;
use tokio_rustls::{client::TlsStream as TokioTlsStreamClient, TlsConnector};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

// --- Type Aliases ---

// Concrete Tokio types
type BaseTcpStream = TokioTcpStream;
type BaseTlsStream = TokioTlsStreamClient<BaseTcpStream>;

// Compatibility wrapper for async_imap
type CompatStream = Compat<BaseTlsStream>;

// The actual session type returned by async_imap::login
type UnderlyingImapSession = AsyncImapSession<CompatStream>;

pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// `BODY.PEEK` keeps the server from setting `\Seen`.
const HEADER_QUERY: &str = "BODY.PEEK[HEADER]";
const FULL_MESSAGE_QUERY: &str = "BODY.PEEK[]";

/// IMAP session over TLS, restricted to the read-only calls extraction needs.
pub struct ImapClient {
    session: UnderlyingImapSession,
}

// --- Internal Connection Logic ---

/// Establishes TCP connection, performs TLS handshake, and configures the stream.
async fn setup_tls_stream(
    host: &str,
    port: u16,
    tls_connector: TlsConnector,
    server_name_for_tls: PkiServerName<'static>,
) -> Result<BaseTlsStream, ImapError> {
    log::debug!("Attempting TCP connection to {}:{}...", host, port);
    let tcp_stream = BaseTcpStream::connect((host, port)).await?;
    log::debug!("TCP connected. Performing TLS handshake...");

    let tls_stream = tls_connector
        .connect(server_name_for_tls, tcp_stream)
        .await
        .map_err(|e| ImapError::Tls(e.to_string()))?;
    log::debug!("TLS handshake successful.");
    Ok(tls_stream)
}

fn tls_connector() -> Result<TlsConnector, ImapError> {
    let mut root_cert_store = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs()?;
    let (added, ignored) = root_cert_store.add_parsable_certificates(certs);
    log::debug!("Loaded {} native certs, ignored {}.", added, ignored);
    if root_cert_store.is_empty() {
        log::warn!("Root certificate store is empty after loading native certs.");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Performs IMAP login using the compatible stream.
async fn perform_imap_login(
    compat_stream: CompatStream,
    username: &str,
    password: &str,
) -> Result<UnderlyingImapSession, ImapError> {
    let client = AsyncImapClient::new(compat_stream);
    log::debug!("IMAP client created. Attempting login for user '{}'...", username);

    match client.login(username, password).await {
        Ok(session) => {
            log::info!("IMAP login successful for user: {}", username);
            Ok(session)
        }
        Err((e, _client)) => {
            log::error!("IMAP login failed for user {}: {:?}", username, e);
            Err(ImapError::Auth(protocol_text(e)))
        }
    }
}

/// Internal helper to connect, setup TLS, and login, returning the raw session.
async fn connect_and_login_internal(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
) -> Result<UnderlyingImapSession, ImapError> {
    log::info!("Starting internal connection process for {}:{}", host, port);

    let server_name_static: PkiServerName<'static> = PkiServerName::try_from(host.to_string())
        .map_err(|_| ImapError::Connection(format!("Invalid server name format: {}", host)))?;

    let tls_stream = setup_tls_stream(host, port, tls_connector()?, server_name_static).await?;
    perform_imap_login(tls_stream.compat(), username, password).await
}

impl ImapClient {
    /// Connects, performs the TLS handshake and logs in, all within `timeout_duration`.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        timeout_duration: Duration,
    ) -> Result<Self, ImapError> {
        log::info!("Public connect called for user '{}' at {}:{}", username, host, port);

        match timeout(
            timeout_duration,
            connect_and_login_internal(host, port, username, password),
        )
        .await
        {
            Ok(result) => result.map(|session| Self { session }),
            Err(_) => {
                log::error!("IMAP connect/login timed out for {} after {:?}", host, timeout_duration);
                Err(ImapError::Timeout(format!(
                    "connect/login to {}:{} did not finish within {:?}",
                    host, port, timeout_duration
                )))
            }
        }
    }

    async fn uid_fetch_all(&mut self, uid: u32, query: &str) -> Result<Vec<Fetch>, ImapError> {
        // The response stream must be drained before the next command is issued.
        let stream = self.session.uid_fetch(uid.to_string(), query).await?;
        let fetches: Vec<Fetch> = stream.try_collect().await?;
        Ok(fetches)
    }
}

#[async_trait]
impl MailboxSession for ImapClient {
    async fn select_folder(&mut self, name: &str) -> Result<MailboxInfo, ImapError> {
        let mailbox = self
            .session
            .examine(name)
            .await
            .map_err(|e| ImapError::FolderSelect(protocol_text(e)))?;
        log::debug!("Examined '{}': {} messages", name, mailbox.exists);
        Ok(MailboxInfo {
            name: name.to_string(),
            exists: mailbox.exists,
        })
    }

    async fn list_uids(&mut self) -> Result<Vec<u32>, ImapError> {
        let uids = self.session.uid_search("ALL").await?;
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch_header(&mut self, uid: u32) -> Result<Vec<u8>, ImapError> {
        let fetches = self.uid_fetch_all(uid, HEADER_QUERY).await?;
        fetches
            .iter()
            .find_map(Fetch::header)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ImapError::MissingData(format!("No header returned for UID {}", uid)))
    }

    async fn fetch_raw_message(&mut self, uid: u32) -> Result<Vec<u8>, ImapError> {
        let fetches = self.uid_fetch_all(uid, FULL_MESSAGE_QUERY).await?;
        fetches
            .iter()
            .find_map(Fetch::body)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ImapError::MissingData(format!("Message body not found for UID {}", uid)))
    }

    async fn logout(&mut self) -> Result<(), ImapError> {
        self.session.logout().await?;
        log::debug!("IMAP session logged out.");
        Ok(())
    }
}

/// [`MailConnector`] that opens real IMAP-over-TLS sessions.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    login_timeout: Duration,
}

impl ImapConnector {
    pub fn new(login_timeout: Duration) -> Self {
        Self { login_timeout }
    }
}

impl Default for ImapConnector {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_TIMEOUT)
    }
}

#[async_trait]
impl MailConnector for ImapConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MailboxSession>, ImapError> {
        let client = ImapClient::connect(
            &credentials.host,
            credentials.port,
            &credentials.username,
            &credentials.password,
            self.login_timeout,
        )
        .await?;
        Ok(Box::new(client))
    }
}
