//! IMAP-backed [`MailStore`].
//!
//! The `imap` crate is blocking, so every protocol exchange runs on the
//! blocking pool. Headers are fetched with `BODY.PEEK[HEADER]`, which leaves
//! `\Seen` untouched.

use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use native_tls::{TlsConnector, TlsStream};
use tracing::debug;
use tx_core::config::{MailSecurity, MailboxConfig};

use super::store::{Envelope, MailSession, MailStore};
use super::subject::subject_from_header;

type Session = ::imap::Session<TlsStream<TcpStream>>;

pub struct ImapStore {
    config: MailboxConfig,
}

impl ImapStore {
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }
}

impl std::fmt::Debug for ImapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapStore")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("username", &self.config.username)
            .field("folder", &self.config.folder)
            .finish_non_exhaustive()
    }
}

fn connect(config: &MailboxConfig) -> anyhow::Result<Session> {
    let tls = TlsConnector::new().context("build TLS connector")?;
    let addr = (config.host.as_str(), config.port);
    let client = match config.security {
        MailSecurity::Tls => ::imap::connect(addr, &config.host, &tls),
        MailSecurity::StartTls => ::imap::connect_starttls(addr, &config.host, &tls),
    }
    .map_err(|e| anyhow!("connect to {}:{} failed: {e}", config.host, config.port))?;

    let mut session = client
        .login(&config.username, &config.password)
        .map_err(|(e, _)| anyhow!("login as {} failed: {e}", config.username))?;
    session
        .select(&config.folder)
        .map_err(|e| anyhow!("select folder {} failed: {e}", config.folder))?;
    Ok(session)
}

#[async_trait]
impl MailStore for ImapStore {
    async fn open(&self) -> anyhow::Result<Box<dyn MailSession>> {
        let config = self.config.clone();
        let session = tokio::task::spawn_blocking(move || connect(&config)).await??;
        debug!("[mailbox] connected to {}:{}", self.config.host, self.config.port);
        Ok(Box::new(ImapSession {
            inner: Arc::new(Mutex::new(session)),
        }))
    }
}

struct ImapSession {
    inner: Arc<Mutex<Session>>,
}

impl ImapSession {
    /// Run `f` against the session on the blocking pool.
    async fn blocking<R, F>(&self, f: F) -> anyhow::Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Session) -> anyhow::Result<R> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut session = inner
                .lock()
                .map_err(|_| anyhow!("IMAP session lock poisoned"))?;
            f(&mut *session)
        })
        .await?
    }
}

#[async_trait]
impl MailSession for ImapSession {
    async fn fetch_unseen(&mut self) -> anyhow::Result<Vec<Envelope>> {
        self.blocking(|session| {
            let mut uids: Vec<u32> = session
                .uid_search("UNSEEN")
                .map_err(|e| anyhow!("search UNSEEN failed: {e}"))?
                .into_iter()
                .collect();
            if uids.is_empty() {
                return Ok(Vec::new());
            }
            uids.sort_unstable();

            let set = uids.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
            let fetches = session
                .uid_fetch(&set, "(UID BODY.PEEK[HEADER])")
                .map_err(|e| anyhow!("fetch headers failed: {e}"))?;

            let mut envelopes: Vec<Envelope> = fetches
                .iter()
                .filter_map(|fetch| {
                    let uid = fetch.uid?;
                    Some(Envelope {
                        uid,
                        subject: fetch.header().and_then(subject_from_header),
                    })
                })
                .collect();
            envelopes.sort_by_key(|e| e.uid);
            Ok(envelopes)
        })
        .await
    }

    async fn mark_seen(&mut self, uid: u32) -> anyhow::Result<()> {
        self.blocking(move |session| {
            session
                .uid_store(uid.to_string(), "+FLAGS (\\Seen)")
                .map_err(|e| anyhow!("flag uid {uid} as seen failed: {e}"))?;
            Ok(())
        })
        .await
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.blocking(|session| session.logout().map_err(|e| anyhow!("logout failed: {e}")))
            .await
    }
}
