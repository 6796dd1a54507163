//! Blocking HTTP access to the release host.
//!
//! The resolver and installers only see [`HttpClient`], so tests can swap in
//! an in-memory fake. [`UreqClient`] is the production implementation.

use crate::error::HttpError;
use std::io::Read;
use std::time::Duration;

/// Default `User-Agent` for release host requests.
pub const DEFAULT_USER_AGENT: &str = "YoutubeConverter-Updater";

/// A streaming response body.
pub struct Download {
    /// Body reader.
    pub reader: Box<dyn Read + Send>,
    /// `Content-Length`, if the server sent one.
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Minimal GET-only client used by the update core.
pub trait HttpClient: Send + Sync {
    /// GET a JSON document from the release API and return the raw body.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] on transport failure or any non-2xx status.
    fn get_json(&self, url: &str) -> Result<String, HttpError>;

    /// GET a binary asset as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] on transport failure or any non-2xx status.
    fn get_stream(&self, url: &str) -> Result<Download, HttpError>;
}

/// `ureq`-backed [`HttpClient`].
#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqClient {
    /// Build a client with the given timeouts and `User-Agent`.
    pub fn new(connect_timeout: Duration, read_timeout: Duration, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .build();
        Self {
            agent,
            user_agent: user_agent.to_owned(),
        }
    }

    fn get(&self, url: &str, accept: &str) -> Result<ureq::Response, HttpError> {
        tracing::debug!("GET {url}");
        self.agent
            .get(url)
            .set("User-Agent", &self.user_agent)
            .set("Accept", accept)
            .call()
            .map_err(|e| map_ureq_error(url, e))
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(15),
            Duration::from_secs(60),
            DEFAULT_USER_AGENT,
        )
    }
}

impl HttpClient for UreqClient {
    fn get_json(&self, url: &str) -> Result<String, HttpError> {
        let resp = self.get(url, "application/vnd.github+json")?;
        resp.into_string()
            .map_err(|e| HttpError::Transport(e.to_string()))
    }

    fn get_stream(&self, url: &str) -> Result<Download, HttpError> {
        let resp = self.get(url, "application/octet-stream")?;
        let content_length = resp
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok());
        Ok(Download {
            reader: Box::new(resp.into_reader()),
            content_length,
        })
    }
}

fn map_ureq_error(url: &str, err: ureq::Error) -> HttpError {
    match err {
        ureq::Error::Status(403, _) => HttpError::RateLimited {
            url: url.to_owned(),
        },
        ureq::Error::Status(404, _) => HttpError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::Status(code, _) => HttpError::Status {
            code,
            url: url.to_owned(),
        },
        ureq::Error::Transport(t) => HttpError::Transport(t.to_string()),
    }
}
