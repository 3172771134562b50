//! Content extraction: URL → plain text.
//!
//! The training worker only sees the [`ContentExtractor`] port. The HTTP
//! implementation fetches with a bounded timeout and a browser user agent,
//! drops `<script>`/`<style>` blocks and comments, and flattens the remaining
//! markup to text.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

/// Error type for content extraction
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("no text content at {0}")]
    Empty(String),
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, ExtractError>;
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches pages over HTTP(S) and strips them down to text.
pub struct HttpContentExtractor {
    http: Client,
}

impl HttpContentExtractor {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ExtractError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ContentExtractor for HttpContentExtractor {
    async fn extract(&self, url: &str) -> Result<String, ExtractError> {
        let parsed = parse_http_url(url)?;

        let response = self.http.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let text = html_to_text(&body);
        if text.trim().is_empty() {
            return Err(ExtractError::Empty(url.to_string()));
        }
        Ok(text)
    }
}

/// Accept only absolute `http`/`https` URLs.
pub fn parse_http_url(raw: &str) -> Result<url::Url, ExtractError> {
    let parsed =
        url::Url::parse(raw.trim()).map_err(|e| ExtractError::InvalidUrl(format!("{raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ExtractError::InvalidUrl(format!(
            "{raw}: unsupported scheme '{other}'"
        ))),
    }
}

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>").unwrap()
});

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// A tag, with quoted attribute values allowed to contain `>`.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<(?:"[^"]*"|'[^']*'|[^'">])*>"#).unwrap());

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());

/// Flatten an HTML document to its visible text.
pub fn html_to_text(html: &str) -> String {
    let without_code = SCRIPT_STYLE_RE.replace_all(html, " ");
    let without_comments = COMMENT_RE.replace_all(&without_code, " ");
    let without_tags = TAG_RE.replace_all(&without_comments, " ");
    ENTITY_RE
        .replace_all(&without_tags, |caps: &regex::Captures| {
            decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "rsquo" => "\u{2019}",
        "lsquo" => "\u{2018}",
        "rdquo" => "\u{201D}",
        "ldquo" => "\u{201C}",
        _ => return None,
    };
    Some(decoded.to_string())
}
