use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::translate::HttpTranslatorConfig;

pub const DEFAULT_STREAM_PORT: u16 = 8301;
pub const DEFAULT_STREAM_PATH: &str = "/ucdpext/stream";
pub const DEFAULT_DOC_ROOT: &str = "./rss";
pub const DEFAULT_URL_ROOT: &str = "http://localhost/rss/";
pub const DEFAULT_FEED_FILE: &str = "feed.xml";
pub const DEFAULT_FEED_TITLE: &str = "Machine Translation Feed";
pub const DEFAULT_FEED_DESCRIPTION: &str = "Wire stories with machine translation";
pub const DEFAULT_MAX_ITEMS: usize = 100;
pub const DEFAULT_TRANSLATE_MAX_BYTES: usize = 5000;

/// Everything the binary needs, resolved once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub feed: FeedConfig,
    pub templates: TemplateConfig,
    pub translator: HttpTranslatorConfig,
    pub translate_max_bytes: usize,
    pub verbose: bool,
}

#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub host: Option<String>,
    pub port: u16,
    /// Pinned address for `host`; DNS is bypassed when set.
    pub ip: Option<IpAddr>,
    pub path: String,
    /// PKCS#12 bundle, a PEM certificate when `client_key` is set, or one PEM
    /// holding the chain and an unencrypted PKCS#8 key.
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub cert_password: String,
    pub verify_peer: bool,
    pub replay: bool,
}

#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub doc_root: PathBuf,
    /// Always ends with `/`.
    pub url_root: String,
    pub feed_file: String,
    pub title: String,
    pub description: String,
    pub max_items: usize,
}

/// Raw template overrides. Each value is a file path, or the template text itself.
#[derive(Clone, Debug, Default)]
pub struct TemplateConfig {
    pub en_only: Option<String>,
    pub cn_only: Option<String>,
    pub enh_cnb: Option<String>,
    pub cnh_enb: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_lookup(|k| vars.get(k).cloned())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stream = StreamConfig {
            host: get("STREAM_HOST").filter(|s| !s.is_empty()),
            port: parse_or(&get, "STREAM_PORT", DEFAULT_STREAM_PORT)?,
            ip: get("STREAM_IP")
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<IpAddr>().with_context(|| format!("STREAM_IP is not an IP address: {s}")))
                .transpose()?,
            path: get("STREAM_PATH").unwrap_or_else(|| DEFAULT_STREAM_PATH.to_string()),
            client_cert: get("STREAM_CLIENT_CERT").map(PathBuf::from),
            client_key: get("STREAM_CLIENT_KEY").map(PathBuf::from),
            cert_password: get("STREAM_CERT_PASSWORD").unwrap_or_default(),
            verify_peer: flag(&get, "STREAM_VERIFY_PEER", false),
            replay: flag(&get, "STREAM_REPLAY", false),
        };

        let max_items = parse_or(&get, "FEED_MAX_ITEMS", DEFAULT_MAX_ITEMS)?;
        if max_items == 0 { bail!("FEED_MAX_ITEMS must be at least 1"); }

        let feed = FeedConfig {
            doc_root: PathBuf::from(get("FEED_DOC_ROOT").unwrap_or_else(|| DEFAULT_DOC_ROOT.to_string())),
            url_root: normalize_url_root(&get("FEED_URL_ROOT").unwrap_or_else(|| DEFAULT_URL_ROOT.to_string()))?,
            feed_file: get("FEED_FILE").unwrap_or_else(|| DEFAULT_FEED_FILE.to_string()),
            title: get("FEED_TITLE").unwrap_or_else(|| DEFAULT_FEED_TITLE.to_string()),
            description: get("FEED_DESCRIPTION").unwrap_or_else(|| DEFAULT_FEED_DESCRIPTION.to_string()),
            max_items,
        };

        let templates = TemplateConfig {
            en_only: get("TEMPLATE_EN_ONLY"),
            cn_only: get("TEMPLATE_CN_ONLY"),
            enh_cnb: get("TEMPLATE_ENH_CNB"),
            cnh_enb: get("TEMPLATE_CNH_ENB"),
        };

        let mut translator = HttpTranslatorConfig::default();
        if let Some(url) = get("TRANSLATE_URL") { translator.base_url = url; }
        translator.api_key = get("TRANSLATE_API_KEY").filter(|s| !s.is_empty());
        if let Some(secs) = get("TRANSLATE_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().with_context(|| format!("TRANSLATE_TIMEOUT_SECS: {secs}"))?;
            translator.timeout = Duration::from_secs(secs);
        }

        Ok(AppConfig {
            stream,
            feed,
            templates,
            translator,
            translate_max_bytes: parse_or(&get, "TRANSLATE_MAX_BYTES", DEFAULT_TRANSLATE_MAX_BYTES)?,
            verbose: flag(&get, "FEED_VERBOSE", false),
        })
    }
}

impl StreamConfig {
    pub fn endpoint(&self) -> Result<Url> {
        let Some(host) = self.host.as_deref() else { bail!("STREAM_HOST is not set") };
        let raw = format!("https://{}:{}{}", host, self.port, self.path);
        Url::parse(&raw).with_context(|| format!("invalid stream endpoint: {raw}"))
    }
}

impl FeedConfig {
    pub fn manifest_path(&self) -> PathBuf { self.doc_root.join(&self.feed_file) }

    pub fn feed_url(&self) -> String { format!("{}{}", self.url_root, self.feed_file) }
}

fn normalize_url_root(raw: &str) -> Result<String> {
    let mut root = raw.trim().to_string();
    if !root.ends_with('/') { root.push('/'); }
    // friendly error before anything is written
    if Url::parse(&root).is_err() { bail!("Invalid FEED_URL_ROOT: {}", raw); }
    Ok(root)
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(v) if !v.trim().is_empty() => v.trim().parse::<T>().map_err(|e| anyhow::anyhow!("{key}={v}: {e}")),
        _ => Ok(default),
    }
}

fn flag<F>(get: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match get(key).as_deref().map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => true,
        Some(v) if v.eq_ignore_ascii_case("0") || v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.feed.max_items, 100);
        assert_eq!(cfg.translate_max_bytes, 5000);
        assert_eq!(cfg.stream.port, 8301);
        assert!(!cfg.stream.verify_peer);
        assert!(!cfg.verbose);
        assert_eq!(cfg.feed.url_root, "http://localhost/rss/");
        assert_eq!(cfg.feed.manifest_path(), PathBuf::from("./rss").join("feed.xml"));
    }

    #[test]
    fn url_root_gets_trailing_slash() {
        let cfg = load(&[("FEED_URL_ROOT", "http://10.0.0.1/rss")]).unwrap();
        assert_eq!(cfg.feed.url_root, "http://10.0.0.1/rss/");
        assert_eq!(cfg.feed.feed_url(), "http://10.0.0.1/rss/feed.xml");
    }

    #[test]
    fn rejects_zero_max_items_and_bad_ip() {
        assert!(load(&[("FEED_MAX_ITEMS", "0")]).is_err());
        assert!(load(&[("STREAM_IP", "not-an-ip")]).is_err());
        assert!(load(&[("FEED_MAX_ITEMS", "lots")]).is_err());
    }

    #[test]
    fn endpoint_requires_host() {
        let cfg = load(&[]).unwrap();
        assert!(cfg.stream.endpoint().is_err());

        let cfg = load(&[("STREAM_HOST", "wire.example.com"), ("STREAM_IP", "10.1.2.3"), ("FEED_VERBOSE", "yes")]).unwrap();
        let url = cfg.stream.endpoint().unwrap();
        assert_eq!(url.as_str(), "https://wire.example.com:8301/ucdpext/stream");
        assert_eq!(cfg.stream.ip, Some("10.1.2.3".parse().unwrap()));
        assert!(cfg.verbose);
    }
}
