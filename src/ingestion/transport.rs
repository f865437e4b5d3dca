use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Identity, Response};

use super::source::ChunkSource;
use crate::config::StreamConfig;

/// Form body of the subscription request.
pub fn form_fields(replay: bool) -> [(&'static str, &'static str); 2] {
    [("compression", "none"), ("replay", if replay { "true" } else { "false" })]
}

pub fn build_client(cfg: &StreamConfig) -> Result<Client> {
    let mut builder = Client::builder().danger_accept_invalid_certs(!cfg.verify_peer);

    if let Some(cert) = cfg.client_cert.as_deref() {
        builder = builder.identity(load_identity(cert, cfg.client_key.as_deref(), &cfg.cert_password)?);
    }
    if let (Some(host), Some(ip)) = (cfg.host.as_deref(), cfg.ip) {
        builder = builder.resolve(host, SocketAddr::new(ip, cfg.port));
    }
    builder.build().context("building stream client")
}

const PKCS8_HINT: &str = "convert it with `openssl pkcs8 -topk8 -nocrypt -in key.pem -out key.pk8.pem` \
or bundle a PKCS#12 file with `openssl pkcs12 -export`";

fn load_identity(cert: &Path, key: Option<&Path>, password: &str) -> Result<Identity> {
    let cert_bytes = std::fs::read(cert).with_context(|| format!("reading client certificate {}", cert.display()))?;
    match key {
        Some(key) => {
            let key_bytes = std::fs::read(key).with_context(|| format!("reading client key {}", key.display()))?;
            Identity::from_pkcs8_pem(&cert_bytes, &key_bytes).context("loading PEM client identity")
        }
        None if is_pem(&cert_bytes) => {
            let text = std::str::from_utf8(&cert_bytes)
                .with_context(|| format!("{} is not valid PEM text", cert.display()))?;
            let bundle = split_pem(text).with_context(|| format!("reading combined PEM {}", cert.display()))?;
            Identity::from_pkcs8_pem(bundle.certs.as_bytes(), bundle.key.as_bytes())
                .context("loading combined PEM client identity")
        }
        None => Identity::from_pkcs12_der(&cert_bytes, password).context("loading PKCS#12 client identity"),
    }
}

fn is_pem(bytes: &[u8]) -> bool {
    bytes.trim_ascii_start().starts_with(b"-----BEGIN ")
}

/// Certificate chain and private key pulled out of one PEM file.
#[derive(Debug, PartialEq)]
struct PemBundle {
    certs: String,
    key: String,
}

/// Split a combined PEM into its certificates and its single PKCS#8 key.
/// Encrypted and PKCS#1 keys are rejected with a conversion hint.
fn split_pem(text: &str) -> Result<PemBundle> {
    let mut certs = String::new();
    let mut key: Option<String> = None;
    let mut block: Option<(String, String)> = None;

    for line in text.lines().map(str::trim_end) {
        if let Some((label, body)) = block.as_mut() {
            body.push_str(line);
            body.push('\n');
            if line == format!("-----END {label}-----") {
                let (label, body) = (std::mem::take(label), std::mem::take(body));
                block = None;
                match label.as_str() {
                    "CERTIFICATE" => certs.push_str(&body),
                    "PRIVATE KEY" if key.is_none() => key = Some(body),
                    "PRIVATE KEY" => bail!("more than one private key"),
                    "ENCRYPTED PRIVATE KEY" => bail!("private key is passphrase-protected; {PKCS8_HINT}"),
                    l if l.ends_with("PRIVATE KEY") => bail!("{l} blocks are not PKCS#8; {PKCS8_HINT}"),
                    _ => {}
                }
            }
        } else if let Some(label) = line.strip_prefix("-----BEGIN ").and_then(|l| l.strip_suffix("-----")) {
            block = Some((label.to_string(), format!("{line}\n")));
        }
    }

    if let Some((label, _)) = block { bail!("unterminated {label} block"); }
    if certs.is_empty() { bail!("no CERTIFICATE block"); }
    let Some(key) = key else { bail!("no private key; {PKCS8_HINT}") };
    Ok(PemBundle { certs, key })
}

/// Subscribe and return once response headers arrive.
pub async fn connect(client: &Client, cfg: &StreamConfig) -> Result<HttpBody> {
    let url = cfg.endpoint()?;
    let response = client
        .post(url.clone())
        .form(&form_fields(cfg.replay))
        .send()
        .await
        .with_context(|| format!("connecting to {url}"))?
        .error_for_status()
        .with_context(|| format!("stream refused by {url}"))?;
    Ok(HttpBody { response, url: url.to_string() })
}

/// Streaming response body of an open subscription.
pub struct HttpBody {
    response: Response,
    url: String,
}

#[async_trait]
impl ChunkSource for HttpBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.response.chunk().await?)
    }

    fn describe(&self) -> String { self.url.clone() }
}
