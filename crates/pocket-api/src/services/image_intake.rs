//! Image intake: decode an incoming payload, validate it, and store it.
//!
//! Payloads arrive as raw base64, a `data:` URL, a remote URL to fetch, or
//! multipart bytes. Every path ends in [`IncomingImage::validate`] so the
//! type and size rules are applied once.

use std::time::Instant;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use reqwest::header;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pocket_core::{
    build_object_key, defaults, extension_for, is_allowed_image_type, new_v7, resolve_image_type,
    Error, Galaxy, Image, ImageRepository, ModelImage, NewImage, Result,
};

use crate::AppState;

const FETCH_ACCEPT: &str = "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8";
const FETCH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Standard alphabet that accepts input with or without `=` padding.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Image payload as sent in JSON bodies. Exactly one source is used, in the
/// order `base64`, `dataUrl`, `url`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub base64: Option<String>,
    pub data_url: Option<String>,
    pub url: Option<String>,
    pub content_type: Option<String>,
}

impl ImagePayload {
    pub fn is_empty(&self) -> bool {
        [&self.base64, &self.data_url, &self.url]
            .iter()
            .all(|s| s.as_deref().map_or(true, |v| v.trim().is_empty()))
    }
}

/// Validated image bytes with their normalized content type.
#[derive(Debug, Clone)]
pub struct IncomingImage {
    pub data: Vec<u8>,
    pub content_type: String,
}

impl IncomingImage {
    /// Apply the intake rules: non-empty, allowed type, size cap.
    ///
    /// The declared type is normalized; when it is blank the magic bytes
    /// decide.
    pub fn validate(data: Vec<u8>, declared_type: &str) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidInput("Image is empty".to_string()));
        }
        let content_type = resolve_image_type(declared_type, &data);
        if !is_allowed_image_type(&content_type) {
            return Err(Error::UnsupportedMediaType("invalid img type".to_string()));
        }
        if data.len() > defaults::MAX_IMAGE_BYTES {
            return Err(Error::PayloadTooLarge("img size too large".to_string()));
        }
        Ok(Self { data, content_type })
    }

    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(&self.data))
    }

    pub fn to_model_image(&self) -> ModelImage {
        ModelImage {
            data: self.data.clone(),
            mime_type: self.content_type.clone(),
        }
    }
}

/// An image row together with a fresh signed URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    #[serde(flatten)]
    pub image: Image,
    pub galaxy_id: Uuid,
    pub signed_url: Option<String>,
}

/// Resolve a JSON payload to validated image bytes.
pub async fn decode_payload(
    http: &reqwest::Client,
    payload: &ImagePayload,
) -> Result<IncomingImage> {
    let declared = payload.content_type.as_deref().unwrap_or_default();

    if let Some(b64) = non_blank(&payload.base64) {
        // Clients sometimes put a full data URL in the base64 field.
        if b64.starts_with("data:") {
            let (ct, data) = parse_data_url(b64)?;
            let declared = if declared.trim().is_empty() { ct.as_str() } else { declared };
            return IncomingImage::validate(data, declared);
        }
        return IncomingImage::validate(decode_base64(b64)?, declared);
    }

    if let Some(url) = non_blank(&payload.data_url) {
        let (ct, data) = parse_data_url(url)?;
        return IncomingImage::validate(data, &ct);
    }

    if let Some(url) = non_blank(&payload.url) {
        let (data, fetched_type) = fetch_remote(http, url, defaults::MAX_IMAGE_BYTES).await?;
        // The server's Content-Type wins over the declared one.
        let effective = if fetched_type.trim().is_empty() {
            declared
        } else {
            fetched_type.as_str()
        };
        return IncomingImage::validate(data, effective);
    }

    Err(Error::InvalidInput("No img".to_string()))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Decode standard base64, padded or not, ignoring embedded whitespace.
/// Oversized input is rejected before decoding.
pub fn decode_base64(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if cleaned.len() / 4 * 3 > defaults::MAX_IMAGE_BYTES + 3 {
        return Err(Error::PayloadTooLarge("img size too large".to_string()));
    }
    BASE64_LENIENT
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("Invalid base64 image data: {}", e)))
}

/// Split `data:<type>;base64,<payload>` into its content type and bytes.
pub fn parse_data_url(input: &str) -> Result<(String, Vec<u8>)> {
    let rest = input
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| Error::InvalidInput("Invalid data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidInput("Invalid data URL".to_string()))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| Error::InvalidInput("Data URL must be base64-encoded".to_string()))?;
    Ok((content_type.to_string(), decode_base64(payload)?))
}

/// GET an image over http(s), reading at most `max_bytes` of body.
///
/// The cap is enforced while streaming, so a response without a
/// Content-Length cannot grow past it in memory.
async fn fetch_remote(
    http: &reqwest::Client,
    raw_url: &str,
    max_bytes: usize,
) -> Result<(Vec<u8>, String)> {
    let url = reqwest::Url::parse(raw_url)
        .map_err(|_| Error::InvalidInput("Invalid image URL".to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(
            "Image URL must use http or https".to_string(),
        ));
    }
    let referer = format!("{}/", url.origin().ascii_serialization());

    let start = Instant::now();
    let mut response = http
        .get(url.clone())
        .header(header::ACCEPT, FETCH_ACCEPT)
        .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .header(header::USER_AGENT, FETCH_USER_AGENT)
        .header(header::REFERER, referer)
        .send()
        .await
        .map_err(|e| Error::InvalidInput(format!("Failed to fetch image: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::InvalidInput(format!(
            "Failed to fetch image (HTTP {})",
            status.as_u16()
        )));
    }
    if response
        .content_length()
        .is_some_and(|len| len > max_bytes as u64)
    {
        return Err(Error::PayloadTooLarge("img size too large".to_string()));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::InvalidInput(format!("Failed to read image body: {}", e)))?
    {
        if body.len() + chunk.len() > max_bytes {
            debug!(
                subsystem = "api",
                component = "image_intake",
                host = url.host_str().unwrap_or_default(),
                limit_bytes = max_bytes,
                "Remote image exceeded size cap while streaming"
            );
            return Err(Error::PayloadTooLarge("img size too large".to_string()));
        }
        body.extend_from_slice(&chunk);
    }

    debug!(
        subsystem = "api",
        component = "image_intake",
        host = url.host_str().unwrap_or_default(),
        size_bytes = body.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Fetched remote image"
    );
    Ok((body, content_type))
}

/// Upload validated bytes and record the image row linked to `galaxy`.
///
/// If the row cannot be written the uploaded object is removed again. A
/// failure to sign the URL is logged and reported as `None`.
pub async fn store_image(
    state: &AppState,
    user_id: Uuid,
    galaxy: &Galaxy,
    incoming: &IncomingImage,
) -> Result<StoredImage> {
    let object_key = build_object_key(
        user_id,
        &galaxy.name,
        new_v7(),
        extension_for(&incoming.content_type),
    );
    let checksum = incoming.checksum();

    state
        .storage
        .put(&object_key, &incoming.data, &incoming.content_type)
        .await?;

    let new_image = NewImage {
        user_id,
        bucket: state.storage.bucket().to_string(),
        object_key: object_key.clone(),
        content_type: incoming.content_type.clone(),
        size_bytes: incoming.data.len() as i64,
        checksum_sha256: checksum,
        is_public: false,
    };

    let image = match state.db.images.create(new_image, Some(galaxy.id)).await {
        Ok(image) => image,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&object_key).await {
                warn!(
                    subsystem = "api",
                    component = "image_intake",
                    object_key = %object_key,
                    error = %cleanup,
                    "Failed to remove object after metadata write failed"
                );
            }
            return Err(e);
        }
    };

    let signed_url = signed_url_for(state, &image.object_key).await;

    info!(
        subsystem = "api",
        component = "image_intake",
        user_id = %user_id,
        galaxy_id = %galaxy.id,
        image_id = %image.id,
        size_bytes = image.size_bytes,
        content_type = %image.content_type,
        "Image stored"
    );

    Ok(StoredImage {
        image,
        galaxy_id: galaxy.id,
        signed_url,
    })
}

/// Signed URL for an object, or `None` (logged) when signing fails.
pub async fn signed_url_for(state: &AppState, object_key: &str) -> Option<String> {
    match state
        .storage
        .signed_url(object_key, defaults::SIGNED_URL_TTL_SECS)
        .await
    {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(
                subsystem = "api",
                component = "image_intake",
                object_key = %object_key,
                error = %e,
                "Failed to sign image URL"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_validate_normalizes_and_sniffs() {
        let img = IncomingImage::validate(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpg").unwrap();
        assert_eq!(img.content_type, "image/jpeg");

        let img = IncomingImage::validate(PNG.to_vec(), "").unwrap();
        assert_eq!(img.content_type, "image/png");
    }

    #[test]
    fn test_validate_rejections() {
        assert!(matches!(
            IncomingImage::validate(Vec::new(), "image/png"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            IncomingImage::validate(b"GIF89a".to_vec(), "image/gif"),
            Err(Error::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            IncomingImage::validate(vec![0u8; defaults::MAX_IMAGE_BYTES + 1], "image/png"),
            Err(Error::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_exact_size_limit_accepted() {
        let img = IncomingImage::validate(vec![0u8; defaults::MAX_IMAGE_BYTES], "image/webp");
        assert!(img.is_ok());
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        let img = IncomingImage::validate(b"abc".to_vec(), "image/png").unwrap();
        assert_eq!(
            img.checksum(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_parse_data_url() {
        let (ct, data) = parse_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(ct, "image/png");
        assert_eq!(&data[..4], &[0x89, b'P', b'N', b'G']);

        assert!(parse_data_url("image/png;base64,AAAA").is_err());
        assert!(parse_data_url("data:image/png,plain").is_err());
        assert!(parse_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn test_decode_base64_ignores_whitespace() {
        assert_eq!(decode_base64("YW\nJj ").unwrap(), b"abc");
        assert!(matches!(decode_base64("@@@"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_decode_base64_accepts_missing_padding() {
        assert_eq!(decode_base64("YWI").unwrap(), b"ab");
        assert_eq!(decode_base64("YWI=").unwrap(), b"ab");
        let png = decode_base64("iVBORw0KGgo").unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn test_decode_payload_sources() {
        let http = reqwest::Client::new();

        let payload = ImagePayload {
            base64: Some("iVBORw0KGgo=".into()),
            content_type: Some("image/PNG; charset=binary".into()),
            ..Default::default()
        };
        let img = decode_payload(&http, &payload).await.unwrap();
        assert_eq!(img.content_type, "image/png");

        let payload = ImagePayload {
            data_url: Some("data:image/png;base64,iVBORw0KGgo=".into()),
            ..Default::default()
        };
        assert!(decode_payload(&http, &payload).await.is_ok());

        let payload = ImagePayload {
            url: Some("ftp://example.com/a.png".into()),
            ..Default::default()
        };
        assert!(matches!(
            decode_payload(&http, &payload).await,
            Err(Error::InvalidInput(_))
        ));

        let empty = ImagePayload::default();
        assert!(empty.is_empty());
        match decode_payload(&http, &empty).await {
            Err(Error::InvalidInput(msg)) => assert_eq!(msg, "No img"),
            other => panic!("unexpected: {:?}", other.map(|i| i.content_type)),
        }
    }

    fn url_payload(url: String, content_type: Option<&str>) -> ImagePayload {
        ImagePayload {
            url: Some(url),
            content_type: content_type.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_remote_fetch_non_success_is_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let payload = url_payload(format!("{}/missing.png", server.uri()), None);
        match decode_payload(&reqwest::Client::new(), &payload).await {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("HTTP 404"), "{}", msg),
            other => panic!("unexpected: {:?}", other.map(|i| i.content_type)),
        }
    }

    #[tokio::test]
    async fn test_remote_fetch_uses_response_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo"))
            .and(header_exists("referer"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/webp")
                    .set_body_bytes(b"RIFF\0\0\0\0WEBPVP8 ".to_vec()),
            )
            .mount(&server)
            .await;
        let http = reqwest::Client::new();

        let payload = url_payload(format!("{}/photo", server.uri()), None);
        let img = decode_payload(&http, &payload).await.unwrap();
        assert_eq!(img.content_type, "image/webp");

        // A declared type does not override what the server sent.
        let payload = url_payload(format!("{}/photo", server.uri()), Some("image/png"));
        let img = decode_payload(&http, &payload).await.unwrap();
        assert_eq!(img.content_type, "image/webp");
    }

    #[tokio::test]
    async fn test_remote_fetch_declared_type_fills_missing_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raw"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG.to_vec()))
            .mount(&server)
            .await;

        let payload = url_payload(format!("{}/raw", server.uri()), Some("image/jpg"));
        let img = decode_payload(&reqwest::Client::new(), &payload).await.unwrap();
        assert_eq!(img.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_remote_fetch_oversized_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0u8; defaults::MAX_IMAGE_BYTES + 1]),
            )
            .mount(&server)
            .await;

        let payload = url_payload(format!("{}/huge.png", server.uri()), None);
        assert!(matches!(
            decode_payload(&reqwest::Client::new(), &payload).await,
            Err(Error::PayloadTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_fetch_caps_chunked_body_without_length() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 4096];
            let _ = socket.read(&mut request).await;

            let head = "HTTP/1.1 200 OK\r\ncontent-type: image/png\r\n\
                        transfer-encoding: chunked\r\nconnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let chunk = vec![0u8; 64 * 1024];
            for _ in 0..64 {
                let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                frame.extend_from_slice(&chunk);
                frame.extend_from_slice(b"\r\n");
                if socket.write_all(&frame).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });

        let url = format!("http://{}/stream.png", addr);
        let result = fetch_remote(&reqwest::Client::new(), &url, 256 * 1024).await;
        assert!(matches!(result, Err(Error::PayloadTooLarge(_))));
    }
}
