//! Image MIME handling and object key construction.

use uuid::Uuid;

use crate::content::slugify;
use crate::defaults::ALLOWED_IMAGE_TYPES;

/// Normalize a declared image content type.
///
/// Lowercases, drops parameters (`; charset=...`), and maps the common
/// non-standard `image/jpg` alias to `image/jpeg`.
pub fn normalize_image_type(content_type: &str) -> String {
    let base = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match base.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => base,
    }
}

/// True when the (already normalized) type may be stored.
pub fn is_allowed_image_type(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&content_type)
}

/// Detect an image type from magic bytes.
pub fn sniff_image_type(data: &[u8]) -> Option<&'static str> {
    infer::get(data)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
}

/// Resolve the effective type of an upload: the declared type when present,
/// otherwise whatever the magic bytes say.
pub fn resolve_image_type(declared: &str, data: &[u8]) -> String {
    let normalized = normalize_image_type(declared);
    if normalized.is_empty() || normalized == "application/octet-stream" {
        sniff_image_type(data)
            .map(normalize_image_type)
            .unwrap_or(normalized)
    } else {
        normalized
    }
}

/// File extension for an accepted image type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Object key for a stored image: `<user>/<galaxy-slug>/<file>.<ext>`.
pub fn build_object_key(user_id: Uuid, galaxy_name: &str, file_id: Uuid, ext: &str) -> String {
    let slug = slugify(galaxy_name);
    let folder = if slug.is_empty() { "untitled" } else { &slug };
    format!("{}/{}/{}.{}", user_id, folder, file_id, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0];

    #[test]
    fn test_jpg_alias_normalized() {
        assert_eq!(normalize_image_type("image/jpg"), "image/jpeg");
        assert_eq!(normalize_image_type("IMAGE/JPG"), "image/jpeg");
        assert_eq!(normalize_image_type("image/png; charset=binary"), "image/png");
    }

    #[test]
    fn test_allowed_types() {
        assert!(is_allowed_image_type("image/jpeg"));
        assert!(is_allowed_image_type("image/png"));
        assert!(is_allowed_image_type("image/webp"));
        assert!(!is_allowed_image_type("image/gif"));
        assert!(!is_allowed_image_type("image/jpg"));
        assert!(!is_allowed_image_type("text/plain"));
    }

    #[test]
    fn test_sniff_image_type() {
        assert_eq!(sniff_image_type(PNG_MAGIC), Some("image/png"));
        assert_eq!(sniff_image_type(JPEG_MAGIC), Some("image/jpeg"));
        assert_eq!(sniff_image_type(b"hello world"), None);
    }

    #[test]
    fn test_resolve_prefers_declared_type() {
        assert_eq!(resolve_image_type("image/jpg", PNG_MAGIC), "image/jpeg");
        assert_eq!(resolve_image_type("", PNG_MAGIC), "image/png");
        assert_eq!(
            resolve_image_type("application/octet-stream", JPEG_MAGIC),
            "image/jpeg"
        );
        assert_eq!(resolve_image_type("", b"plain text"), "");
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/webp"), "webp");
        assert_eq!(extension_for("image/gif"), "bin");
    }

    #[test]
    fn test_build_object_key() {
        let user = Uuid::nil();
        let file = Uuid::from_u128(1);
        assert_eq!(
            build_object_key(user, "Recipes & Food", file, "png"),
            format!("{}/recipes-food/{}.png", user, file)
        );
        assert_eq!(
            build_object_key(user, "???", file, "jpg"),
            format!("{}/untitled/{}.jpg", user, file)
        );
    }
}
