//! Media-type inference and data-URL decomposition for image content
//! (spec.md §3, §4.1.3's image block handling).

pub struct DecodedDataUrl {
    pub media_type: String,
    pub base64_data: String,
}

/// Splits a `data:<media>;base64,<data>` URL into media type and
/// payload. Returns `None` for anything else (a plain `https://` URL,
/// for instance) — callers treat that as an opaque URL with no known
/// media type.
pub fn decode_data_url(url: &str) -> Option<DecodedDataUrl> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let media_type = header.strip_suffix(";base64")?.to_string();
    Some(DecodedDataUrl {
        media_type,
        base64_data: data.to_string(),
    })
}

pub fn build_data_url(media_type: &str, base64_data: &str) -> String {
    format!("data:{media_type};base64,{base64_data}")
}

/// Best-effort guess from a bare URL's extension, used when a provider
/// needs a media type but only a plain URL (not a data URL) was given.
pub fn infer_media_type_from_extension(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_url() {
        let decoded = decode_data_url("data:image/png;base64,AAAA").unwrap();
        assert_eq!(decoded.media_type, "image/png");
        assert_eq!(decoded.base64_data, "AAAA");
    }

    #[test]
    fn plain_url_is_not_a_data_url() {
        assert!(decode_data_url("https://example.com/cat.png").is_none());
    }

    #[test]
    fn roundtrips_through_build() {
        let url = build_data_url("image/jpeg", "ZZZZ");
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.media_type, "image/jpeg");
        assert_eq!(decoded.base64_data, "ZZZZ");
    }

    #[test]
    fn infers_from_extension() {
        assert_eq!(
            infer_media_type_from_extension("https://x.com/a/b.JPG"),
            Some("image/jpeg")
        );
        assert_eq!(infer_media_type_from_extension("https://x.com/a/b"), None);
    }
}
