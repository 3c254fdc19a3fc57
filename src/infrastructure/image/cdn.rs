//! Transformation CDN URL handling.
//!
//! CDN asset URLs look like
//! `https://res.cloudinary.com/{cloud}/image/upload/[{transformation}/]v{version}/{public_id}.{ext}`.
//! Transformations are comma-separated `key_value` tokens inserted as a path
//! segment right after the `/upload/` marker.

use crate::domain::entities::{Crop, Format, Quality, TransformOptions};

/// Host suffix identifying the transformation CDN family.
pub const CDN_HOST_SUFFIX: &str = "cloudinary.com";

/// Path marker after which transformations are inserted.
pub const UPLOAD_MARKER: &str = "/upload/";

/// Path of the backend endpoint that redirects an image id to its CDN asset.
pub const REDIRECT_PATH: &str = "/cloudinary/redirect/";

/// Name of the cache-busting query parameter.
pub const CACHE_BUSTER_PARAM: &str = "t";

/// Transformation of the tiny blurred tier.
pub const TINY_TIER_TRANSFORMATION: &str = "w_10,q_10,e_blur:1000";

/// Transformation of the low quality tier.
pub const LOW_TIER_TRANSFORMATION: &str = "w_100,q_30";

/// Checks if a URL belongs to the transformation CDN family.
#[must_use]
pub fn is_cdn_url(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| host == CDN_HOST_SUFFIX || host.ends_with(".cloudinary.com"))
}

/// Checks if a URL targets a transformation-capable endpoint: a CDN asset or
/// the backend redirect to one. These are the URLs with a meaningful
/// fallback path.
#[must_use]
pub fn is_transformation_endpoint(url: &str) -> bool {
    is_cdn_url(url)
        || reqwest::Url::parse(url).is_ok_and(|parsed| parsed.path().contains(REDIRECT_PATH))
}

/// Builds the transformation segment for `options`.
///
/// Returns `None` when no option is set. Unset format and quality default to
/// `auto`; crop defaults to `fill` once a dimension is requested.
#[must_use]
pub fn transformation_segment(options: &TransformOptions) -> Option<String> {
    if options.is_empty() {
        return None;
    }

    let format = options.format.unwrap_or(Format::Auto);
    let quality = options.quality.unwrap_or(Quality::Auto);
    let mut tokens = vec![format!("f_{}", format.as_str()), format!("q_{quality}")];

    if let Some(width) = options.width {
        tokens.push(format!("w_{width}"));
    }
    if let Some(height) = options.height {
        tokens.push(format!("h_{height}"));
    }

    let has_dimension = options.width.is_some() || options.height.is_some();
    let crop = options.crop.or(has_dimension.then_some(Crop::Fill));
    if let Some(crop) = crop {
        tokens.push(format!("c_{}", crop.as_str()));
    }

    Some(tokens.join(","))
}

/// Inserts `segment` right after the `/upload/` marker.
///
/// Returns `None` if `url` has no marker.
#[must_use]
pub fn insert_transformation(url: &str, segment: &str) -> Option<String> {
    let idx = url.find(UPLOAD_MARKER)? + UPLOAD_MARKER.len();
    Some(format!("{}{}/{}", &url[..idx], segment, &url[idx..]))
}

/// Derives the transformation endpoint for a CDN URL.
///
/// With empty options, or without an `/upload/` marker, the URL itself is
/// the endpoint.
#[must_use]
pub fn transformed_url(url: &str, options: &TransformOptions) -> String {
    transformation_segment(options)
        .and_then(|segment| insert_transformation(url, &segment))
        .unwrap_or_else(|| url.to_string())
}

/// Extracts the public id from a CDN URL.
///
/// The version segment (`v123`) and file extension are dropped.
#[must_use]
pub fn extract_public_id(url: &str) -> Option<String> {
    if !is_cdn_url(url) {
        return None;
    }

    let after_upload = url.split_once(UPLOAD_MARKER)?.1;
    let path = after_upload.split(['?', '#']).next()?;

    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.first().is_some_and(|p| is_version_segment(p)) {
        parts.remove(0);
    }

    let last = parts.pop()?;
    let stem = last.split_once('.').map_or(last, |(stem, _)| stem);
    if stem.is_empty() {
        return None;
    }
    parts.push(stem);
    Some(parts.join("/"))
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Appends a cache-busting `t` parameter, replacing any existing one.
#[must_use]
pub fn with_cache_buster(url: &str, timestamp_ms: i64) -> String {
    let base = strip_cache_buster(url);
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{CACHE_BUSTER_PARAM}={timestamp_ms}")
}

/// Removes the cache-busting `t` parameter, keeping all other parameters.
#[must_use]
pub fn strip_cache_buster(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|param| {
            let key = param.split('=').next().unwrap_or("");
            !param.is_empty() && key != CACHE_BUSTER_PARAM
        })
        .collect();

    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, kept.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const ASSET: &str = "https://res.cloudinary.com/demo/image/upload/v1712/products/rice.jpg";

    #[test_case("https://res.cloudinary.com/demo/image/upload/x.jpg", true ; "cdn_host")]
    #[test_case("https://RES.CLOUDINARY.COM/demo/image/upload/x.jpg", true ; "cdn_host_uppercase")]
    #[test_case("https://example.com/cloudinary.com/x.jpg", false ; "cdn_name_in_path")]
    #[test_case("/photos/x.jpg", false ; "relative_path")]
    #[test_case("http://localhost:8080/api/photos/1", false ; "legacy_endpoint")]
    fn test_is_cdn_url(url: &str, expected: bool) {
        assert_eq!(is_cdn_url(url), expected);
    }

    #[test]
    fn test_redirect_endpoint_is_transformation_endpoint() {
        assert!(is_transformation_endpoint(
            "http://localhost:8080/api/cloudinary/redirect/42?t=1"
        ));
        assert!(is_transformation_endpoint(ASSET));
        assert!(!is_transformation_endpoint("http://localhost:8080/api/photos/42"));
        assert!(!is_cdn_url("http://localhost:8080/api/cloudinary/redirect/42"));
    }

    #[test]
    fn test_transformation_segment_defaults() {
        let options = TransformOptions::default().with_size(400, 300);
        assert_eq!(
            transformation_segment(&options).as_deref(),
            Some("f_auto,q_auto,w_400,h_300,c_fill")
        );
    }

    #[test]
    fn test_transformation_segment_without_dimensions_has_no_crop() {
        let options = TransformOptions::default().with_quality(Quality::level(60));
        assert_eq!(
            transformation_segment(&options).as_deref(),
            Some("f_auto,q_60")
        );
    }

    #[test]
    fn test_empty_options_have_no_segment() {
        assert!(transformation_segment(&TransformOptions::default()).is_none());
        assert_eq!(transformed_url(ASSET, &TransformOptions::default()), ASSET);
    }

    #[test]
    fn test_insert_transformation() {
        let url = insert_transformation(ASSET, TINY_TIER_TRANSFORMATION);
        assert_eq!(
            url.as_deref(),
            Some(
                "https://res.cloudinary.com/demo/image/upload/w_10,q_10,e_blur:1000/v1712/products/rice.jpg"
            )
        );
        assert!(insert_transformation("https://res.cloudinary.com/x.jpg", "w_1").is_none());
    }

    #[test]
    fn test_extract_public_id() {
        assert_eq!(extract_public_id(ASSET).as_deref(), Some("products/rice"));
        assert_eq!(
            extract_public_id("https://res.cloudinary.com/demo/image/upload/rice.jpg").as_deref(),
            Some("rice")
        );
        assert!(extract_public_id("https://example.com/image/upload/v1/rice.jpg").is_none());
    }

    #[test]
    fn test_cache_buster_replaces_existing() {
        let once = with_cache_buster("http://x/photos/1", 10);
        assert_eq!(once, "http://x/photos/1?t=10");

        let twice = with_cache_buster(&once, 20);
        assert_eq!(twice, "http://x/photos/1?t=20");

        let mixed = with_cache_buster("http://x/a?size=2&t=5", 7);
        assert_eq!(mixed, "http://x/a?size=2&t=7");
    }

    #[test]
    fn test_strip_cache_buster_keeps_other_params() {
        assert_eq!(strip_cache_buster("http://x/a?t=1"), "http://x/a");
        assert_eq!(strip_cache_buster("http://x/a?t=1&k=v"), "http://x/a?k=v");
        assert_eq!(strip_cache_buster("http://x/a?tt=1"), "http://x/a?tt=1");
    }
}
