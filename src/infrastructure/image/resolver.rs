//! Canonical display URL resolution.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::entities::{
    FallbackReason, ImageId, ImageReference, LoadAttemptChain, Tier, TierKind, TransformOptions,
};
use crate::domain::ports::{Clock, FetchRequest, HttpFetcher};

use super::cdn::{
    CDN_HOST_SUFFIX, LOW_TIER_TRANSFORMATION, REDIRECT_PATH, TINY_TIER_TRANSFORMATION,
    UPLOAD_MARKER, extract_public_id, insert_transformation, is_cdn_url, transformation_segment,
    transformed_url, with_cache_buster,
};
use super::failure_memory::FailureMemory;

/// Default pause before the low quality tier.
pub const DEFAULT_LOW_TIER_DELAY: Duration = Duration::from_millis(100);

/// Default pause before the full quality tier of a progressive chain.
pub const DEFAULT_FULL_TIER_DELAY: Duration = Duration::from_millis(300);

/// Backend and CDN endpoints images are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api_base_url: String,
    fallback_url: String,
    cdn_cloud_name: Option<String>,
}

impl Endpoints {
    /// Creates the endpoint set. A blank cloud name disables the
    /// transformation backing.
    #[must_use]
    pub fn new(
        api_base_url: impl Into<String>,
        fallback_url: impl Into<String>,
        cdn_cloud_name: Option<String>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            fallback_url: fallback_url.into(),
            cdn_cloud_name: cdn_cloud_name.filter(|name| !name.trim().is_empty()),
        }
    }

    /// Base API origin without trailing slash.
    #[must_use]
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Static placeholder path.
    #[must_use]
    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    /// True when transformation-capable endpoints are used at all.
    #[must_use]
    pub const fn cdn_enabled(&self) -> bool {
        self.cdn_cloud_name.is_some()
    }

    /// Redirect endpoint keyed by id, without cache-busting.
    #[must_use]
    pub fn redirect(&self, id: &ImageId) -> String {
        format!("{}{}{}", self.api_base_url, REDIRECT_PATH, id.as_str())
    }

    /// Flat legacy endpoint keyed by id.
    #[must_use]
    pub fn legacy_by_id(&self, id: &ImageId) -> String {
        format!("{}/photos/{}", self.api_base_url, id.as_str())
    }

    /// Flat legacy endpoint keyed by stored file name.
    ///
    /// Leading slashes and an existing `photos/` prefix are dropped so both
    /// `rice.jpg` and `/photos/rice.jpg` map to the same endpoint.
    #[must_use]
    pub fn legacy_by_name(&self, name: &str) -> String {
        let trimmed = name.trim_start_matches('/');
        let trimmed = trimmed.strip_prefix("photos/").unwrap_or(trimmed);
        format!("{}/photos/{}", self.api_base_url, trimmed)
    }

    /// Transformed asset URL for `public_id` on the configured cloud.
    ///
    /// Returns `None` when the transformation backing is disabled.
    #[must_use]
    pub fn cdn_asset(&self, public_id: &str, transformation: &str) -> Option<String> {
        let cloud = self.cdn_cloud_name.as_deref()?;
        Some(format!(
            "https://res.{CDN_HOST_SUFFIX}/{cloud}/image{UPLOAD_MARKER}{transformation}/{public_id}"
        ))
    }

    /// Upload endpoint.
    #[must_use]
    pub fn upload(&self) -> String {
        format!("{}/cloudinary/upload", self.api_base_url)
    }
}

/// Outcome of resolving a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A fetchable URL.
    Url(String),
    /// Nothing fetchable remains; show the placeholder.
    Placeholder(FallbackReason),
}

/// Pauses inserted between progressive tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDelays {
    /// Before the low quality tier.
    pub low: Duration,
    /// Before the full quality tier.
    pub full: Duration,
}

impl Default for TierDelays {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW_TIER_DELAY,
            full: DEFAULT_FULL_TIER_DELAY,
        }
    }
}

/// Maps [`ImageReference`]s to concrete URLs.
///
/// Reads [`FailureMemory`] but never writes it. Within one clock reading and
/// one failure snapshot, resolution is deterministic.
pub struct UrlResolver {
    endpoints: Endpoints,
    failures: Arc<FailureMemory>,
    clock: Arc<dyn Clock>,
    delays: TierDelays,
}

impl std::fmt::Debug for UrlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlResolver")
            .field("endpoints", &self.endpoints)
            .field("delays", &self.delays)
            .finish_non_exhaustive()
    }
}

impl UrlResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(endpoints: Endpoints, failures: Arc<FailureMemory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            endpoints,
            failures,
            clock,
            delays: TierDelays::default(),
        }
    }

    /// Overrides the pauses between progressive tiers.
    #[must_use]
    pub const fn with_delays(mut self, delays: TierDelays) -> Self {
        self.delays = delays;
        self
    }

    /// Endpoints this resolver builds URLs for.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Failure memory consulted during resolution.
    #[must_use]
    pub fn failures(&self) -> &Arc<FailureMemory> {
        &self.failures
    }

    /// Resolves `reference` to one URL, or the placeholder path.
    #[must_use]
    pub fn resolve(&self, reference: &ImageReference) -> String {
        match self.resolve_detailed(reference) {
            Resolution::Url(url) => url,
            Resolution::Placeholder(_) => self.endpoints.fallback_url.clone(),
        }
    }

    /// Resolves `reference`, reporting why the placeholder was chosen.
    #[must_use]
    pub fn resolve_detailed(&self, reference: &ImageReference) -> Resolution {
        if let Some(url) = reference.url().filter(|u| is_cdn_url(u)) {
            return self.resolve_cdn_url(url, reference.options());
        }

        if let Some(id) = reference.id() {
            return Resolution::Url(self.resolve_id(id));
        }

        match reference.url() {
            Some(url) if reqwest::Url::parse(url).is_ok() => Resolution::Url(url.to_string()),
            Some(path) => Resolution::Url(self.endpoints.legacy_by_name(path)),
            None => Resolution::Placeholder(FallbackReason::Unresolvable),
        }
    }

    fn resolve_cdn_url(&self, url: &str, options: &TransformOptions) -> Resolution {
        if !self.endpoints.cdn_enabled() {
            if self.failures.has_failed(url) {
                warn!(url = %url, "CDN asset failed before, using placeholder");
                return Resolution::Placeholder(FallbackReason::KnownFailure);
            }
            return Resolution::Url(url.to_string());
        }

        let transformed = self.transformation_endpoint(url, options);
        if !self.failures.has_failed(&transformed) {
            return Resolution::Url(transformed);
        }

        if transformed != url && !self.failures.has_failed(url) {
            warn!(url = %transformed, "Transformation endpoint failed before, using plain asset");
            return Resolution::Url(url.to_string());
        }

        warn!(url = %url, "CDN asset failed before, using placeholder");
        Resolution::Placeholder(FallbackReason::KnownFailure)
    }

    /// Canonical transformed URL on the configured cloud, or the asset with the
    /// segment inserted in place when no public id can be extracted.
    fn transformation_endpoint(&self, url: &str, options: &TransformOptions) -> String {
        transformation_segment(options)
            .and_then(|segment| {
                let public_id = extract_public_id(url)?;
                self.endpoints.cdn_asset(&public_id, &segment)
            })
            .unwrap_or_else(|| transformed_url(url, options))
    }

    fn resolve_id(&self, id: &ImageId) -> String {
        if !self.endpoints.cdn_enabled() {
            return self.endpoints.legacy_by_id(id);
        }

        let redirect = self.endpoints.redirect(id);
        if self.failures.has_failed(&redirect) {
            debug!(id = %id, "Redirect endpoint failed before, using legacy endpoint");
            return self.endpoints.legacy_by_id(id);
        }

        with_cache_buster(&redirect, self.clock.now_millis())
    }

    /// Resolves `reference` and builds its attempt chain.
    ///
    /// # Errors
    /// Returns the fallback reason when nothing fetchable remains.
    pub fn chain(&self, reference: &ImageReference) -> Result<LoadAttemptChain, FallbackReason> {
        match self.resolve_detailed(reference) {
            Resolution::Url(url) => Ok(self.chain_for(&url)),
            Resolution::Placeholder(reason) => Err(reason),
        }
    }

    /// Builds the progressive attempt chain for an already resolved URL.
    ///
    /// CDN assets get `[tiny, low, full]` while the transformation backing is
    /// enabled; every other endpoint gets a single full tier. Every tier URL
    /// carries the same cache-busting timestamp.
    #[must_use]
    pub fn chain_for(&self, source_url: &str) -> LoadAttemptChain {
        let timestamp = self.clock.now_millis();
        let full_url = with_cache_buster(source_url, timestamp);

        if !self.endpoints.cdn_enabled()
            || !is_cdn_url(source_url)
            || !source_url.contains(UPLOAD_MARKER)
        {
            return LoadAttemptChain::single(source_url, full_url);
        }

        let variant = |segment: &str| {
            insert_transformation(source_url, segment)
                .map(|url| with_cache_buster(&url, timestamp))
        };
        let (Some(tiny), Some(low)) = (
            variant(TINY_TIER_TRANSFORMATION),
            variant(LOW_TIER_TRANSFORMATION),
        ) else {
            return LoadAttemptChain::single(source_url, full_url);
        };

        let tiers = vec![
            Tier {
                kind: TierKind::Tiny,
                url: tiny,
                delay: Duration::ZERO,
            },
            Tier {
                kind: TierKind::Low,
                url: low,
                delay: self.delays.low,
            },
            Tier {
                kind: TierKind::Full,
                url: full_url.clone(),
                delay: self.delays.full,
            },
        ];

        LoadAttemptChain::from_tiers(source_url, tiers)
            .unwrap_or_else(|| LoadAttemptChain::single(source_url, full_url))
    }
}

/// Checks the redirect endpoint for `id` with a HEAD request.
///
/// Returns the redirect URL when it answers, the legacy endpoint when it
/// does not, and the placeholder when the id is blank or the CDN is disabled.
pub async fn probe_redirect(fetcher: &dyn HttpFetcher, endpoints: &Endpoints, id: &ImageId) -> String {
    if id.is_blank() || !endpoints.cdn_enabled() {
        return endpoints.fallback_url.clone();
    }

    let redirect = endpoints.redirect(id);
    match fetcher.fetch(&FetchRequest::image(&redirect).head()).await {
        Ok(_) => {
            debug!(id = %id, "Redirect endpoint answered");
            redirect
        }
        Err(e) => {
            warn!(id = %id, error = %e, "Redirect endpoint failed, using legacy endpoint");
            endpoints.legacy_by_id(id)
        }
    }
}
