//! Progressive loading chains and their outcomes.

use std::time::Duration;

/// Quality level of one attempt in a progressive chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierKind {
    /// ~10px heavily blurred placeholder.
    Tiny,
    /// ~100px moderate quality preview.
    Low,
    /// The resolved URL at full quality.
    Full,
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tiny => write!(f, "tiny"),
            Self::Low => write!(f, "low"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// One candidate URL in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    /// Quality level.
    pub kind: TierKind,
    /// URL to assign to the surface.
    pub url: String,
    /// Pause before this tier is started.
    pub delay: Duration,
}

/// Ordered, immutable list of candidate URLs for one display request.
///
/// Always ends with the full-quality tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttemptChain {
    source_url: String,
    tiers: Vec<Tier>,
}

impl LoadAttemptChain {
    /// Creates a single-tier chain for endpoints without progressive support.
    #[must_use]
    pub fn single(source_url: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            tiers: vec![Tier {
                kind: TierKind::Full,
                url: url.into(),
                delay: Duration::ZERO,
            }],
        }
    }

    /// Creates a chain from explicit tiers. Returns `None` unless the last
    /// tier is [`TierKind::Full`].
    #[must_use]
    pub fn from_tiers(source_url: impl Into<String>, tiers: Vec<Tier>) -> Option<Self> {
        if tiers.last().map(|t| t.kind) != Some(TierKind::Full) {
            return None;
        }
        Some(Self {
            source_url: source_url.into(),
            tiers,
        })
    }

    /// The resolved full-quality URL, without cache-busting.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Tiers in attempt order.
    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Number of tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// True when the chain has no tiers. Chains built through `single` or
    /// `from_tiers` always have at least one.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// True when the chain steps through more than one quality level.
    #[must_use]
    pub fn is_progressive(&self) -> bool {
        self.tiers.len() > 1
    }
}

/// Why a display request ended on the placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Nothing in the reference could be resolved.
    Unresolvable,
    /// The full-quality URL was already known to fail.
    KnownFailure,
    /// Every tier failed.
    ChainExhausted {
        /// Error reported by the last tier.
        last_error: String,
    },
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolvable => write!(f, "invalid source"),
            Self::KnownFailure => write!(f, "URL has failed before"),
            Self::ChainExhausted { last_error } => {
                write!(f, "all loading attempts failed: {last_error}")
            }
        }
    }
}

/// Terminal result of one progressive load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The full-quality tier loaded.
    Loaded {
        /// Source URL of the chain, without the cache-busting parameter.
        url: String,
        /// Tiers that were assigned, in order.
        attempted: Vec<TierKind>,
    },
    /// The surface now shows the placeholder.
    Placeholder {
        /// Placeholder path shown.
        url: String,
        /// Why loading degraded.
        reason: FallbackReason,
    },
    /// The caller cancelled the chain before it finished.
    Cancelled,
}

impl LoadOutcome {
    /// Returns true if the full-quality image is on the surface.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    /// Returns true if the placeholder is on the surface.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}
