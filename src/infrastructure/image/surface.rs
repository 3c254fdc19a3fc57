//! Image surface that fetches and decodes sources in memory.

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::errors::SurfaceError;
use crate::domain::ports::{FetchRequest, HttpFetcher, ImageSurface};

/// Content currently shown by an [`HttpImageSurface`].
#[derive(Debug, Clone, Default)]
pub enum Displayed {
    /// Nothing loaded yet.
    #[default]
    Empty,
    /// A decoded image and the source it came from.
    Image {
        /// Source URL.
        src: String,
        /// Decoded pixels.
        image: Arc<DynamicImage>,
    },
    /// The static placeholder.
    Placeholder(String),
}

impl Displayed {
    /// Returns the decoded image, if one is shown.
    #[must_use]
    pub fn image(&self) -> Option<&Arc<DynamicImage>> {
        match self {
            Self::Image { image, .. } => Some(image),
            Self::Empty | Self::Placeholder(_) => None,
        }
    }
}

/// Surface backed by an HTTP fetcher and the `image` decoder.
///
/// A source counts as loaded once its bytes decode. Until then the
/// previously loaded content stays displayed.
pub struct HttpImageSurface {
    fetcher: Arc<dyn HttpFetcher>,
    source: Mutex<Option<String>>,
    displayed: Mutex<Displayed>,
}

impl std::fmt::Debug for HttpImageSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageSurface")
            .field("source", &*self.source.lock())
            .finish_non_exhaustive()
    }
}

impl HttpImageSurface {
    /// Creates an empty surface.
    #[must_use]
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            fetcher,
            source: Mutex::new(None),
            displayed: Mutex::new(Displayed::Empty),
        }
    }

    /// Content currently shown.
    #[must_use]
    pub fn displayed(&self) -> Displayed {
        self.displayed.lock().clone()
    }
}

#[async_trait]
impl ImageSurface for HttpImageSurface {
    async fn load(&self, src: &str) -> Result<(), SurfaceError> {
        *self.source.lock() = Some(src.to_string());

        let response = self.fetcher.fetch(&FetchRequest::image(src)).await?;
        let bytes = response.bytes;

        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| SurfaceError::Decode {
                url: src.to_string(),
                message: e.to_string(),
            })?
            .map_err(|e| SurfaceError::Decode {
                url: src.to_string(),
                message: e.to_string(),
            })?;

        debug!(
            url = %src,
            width = decoded.width(),
            height = decoded.height(),
            "Surface loaded image"
        );

        // A newer assignment wins over a late completion.
        if self.source.lock().as_deref() == Some(src) {
            *self.displayed.lock() = Displayed::Image {
                src: src.to_string(),
                image: Arc::new(decoded),
            };
        }
        Ok(())
    }

    fn show_placeholder(&self, src: &str) {
        trace!(url = %src, "Surface showing placeholder");
        *self.source.lock() = Some(src.to_string());
        *self.displayed.lock() = Displayed::Placeholder(src.to_string());
    }

    fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }
}
