//! Port for an on-screen image surface.

use async_trait::async_trait;

use crate::domain::errors::SurfaceError;

/// A single image slot whose source can be reassigned.
///
/// `load` assigns the source and resolves when the surface reports its load
/// or error event. The surface keeps showing the last successfully loaded
/// content until a newer source loads.
#[async_trait]
pub trait ImageSurface: Send + Sync {
    /// Assigns `src` and waits for the load outcome.
    async fn load(&self, src: &str) -> Result<(), SurfaceError>;

    /// Assigns the static placeholder. Placeholders are assumed present and
    /// are not awaited.
    fn show_placeholder(&self, src: &str);

    /// The most recently assigned source.
    fn source(&self) -> Option<String>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::errors::TransportError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Surface that answers load events from a script and records sources.
    #[derive(Default)]
    pub struct ScriptedSurface {
        outcomes: Mutex<VecDeque<bool>>,
        default_ok: bool,
        pub assigned: Mutex<Vec<String>>,
        placeholder: Mutex<Option<String>>,
    }

    impl ScriptedSurface {
        /// Surface on which every load succeeds.
        pub fn succeeding() -> Self {
            Self {
                default_ok: true,
                ..Self::default()
            }
        }

        /// Surface on which every load fails.
        pub fn failing() -> Self {
            Self::default()
        }

        /// Surface answering loads in order, failing once the script runs out.
        pub fn scripted(outcomes: &[bool]) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.iter().copied().collect()),
                ..Self::default()
            }
        }

        /// Sources assigned through `load`, in order.
        pub fn assigned(&self) -> Vec<String> {
            self.assigned.lock().clone()
        }

        /// Placeholder shown, if any.
        pub fn placeholder(&self) -> Option<String> {
            self.placeholder.lock().clone()
        }
    }

    #[async_trait]
    impl ImageSurface for ScriptedSurface {
        async fn load(&self, src: &str) -> Result<(), SurfaceError> {
            self.assigned.lock().push(src.to_string());
            let ok = self.outcomes.lock().pop_front().unwrap_or(self.default_ok);
            if ok {
                Ok(())
            } else {
                Err(SurfaceError::Transport(TransportError::status(src, 404)))
            }
        }

        fn show_placeholder(&self, src: &str) {
            *self.placeholder.lock() = Some(src.to_string());
            self.assigned.lock().push(src.to_string());
        }

        fn source(&self) -> Option<String> {
            self.assigned.lock().last().cloned()
        }
    }
}
