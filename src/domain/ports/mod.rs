mod clock_port;
mod http_port;
mod image_surface_port;
mod key_value_store_port;
mod upload_port;

pub use clock_port::{Clock, FixedClock, SystemClock};
pub use http_port::{
    FetchRequest, FetchResponse, HttpFetcher, Method, RequestKind, TransportResult,
};
pub use image_surface_port::ImageSurface;
pub use key_value_store_port::KeyValueStore;
pub use upload_port::UploadPort;

#[cfg(test)]
pub mod mocks {
    pub use super::http_port::mock::{ScriptedFetcher, ok_response};
    pub use super::image_surface_port::mock::ScriptedSurface;
    pub use super::key_value_store_port::mock::BrokenStore;
    pub use super::upload_port::MockUploadPort;
}
