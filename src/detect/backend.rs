use anyhow::Result;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// The HUD treats a backend as an opaque capability: pixels in, classified and
/// scored boxes out. Box coordinates are in the pixel space of the slice that
/// was passed in.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on an RGB24 frame.
    ///
    /// Implementations must treat the pixel slice as read-only and must not keep
    /// it beyond the call.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Load or warm the model. Failure here is a detector-load failure.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
