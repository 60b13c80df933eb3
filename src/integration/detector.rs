//! Trait for object detection inference backends.

use crate::engine::RawCandidate;

/// Trait for object detection inference backends.
///
/// The engine treats the detector as a pure function of the frame image:
/// no tracking state may be retained between calls; identity management
/// is entirely the matcher's job. Any conforming implementation (local
/// model, remote inference service) is substitutable without touching the
/// matcher.
///
/// # Example
///
/// ```ignore
/// use annotrack_rs::{DetectorSource, RawCandidate};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectorSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, image: &[u8], width: u32, height: u32) -> Result<Vec<RawCandidate>, Self::Error> {
///         // Run inference and return candidate boxes
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectorSource {
    /// Error type for detection failures.
    type Error;

    /// Run inference on raw image data and return candidate boxes.
    ///
    /// # Arguments
    /// * `image` - Raw image bytes (format depends on implementation)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    ///
    /// # Returns
    /// Candidate boxes with predicted class and confidence, normalized to
    /// the frame dimensions, or an error.
    fn detect(
        &mut self,
        image: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<RawCandidate>, Self::Error>;
}
