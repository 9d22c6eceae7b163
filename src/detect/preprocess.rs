use image::{imageops, RgbImage};
use ndarray::Array4;

/// Converts RGB frames into the square, normalized NCHW tensors the
/// landmark graphs consume.
pub struct Preprocessor {
    width: u32,
    height: u32,
}

impl Preprocessor {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Resize to the model input size and repack HWC bytes into an
    /// NCHW float tensor scaled to [0, 1].
    pub fn tensor(&self, frame: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized;
        let source = if frame.dimensions() == (self.width, self.height) {
            frame
        } else {
            resized = imageops::resize(
                frame,
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            );
            &resized
        };

        let mut tensor =
            Array4::<f32>::zeros((1, 3, self.height as usize, self.width as usize));
        for (x, y, pixel) in source.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] =
                    pixel[channel] as f32 / 255.0;
            }
        }
        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn tensor_is_nchw_and_normalized() {
        let mut frame = RgbImage::new(4, 4);
        frame.put_pixel(1, 2, Rgb([255, 0, 51]));

        let tensor = Preprocessor::new(4, 4).tensor(&frame);
        assert_eq!(tensor.shape(), &[1, 3, 4, 4]);
        assert!((tensor[[0, 0, 2, 1]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 2, 1]].abs() < 1e-6);
        assert!((tensor[[0, 2, 2, 1]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn frames_are_resized_to_the_model_input() {
        let frame = RgbImage::from_pixel(64, 48, Rgb([128, 128, 128]));
        let tensor = Preprocessor::new(16, 16).tensor(&frame);
        assert_eq!(tensor.shape(), &[1, 3, 16, 16]);
        // A uniform frame stays uniform through the resize.
        let v = tensor[[0, 0, 8, 8]];
        assert!((v - 128.0 / 255.0).abs() < 0.02);
    }
}
