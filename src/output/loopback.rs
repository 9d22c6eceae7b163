use super::OutputSink;
use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// v4l2loopback sink. The format is negotiated once at open (YUYV at the
/// configured size); frames are then converted and written to the device
/// file, where any V4L2 client can pick the stream up.
pub struct LoopbackSink {
    // Held open so the negotiated format stays pinned on the loopback.
    _device: Device,
    file: File,
    width: u32,
    height: u32,
}

impl LoopbackSink {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback sink at {} ({}x{})",
            path.display(),
            width,
            height
        );

        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2 device at {}", path.display()))?;
        let format = Format::new(width, height, FourCC::new(b"YUYV"));
        Output::set_format(&device, &format).context("Failed to set YUYV output format")?;

        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;

        tracing::info!("v4l2loopback sink ready");

        Ok(Self {
            _device: device,
            file,
            width,
            height,
        })
    }
}

impl OutputSink for LoopbackSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let resized;
        let frame = if frame.dimensions() == (self.width, self.height) {
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

        let packed = encode_yuyv(frame);
        self.file
            .write_all(&packed)
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pack an RGB frame into YUYV 4:2:2. Pixels are paired per scanline; an
/// odd trailing pixel is doubled so rows never split a macropixel.
fn encode_yuyv(frame: &RgbImage) -> Vec<u8> {
    let width = frame.width() as usize;
    let raw = frame.as_raw();
    let mut packed = Vec::with_capacity(raw.len() / 3 * 2);

    for row in raw.chunks_exact(width * 3) {
        for pair in row.chunks(6) {
            let (y0, u0, v0) = rgb_to_yuv(pair[0], pair[1], pair[2]);
            let (y1, u1, v1) = if pair.len() == 6 {
                rgb_to_yuv(pair[3], pair[4], pair[5])
            } else {
                (y0, u0, v0)
            };
            packed.push(y0);
            packed.push(((u0 as u16 + u1 as u16) / 2) as u8);
            packed.push(y1);
            packed.push(((v0 as u16 + v1 as u16) / 2) as u8);
        }
    }

    packed
}

/// BT.601 RGB to YUV.
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn yuyv_output_is_two_bytes_per_pixel() {
        let frame = RgbImage::new(6, 4);
        assert_eq!(encode_yuyv(&frame).len(), 6 * 4 * 2);
        // Odd width: the trailing pixel is doubled into a full macropixel.
        let odd = RgbImage::new(3, 2);
        assert_eq!(encode_yuyv(&odd).len(), 4 * 2 * 2);
    }

    #[test]
    fn grayscale_extremes_convert_cleanly() {
        let (y, u, v) = rgb_to_yuv(0, 0, 0);
        assert_eq!((y, u, v), (0, 128, 128));

        let (y, u, v) = rgb_to_yuv(255, 255, 255);
        assert_eq!(y, 255);
        assert!((u as i16 - 128).abs() <= 1);
        assert!((v as i16 - 128).abs() <= 1);
    }

    #[test]
    fn chroma_is_averaged_across_the_pair() {
        let mut frame = RgbImage::new(2, 1);
        frame.put_pixel(0, 0, Rgb([255, 0, 0]));
        frame.put_pixel(1, 0, Rgb([0, 0, 255]));
        let packed = encode_yuyv(&frame);
        assert_eq!(packed.len(), 4);

        let (_, u_red, v_red) = rgb_to_yuv(255, 0, 0);
        let (_, u_blue, v_blue) = rgb_to_yuv(0, 0, 255);
        assert_eq!(packed[1], ((u_red as u16 + u_blue as u16) / 2) as u8);
        assert_eq!(packed[3], ((v_red as u16 + v_blue as u16) / 2) as u8);
    }
}
