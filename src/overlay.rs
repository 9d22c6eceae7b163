//! Canvas redraw. Every frame is drawn from scratch: source image as the
//! background, skeleton connectors, point markers, then angle labels.
//! There is no incremental diffing and nothing carries over between
//! frames.

use crate::angles;
use crate::detect::Detection;
use crate::landmarks::{Landmark, HAND_CONNECTIONS, POSE_CONNECTIONS};
use crate::session::CaptureMode;
use ab_glyph::{FontVec, PxScale};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};
use std::fs;
use std::path::Path;

const HAND_CONNECTOR_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const POSE_CONNECTOR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const FACE_POINT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const POINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const LABEL_SCALE: f32 = 16.0;

pub struct OverlayRenderer {
    width: u32,
    height: u32,
    font: Option<FontVec>,
    show_angles: bool,
    show_mask: bool,
}

impl OverlayRenderer {
    /// `font_path` is only needed for angle labels; when the font cannot
    /// be loaded the labels are disabled and everything else still draws.
    pub fn new(
        width: u32,
        height: u32,
        font_path: Option<&Path>,
        show_angles: bool,
        show_mask: bool,
    ) -> Self {
        let font = font_path.and_then(load_font);
        if show_angles && font.is_none() {
            tracing::warn!("No usable label font; angle labels disabled");
        }
        Self {
            width,
            height,
            font,
            show_angles,
            show_mask,
        }
    }

    /// Scale the source frame to canvas size without overlays. Used when
    /// no tracking mode is active.
    pub fn passthrough(&self, frame: &RgbImage) -> RgbImage {
        if frame.dimensions() == (self.width, self.height) {
            frame.clone()
        } else {
            imageops::resize(frame, self.width, self.height, imageops::FilterType::Triangle)
        }
    }

    /// Redraw the whole canvas for one frame.
    pub fn render(&self, frame: &RgbImage, detection: &Detection, mode: CaptureMode) -> RgbImage {
        let mut canvas = self.passthrough(frame);

        // Mask preview replaces the landmark overlays entirely.
        if self.show_mask {
            if let Some(mask) = &detection.mask {
                return mask.preview(self.width, self.height);
            }
        }

        for hand in &detection.hands {
            self.draw_connectors(&mut canvas, hand, &HAND_CONNECTIONS, HAND_CONNECTOR_COLOR);
            self.draw_points(&mut canvas, hand, 2, POINT_COLOR);
        }

        if mode == CaptureMode::Holistic {
            if let Some(face) = &detection.face {
                self.draw_points(&mut canvas, face, 1, FACE_POINT_COLOR);
            }
            if let Some(pose) = &detection.pose {
                self.draw_pose_connectors(&mut canvas, pose);
                let present: Vec<Landmark> = pose.iter().flatten().copied().collect();
                self.draw_points(&mut canvas, &present, 2, POINT_COLOR);
                if self.show_angles {
                    self.draw_angle_labels(&mut canvas, pose);
                }
            }
        }

        canvas
    }

    fn to_pixel(&self, point: &Landmark) -> (f32, f32) {
        (point.x * self.width as f32, point.y * self.height as f32)
    }

    fn draw_connectors(
        &self,
        canvas: &mut RgbImage,
        points: &[Landmark],
        topology: &[(usize, usize)],
        color: Rgb<u8>,
    ) {
        for &(a, b) in topology {
            let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) else {
                continue;
            };
            draw_line_segment_mut(canvas, self.to_pixel(pa), self.to_pixel(pb), color);
        }
    }

    /// Pose slots can be individually absent; a connector is drawn only
    /// when both of its endpoints made it through this frame.
    fn draw_pose_connectors(&self, canvas: &mut RgbImage, pose: &[Option<Landmark>]) {
        for &(a, b) in &POSE_CONNECTIONS {
            let (Some(Some(pa)), Some(Some(pb))) = (pose.get(a), pose.get(b)) else {
                continue;
            };
            draw_line_segment_mut(
                canvas,
                self.to_pixel(pa),
                self.to_pixel(pb),
                POSE_CONNECTOR_COLOR,
            );
        }
    }

    fn draw_points(&self, canvas: &mut RgbImage, points: &[Landmark], radius: i32, color: Rgb<u8>) {
        for point in points {
            let (x, y) = self.to_pixel(point);
            draw_filled_circle_mut(canvas, (x as i32, y as i32), radius, color);
        }
    }

    fn draw_angle_labels(&self, canvas: &mut RgbImage, pose: &[Option<Landmark>]) {
        let Some(font) = &self.font else {
            return;
        };
        for reading in angles::measure_regions(pose) {
            // Degenerate geometry reads NaN; skip rather than print it.
            if reading.degrees.is_nan() {
                continue;
            }
            let x = (reading.anchor.0 * self.width as f32) as i32;
            let y = (reading.anchor.1 * self.height as f32) as i32;
            let text = format!("{} {:.0}", reading.label, reading.degrees);
            draw_text_mut(
                canvas,
                angles::label_color(reading.degrees),
                x,
                y,
                PxScale::from(LABEL_SCALE),
                font,
                &text,
            );
        }
    }
}

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read font {}: {}", path.display(), e);
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            tracing::warn!("Failed to parse font {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::pose;

    fn renderer() -> OverlayRenderer {
        OverlayRenderer::new(100, 100, None, true, false)
    }

    fn gray_frame() -> RgbImage {
        RgbImage::from_pixel(100, 100, Rgb([64, 64, 64]))
    }

    fn horizontal_hand() -> Vec<Landmark> {
        // All 21 points on one horizontal line at y = 0.5.
        (0..21)
            .map(|i| Landmark::new(0.1 + i as f32 * 0.04, 0.5, 0.0))
            .collect()
    }

    #[test]
    fn hand_connectors_and_points_reach_the_canvas() {
        let detection = Detection {
            hands: vec![horizontal_hand()],
            ..Detection::default()
        };
        let canvas = renderer().render(&gray_frame(), &detection, CaptureMode::Hands);
        // The wrist-to-thumb segment crosses y = 50.
        let wrist = canvas.get_pixel(10, 50);
        assert_ne!(*wrist, Rgb([64, 64, 64]));
    }

    #[test]
    fn pose_is_ignored_in_hands_mode() {
        let mut pose_lm = vec![None; pose::COUNT];
        pose_lm[pose::LEFT_SHOULDER] = Some(Landmark::new(0.2, 0.2, 0.0));
        pose_lm[pose::RIGHT_SHOULDER] = Some(Landmark::new(0.8, 0.2, 0.0));
        let detection = Detection {
            pose: Some(pose_lm),
            ..Detection::default()
        };
        let canvas = renderer().render(&gray_frame(), &detection, CaptureMode::Hands);
        // The shoulder-to-shoulder connector would cross (50, 20).
        assert_eq!(*canvas.get_pixel(50, 20), Rgb([64, 64, 64]));
    }

    #[test]
    fn pose_connectors_skip_absent_endpoints() {
        let mut pose_lm = vec![None; pose::COUNT];
        pose_lm[pose::LEFT_SHOULDER] = Some(Landmark::new(0.2, 0.2, 0.0));
        // Right shoulder missing: no (11, 12) connector.
        let detection = Detection {
            pose: Some(pose_lm),
            ..Detection::default()
        };
        let canvas = renderer().render(&gray_frame(), &detection, CaptureMode::Holistic);
        assert_eq!(*canvas.get_pixel(50, 20), Rgb([64, 64, 64]));
        // The present landmark still gets its marker.
        assert_eq!(*canvas.get_pixel(20, 20), POINT_COLOR);
    }

    #[test]
    fn empty_detection_renders_the_plain_frame() {
        let canvas = renderer().render(&gray_frame(), &Detection::default(), CaptureMode::Holistic);
        assert_eq!(canvas, gray_frame());
    }

    #[test]
    fn degenerate_angles_do_not_panic() {
        // Coincident hip/knee/ankle make the knee chain vectors zero
        // length; rendering must skip the NaN reading quietly.
        let mut pose_lm = vec![None; pose::COUNT];
        let p = Landmark::new(0.5, 0.5, 0.0);
        pose_lm[pose::LEFT_HIP] = Some(p);
        pose_lm[pose::LEFT_KNEE] = Some(p);
        pose_lm[pose::LEFT_ANKLE] = Some(p);
        let detection = Detection {
            pose: Some(pose_lm),
            ..Detection::default()
        };
        let _ = renderer().render(&gray_frame(), &detection, CaptureMode::Holistic);
    }

    #[test]
    fn passthrough_scales_to_canvas_size() {
        let frame = RgbImage::from_pixel(10, 10, Rgb([200, 10, 10]));
        let out = renderer().passthrough(&frame);
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(*out.get_pixel(50, 50), Rgb([200, 10, 10]));
    }

    #[test]
    fn mask_preview_takes_over_when_requested() {
        let renderer = OverlayRenderer::new(10, 10, None, false, true);
        let detection = Detection {
            mask: Some(crate::detect::Mask {
                data: vec![1.0; 4],
                width: 2,
                height: 2,
            }),
            ..Detection::default()
        };
        let canvas = renderer.render(&gray_frame(), &detection, CaptureMode::Holistic);
        assert_eq!(*canvas.get_pixel(5, 5), Rgb([255, 255, 255]));
    }
}
