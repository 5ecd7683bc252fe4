//! Frame capture bridge.
//!
//! The renderer owns its frame buffers only for the duration of a render
//! call, so the sink keeps its own copy of the metadata and plane
//! references. A later capture request converts the most recently rendered
//! frame into a still image without racing the renderer.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;
use image::{imageops, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;

/// One decoded I420 frame. Planes are shared, never the renderer's
/// transient buffer.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: u32,
    /// Row strides for the Y, U and V planes.
    pub strides: [usize; 3],
    pub planes: [Arc<[u8]>; 3],
}

impl VideoFrame {
    /// Tightly packed I420 frame filled with constant plane values.
    pub fn solid(width: u32, height: u32, y: u8, u: u8, v: u8) -> Self {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        Self {
            width,
            height,
            rotation_degrees: 0,
            strides: [w, cw, cw],
            planes: [
                Arc::from(vec![y; w * h].into_boxed_slice()),
                Arc::from(vec![u; cw * ch].into_boxed_slice()),
                Arc::from(vec![v; cw * ch].into_boxed_slice()),
            ],
        }
    }
}

/// Render surface that retains the last frame for capture.
#[derive(Default)]
pub struct FrameSink {
    last: Mutex<Option<VideoFrame>>,
}

impl FrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the renderer for every frame.
    pub fn render_frame(&self, frame: VideoFrame) {
        *self.last.lock() = Some(frame);
    }

    pub fn has_frame(&self) -> bool {
        self.last.lock().is_some()
    }

    /// Converts the most recently rendered frame into an RGBA image.
    /// Empty when nothing has been rendered yet or conversion fails.
    pub fn capture(&self) -> Option<RgbaImage> {
        let frame = self.last.lock().clone()?;
        i420_to_rgba(&frame)
    }
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// BT.601 limited-range I420 to RGBA. `None` on dimension or plane-size
/// mismatch rather than panicking on a malformed frame.
fn i420_to_rgba(frame: &VideoFrame) -> Option<RgbaImage> {
    let (w, h) = (frame.width as usize, frame.height as usize);
    if w == 0 || h == 0 {
        return None;
    }
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let [ys, us, vs] = frame.strides;
    let [yp, up, vp] = &frame.planes;
    if ys < w || us < cw || vs < cw {
        return None;
    }
    if yp.len() < ys * h || up.len() < us * ch || vp.len() < vs * ch {
        return None;
    }

    let mut img = RgbaImage::new(frame.width, frame.height);
    for row in 0..h {
        for col in 0..w {
            let c = yp[row * ys + col] as i32 - 16;
            let d = up[(row / 2) * us + col / 2] as i32 - 128;
            let e = vp[(row / 2) * vs + col / 2] as i32 - 128;
            let r = clamp_u8((298 * c + 409 * e + 128) >> 8);
            let g = clamp_u8((298 * c - 100 * d - 208 * e + 128) >> 8);
            let b = clamp_u8((298 * c + 516 * d + 128) >> 8);
            img.put_pixel(col as u32, row as u32, Rgba([r, g, b, 255]));
        }
    }

    Some(match frame.rotation_degrees % 360 {
        90 => imageops::rotate90(&img),
        180 => imageops::rotate180(&img),
        270 => imageops::rotate270(&img),
        _ => img,
    })
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_before_first_frame_is_empty() {
        let sink = FrameSink::new();
        assert!(!sink.has_frame());
        assert!(sink.capture().is_none());
    }

    #[test]
    fn capture_returns_latest_frame() {
        let sink = FrameSink::new();
        sink.render_frame(VideoFrame::solid(16, 8, 128, 128, 128));
        sink.render_frame(VideoFrame::solid(32, 16, 128, 128, 128));
        let img = sink.capture().expect("frame rendered");
        assert_eq!((img.width(), img.height()), (32, 16));
    }

    #[test]
    fn mid_gray_frame_converts_to_gray_pixels() {
        let sink = FrameSink::new();
        sink.render_frame(VideoFrame::solid(4, 4, 128, 128, 128));
        let img = sink.capture().unwrap();
        let Rgba([r, g, b, a]) = *img.get_pixel(1, 2);
        // (128 - 16) * 298 >> 8 == 130 on all channels for neutral chroma.
        assert_eq!((r, g, b, a), (130, 130, 130, 255));
    }

    #[test]
    fn truncated_plane_yields_empty_capture() {
        let mut frame = VideoFrame::solid(16, 16, 128, 128, 128);
        frame.planes[0] = Arc::from(vec![128u8; 8].into_boxed_slice());
        let sink = FrameSink::new();
        sink.render_frame(frame);
        assert!(sink.capture().is_none());
    }

    #[test]
    fn rotation_swaps_dimensions() {
        let mut frame = VideoFrame::solid(16, 8, 128, 128, 128);
        frame.rotation_degrees = 90;
        let sink = FrameSink::new();
        sink.render_frame(frame);
        let img = sink.capture().unwrap();
        assert_eq!((img.width(), img.height()), (8, 16));
    }

    #[test]
    fn png_encoding_round_trips_header() {
        let sink = FrameSink::new();
        sink.render_frame(VideoFrame::solid(8, 8, 90, 120, 140));
        let png = encode_png(&sink.capture().unwrap()).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
