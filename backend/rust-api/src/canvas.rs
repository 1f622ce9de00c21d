//! Handwriting capture: pointer strokes in, base64 PNG out.

use base64::{engine::general_purpose, Engine as _};
use image::{GrayImage, ImageFormat, Luma};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::config::CanvasConfig;

const INK: Luma<u8> = Luma([0]);
const PAPER: Luma<u8> = Luma([255]);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stroke {
    pub points: Vec<Point>,
}

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("canvas is empty")]
    Empty,
    #[error("failed to encode canvas: {0}")]
    Encode(#[from] image::ImageError),
}

pub struct Canvas {
    width: u32,
    height: u32,
    stroke_width: f32,
    strokes: Vec<Stroke>,
    active: Option<Stroke>,
    reset_key: Option<u64>,
}

impl Canvas {
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            width: config.width.max(1),
            height: config.height.max(1),
            stroke_width: config.stroke_width.max(1.0),
            strokes: Vec::new(),
            active: None,
            reset_key: None,
        }
    }

    /// Builds a canvas from already captured vector ink.
    pub fn from_strokes(config: &CanvasConfig, strokes: &[Vec<Point>]) -> Self {
        let mut canvas = Self::new(config);
        for stroke in strokes {
            let mut points = stroke.iter();
            if let Some(first) = points.next() {
                canvas.begin_stroke(*first);
                for point in points {
                    canvas.extend_stroke(*point);
                }
                canvas.end_stroke();
            }
        }
        canvas
    }

    pub fn begin_stroke(&mut self, point: Point) {
        self.end_stroke();
        self.active = Some(Stroke {
            points: vec![self.clamp(point)],
        });
    }

    /// Ignored while no stroke is active (pointer moved without a press).
    pub fn extend_stroke(&mut self, point: Point) {
        let point = self.clamp(point);
        if let Some(stroke) = self.active.as_mut() {
            stroke.points.push(point);
        }
    }

    pub fn end_stroke(&mut self) {
        if let Some(stroke) = self.active.take() {
            if !stroke.points.is_empty() {
                self.strokes.push(stroke);
            }
        }
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.active = None;
    }

    /// Clears only when `key` differs from the last key seen. The first key
    /// is recorded without clearing. Returns whether a clear happened.
    pub fn sync_reset(&mut self, key: u64) -> bool {
        match self.reset_key.replace(key) {
            Some(previous) if previous != key => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.active.is_none()
    }

    pub fn rasterize(&self) -> GrayImage {
        let mut image = GrayImage::from_pixel(self.width, self.height, PAPER);
        let radius = self.stroke_width / 2.0;

        for stroke in self.strokes.iter().chain(self.active.iter()) {
            match stroke.points.as_slice() {
                [] => {}
                [single] => stamp(&mut image, *single, radius),
                points => {
                    for pair in points.windows(2) {
                        draw_segment(&mut image, pair[0], pair[1], radius);
                    }
                }
            }
        }

        image
    }

    /// Rasterizes every stroke on the white canvas and returns PNG bytes
    /// encoded as standard base64.
    pub fn snapshot(&self) -> Result<String, CanvasError> {
        if self.is_empty() {
            return Err(CanvasError::Empty);
        }

        let mut bytes = Vec::new();
        self.rasterize()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

        Ok(general_purpose::STANDARD.encode(bytes))
    }

    fn clamp(&self, point: Point) -> Point {
        Point {
            x: point.x.clamp(0.0, (self.width - 1) as f32),
            y: point.y.clamp(0.0, (self.height - 1) as f32),
        }
    }
}

fn draw_segment(image: &mut GrayImage, from: Point, to: Point, radius: f32) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = (dx * dx + dy * dy).sqrt();
    // half-pixel spacing leaves no gaps between stamps
    let steps = (length * 2.0).ceil().max(1.0) as u32;

    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp(
            image,
            Point::new(from.x + dx * t, from.y + dy * t),
            radius,
        );
    }
}

fn stamp(image: &mut GrayImage, center: Point, radius: f32) {
    let (width, height) = image.dimensions();
    let min_x = (center.x - radius).floor().max(0.0) as u32;
    let min_y = (center.y - radius).floor().max(0.0) as u32;
    let max_x = ((center.x + radius).ceil() as u32).min(width - 1);
    let max_y = ((center.y + radius).ceil() as u32).min(height - 1);
    let r2 = radius * radius;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f32 - center.x;
            let py = y as f32 - center.y;
            if px * px + py * py <= r2 {
                image.put_pixel(x, y, INK);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> CanvasConfig {
        CanvasConfig {
            width: 64,
            height: 32,
            stroke_width: 4.0,
        }
    }

    #[test]
    fn accumulates_strokes_from_pointer_events() {
        let mut canvas = Canvas::new(&small());
        canvas.extend_stroke(Point::new(1.0, 1.0));
        assert!(canvas.is_empty());

        canvas.begin_stroke(Point::new(2.0, 2.0));
        canvas.extend_stroke(Point::new(10.0, 2.0));
        canvas.end_stroke();
        canvas.begin_stroke(Point::new(5.0, 5.0));
        canvas.end_stroke();

        assert_eq!(canvas.strokes().len(), 2);
        assert_eq!(canvas.strokes()[0].points.len(), 2);
    }

    #[test]
    fn points_are_clamped_to_canvas() {
        let mut canvas = Canvas::new(&small());
        canvas.begin_stroke(Point::new(-20.0, 500.0));
        canvas.end_stroke();
        assert_eq!(canvas.strokes()[0].points[0], Point::new(0.0, 31.0));
    }

    #[test]
    fn reset_is_edge_triggered() {
        let mut canvas = Canvas::new(&small());
        assert!(!canvas.sync_reset(0));

        canvas.begin_stroke(Point::new(3.0, 3.0));
        canvas.end_stroke();
        assert!(!canvas.sync_reset(0));
        assert!(!canvas.is_empty());

        assert!(canvas.sync_reset(1));
        assert!(canvas.is_empty());
        assert!(!canvas.sync_reset(1));
    }

    #[test]
    fn rasterize_draws_black_on_white() {
        let canvas = Canvas::from_strokes(
            &small(),
            &[vec![Point::new(4.0, 16.0), Point::new(60.0, 16.0)]],
        );
        let image = canvas.rasterize();

        assert_eq!(image.get_pixel(30, 16), &INK);
        assert_eq!(image.get_pixel(30, 2), &PAPER);
    }

    #[test]
    fn snapshot_is_png_of_canvas_size() {
        let canvas = Canvas::from_strokes(
            &small(),
            &[vec![Point::new(4.0, 4.0), Point::new(20.0, 20.0)]],
        );
        let encoded = canvas.snapshot().unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();

        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 32);
    }

    #[test]
    fn empty_snapshot_is_rejected() {
        let canvas = Canvas::new(&small());
        assert!(matches!(canvas.snapshot(), Err(CanvasError::Empty)));
    }
}
