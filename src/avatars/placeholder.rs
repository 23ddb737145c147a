//! Built-in default avatar, a neutral head-and-shoulders silhouette

use image::{DynamicImage, Rgba, RgbaImage};

use crate::avatars::codec::DecodedImage;
use crate::models::AvatarFormat;

pub const PLACEHOLDER_EDGE: u32 = 512;

const BACKGROUND: Rgba<u8> = Rgba([221, 221, 221, 255]);
const FIGURE: Rgba<u8> = Rgba([170, 170, 170, 255]);

/// Render the silhouette on a square canvas of `edge` pixels
pub fn render(edge: u32) -> DecodedImage {
    let edge_f = edge as f32;
    let head = (edge_f * 0.5, edge_f * 0.38, edge_f * 0.19);
    let shoulders = (edge_f * 0.5, edge_f * 1.02, edge_f * 0.36, edge_f * 0.30);

    let canvas = RgbaImage::from_fn(edge, edge, |x, y| {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);

        let in_head = (px - head.0).powi(2) + (py - head.1).powi(2) <= head.2.powi(2);
        let in_shoulders = ((px - shoulders.0) / shoulders.2).powi(2)
            + ((py - shoulders.1) / shoulders.3).powi(2)
            <= 1.0;

        if in_head || in_shoulders {
            FIGURE
        } else {
            BACKGROUND
        }
    });

    DecodedImage {
        image: DynamicImage::ImageRgba8(canvas),
        format: AvatarFormat::Png,
    }
}
