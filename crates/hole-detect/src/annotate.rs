//! Rasterises detection markup onto an RGB frame for the visualization feed.
//!
//! Base outline in blue, hole outlines in green, centre marks in red and
//! coordinate labels in a tiny 3x5 bitmap font. Everything clips at the
//! frame borders; nothing here touches detection state.

use image::{Rgb, RgbImage};

use hole_detect_core::OverlayShape;

const BASE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const HOLE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CENTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const OUTLINE_THICKNESS: i32 = 2;
const CENTER_MARK_RADIUS: i32 = 2;

pub fn render_overlays(frame: &mut RgbImage, overlays: &[OverlayShape]) {
    for overlay in overlays {
        match overlay {
            OverlayShape::BaseOutline { cx, cy, radius } => {
                draw_circle_outline(frame, *cx, *cy, *radius, BASE_COLOR);
            }
            OverlayShape::HoleOutline { cx, cy, radius } => {
                draw_circle_outline(frame, *cx, *cy, *radius, HOLE_COLOR);
            }
            OverlayShape::CenterMark { cx, cy } => {
                draw_disc(frame, *cx, *cy, CENTER_MARK_RADIUS, CENTER_COLOR);
            }
            OverlayShape::Label { x, y, text } => {
                draw_text(frame, *x, *y, text, LABEL_COLOR);
            }
        }
    }
}

#[inline]
fn put(frame: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < frame.width() && (y as u32) < frame.height() {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

/// Midpoint circle, stroked `OUTLINE_THICKNESS` pixels thick.
fn draw_circle_outline(frame: &mut RgbImage, cx: f32, cy: f32, radius: f32, color: Rgb<u8>) {
    let cx = cx.round() as i32;
    let cy = cy.round() as i32;
    for t in 0..OUTLINE_THICKNESS {
        let r = (radius.round() as i32 - t).max(1);
        let mut x = r;
        let mut y = 0;
        let mut err = 1 - r;
        while x >= y {
            for (px, py) in [
                (cx + x, cy + y),
                (cx + y, cy + x),
                (cx - y, cy + x),
                (cx - x, cy + y),
                (cx - x, cy - y),
                (cx - y, cy - x),
                (cx + y, cy - x),
                (cx + x, cy - y),
            ] {
                put(frame, px, py, color);
            }
            y += 1;
            if err < 0 {
                err += 2 * y + 1;
            } else {
                x -= 1;
                err += 2 * (y - x) + 1;
            }
        }
    }
}

fn draw_disc(frame: &mut RgbImage, cx: f32, cy: f32, radius: i32, color: Rgb<u8>) {
    let cx = cx.round() as i32;
    let cy = cy.round() as i32;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

/// 3x5 glyph rows, top to bottom, three low bits per row.
fn glyph(c: char) -> Option<[u8; 5]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        'x' => [0b000, 0b101, 0b010, 0b101, 0b000],
        'y' => [0b000, 0b101, 0b010, 0b010, 0b010],
        'z' => [0b000, 0b111, 0b010, 0b100, 0b111],
        ' ' => [0; 5],
        _ => return None,
    })
}

fn draw_text(frame: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let mut pen_x = x;
    for c in text.chars() {
        let Some(rows) = glyph(c) else {
            pen_x += 4;
            continue;
        };
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    put(frame, pen_x + col, y + row as i32, color);
                }
            }
        }
        pen_x += 4;
    }
}
