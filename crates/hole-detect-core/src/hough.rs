//! Gradient Hough transform for circle detection.
//!
//! Works on the binarised, blurred marker image: Sobel gradients pick out
//! edge pixels, each edge pixel votes for candidate centres along its
//! gradient line, and accumulator peaks are refined with a least-squares
//! circle fit. A candidate is accepted only when its edge support covers a
//! large enough fraction of the circumference.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::image::GrayImageView;

/// Circle found in pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedCircle {
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
    /// Fraction of the circumference backed by edge pixels, in [0, 1].
    pub support: f32,
}

/// Radius search range for one marker class.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CircleProfile {
    pub min_radius: f32,
    pub max_radius: f32,
}

/// Detector sensitivity shared by both marker classes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HoughParams {
    /// Minimum separation between reported centres, pixels.
    pub min_center_distance: f32,
    /// Accumulator downscale factor relative to the image resolution.
    pub resolution_scale: f32,
    /// Sobel magnitude cutoff for a pixel to count as an edge.
    pub edge_gradient: f32,
    /// Minimum circumference support fraction to accept a circle.
    pub accumulator_threshold: f32,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            min_center_distance: 10.0,
            resolution_scale: 1.5,
            edge_gradient: 300.0,
            accumulator_threshold: 0.8,
        }
    }
}

#[derive(Clone, Copy)]
struct EdgePoint {
    x: f32,
    y: f32,
    // Unit gradient direction.
    nx: f32,
    ny: f32,
}

const RADIUS_SLACK: f32 = 2.0;
const INLIER_TOL: f32 = 2.0;
/// First-round inlier band as a fraction of the profile's maximum radius,
/// sized to swallow the voted-centre drift on large circles.
const WIDE_TOL_FRAC: f32 = 0.08;
const COVERAGE_SECTORS: usize = 32;
const MIN_FIT_POINTS: usize = 8;

/// Detect circles with radii inside `profile` on a binarised marker image.
///
/// Returned circles are sorted by descending support and already separated
/// by `min_center_distance`.
pub fn detect_circles(
    img: &GrayImageView<'_>,
    profile: &CircleProfile,
    params: &HoughParams,
) -> Vec<DetectedCircle> {
    if img.width < 3 || img.height < 3 || profile.max_radius < profile.min_radius {
        return Vec::new();
    }

    let edges = sobel_edges(img, params.edge_gradient);
    if edges.is_empty() {
        return Vec::new();
    }

    let centers = vote_centers(img, &edges, profile, params);

    let mut accepted: Vec<DetectedCircle> = Vec::new();
    for (c0x, c0y) in centers {
        let Some(circle) = refine_candidate(&edges, c0x, c0y, profile, params) else {
            continue;
        };
        accepted.push(circle);
    }

    accepted.sort_by(|a, b| b.support.total_cmp(&a.support));
    suppress_close(accepted, params.min_center_distance)
}

fn sobel_edges(img: &GrayImageView<'_>, magnitude_cutoff: f32) -> Vec<EdgePoint> {
    let w = img.width;
    let h = img.height;
    let px = |x: usize, y: usize| f32::from(img.data[y * w + x]);

    let mut out = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            let mag = (gx * gx + gy * gy).sqrt();
            if mag >= magnitude_cutoff {
                out.push(EdgePoint {
                    x: x as f32,
                    y: y as f32,
                    nx: gx / mag,
                    ny: gy / mag,
                });
            }
        }
    }
    out
}

/// Cast votes along both gradient directions and return candidate centres
/// (full-resolution pixels), strongest first, separated by the minimum
/// centre distance.
fn vote_centers(
    img: &GrayImageView<'_>,
    edges: &[EdgePoint],
    profile: &CircleProfile,
    params: &HoughParams,
) -> Vec<(f32, f32)> {
    let scale = params.resolution_scale.max(1.0);
    let aw = (img.width as f32 / scale).ceil() as usize;
    let ah = (img.height as f32 / scale).ceil() as usize;
    let mut acc = vec![0u32; aw * ah];

    for e in edges {
        for dir in [1.0f32, -1.0] {
            let mut r = profile.min_radius;
            while r <= profile.max_radius {
                let cx = e.x + dir * e.nx * r;
                let cy = e.y + dir * e.ny * r;
                if cx >= 0.0 && cy >= 0.0 && cx < img.width as f32 && cy < img.height as f32 {
                    acc[(cy / scale) as usize * aw + (cx / scale) as usize] += 1;
                }
                r += 1.0;
            }
        }
    }

    // A genuine centre collects roughly one vote per circumference pixel, so
    // a quarter of the smallest circumference prunes noise cells cheaply.
    let min_votes = (0.25 * std::f32::consts::TAU * profile.min_radius).max(6.0) as u32;

    let mut peaks: Vec<(u32, f32, f32)> = Vec::new();
    for cy in 0..ah {
        for cx in 0..aw {
            let votes = acc[cy * aw + cx];
            if votes < min_votes {
                continue;
            }
            let mut is_peak = true;
            'scan: for dy in -1..=1i64 {
                for dx in -1..=1i64 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let ny = cy as i64 + dy;
                    let nx = cx as i64 + dx;
                    if nx < 0 || ny < 0 || nx >= aw as i64 || ny >= ah as i64 {
                        continue;
                    }
                    if acc[ny as usize * aw + nx as usize] > votes {
                        is_peak = false;
                        break 'scan;
                    }
                }
            }
            if is_peak {
                peaks.push((votes, (cx as f32 + 0.5) * scale, (cy as f32 + 0.5) * scale));
            }
        }
    }

    peaks.sort_by(|a, b| b.0.cmp(&a.0));

    let min_dist_sq = params.min_center_distance * params.min_center_distance;
    let mut out: Vec<(f32, f32)> = Vec::new();
    for (_, x, y) in peaks {
        if out
            .iter()
            .all(|&(ox, oy)| (x - ox).powi(2) + (y - oy).powi(2) >= min_dist_sq)
        {
            out.push((x, y));
        }
    }
    out
}

/// Estimate the radius around a candidate centre, fit a circle to the inlier
/// edge pixels and check circumference coverage.
///
/// The voted centre can be off by several pixels for large radii (accumulator
/// cell quantisation plus gradient-direction error), which smears the rim's
/// distance histogram. The fit therefore starts from a radius-proportional
/// inlier band and re-selects inliers against the fitted circle with a
/// shrinking tolerance before coverage is measured.
fn refine_candidate(
    edges: &[EdgePoint],
    c0x: f32,
    c0y: f32,
    profile: &CircleProfile,
    params: &HoughParams,
) -> Option<DetectedCircle> {
    let lo = profile.min_radius - RADIUS_SLACK;
    let hi = profile.max_radius + RADIUS_SLACK;
    let wide_tol = (WIDE_TOL_FRAC * profile.max_radius).max(2.0 * INLIER_TOL);

    let gather_lo = (lo - wide_tol).max(0.0);
    let gather_hi = hi + wide_tol;
    let mut bins = vec![0u32; (gather_hi - gather_lo).ceil() as usize + 1];
    let mut annulus: Vec<&EdgePoint> = Vec::new();
    for e in edges {
        let d = ((e.x - c0x).powi(2) + (e.y - c0y).powi(2)).sqrt();
        if d >= gather_lo && d <= gather_hi {
            bins[(d - gather_lo) as usize] += 1;
            annulus.push(e);
        }
    }

    let peak_bin = bins
        .iter()
        .enumerate()
        .max_by_key(|(_, &count)| count)
        .map(|(idx, _)| idx)?;

    let mut cx = c0x;
    let mut cy = c0y;
    let mut radius = gather_lo + peak_bin as f32 + 0.5;

    for tol in [wide_tol, 2.0 * INLIER_TOL, INLIER_TOL] {
        let inliers: Vec<&EdgePoint> = annulus
            .iter()
            .filter(|e| {
                let d = ((e.x - cx).powi(2) + (e.y - cy).powi(2)).sqrt();
                (d - radius).abs() <= tol
            })
            .copied()
            .collect();
        if inliers.len() < MIN_FIT_POINTS {
            return None;
        }
        (cx, cy, radius) = fit_circle(&inliers)?;
    }

    if radius < lo || radius > hi {
        return None;
    }

    // Angular coverage of the fitted circumference by edge pixels.
    let mut sectors = [false; COVERAGE_SECTORS];
    for e in &annulus {
        let dx = e.x - cx;
        let dy = e.y - cy;
        if ((dx * dx + dy * dy).sqrt() - radius).abs() > INLIER_TOL + 0.5 {
            continue;
        }
        let angle = dy.atan2(dx) + std::f32::consts::PI;
        let sector =
            ((angle / std::f32::consts::TAU) * COVERAGE_SECTORS as f32) as usize % COVERAGE_SECTORS;
        sectors[sector] = true;
    }
    let support = sectors.iter().filter(|&&s| s).count() as f32 / COVERAGE_SECTORS as f32;
    if support < params.accumulator_threshold {
        return None;
    }

    Some(DetectedCircle {
        cx,
        cy,
        radius,
        support,
    })
}

/// Algebraic (Kasa) least-squares circle fit: `x^2 + y^2 = 2ax + 2by + c`.
fn fit_circle(points: &[&EdgePoint]) -> Option<(f32, f32, f32)> {
    let mut m = Matrix3::<f64>::zeros();
    let mut rhs = Vector3::<f64>::zeros();
    for p in points {
        let x = f64::from(p.x);
        let y = f64::from(p.y);
        let g = Vector3::new(2.0 * x, 2.0 * y, 1.0);
        m += g * g.transpose();
        rhs += g * (x * x + y * y);
    }
    let sol = m.lu().solve(&rhs)?;
    let (a, b, c) = (sol[0], sol[1], sol[2]);
    let r_sq = c + a * a + b * b;
    if r_sq <= 0.0 {
        return None;
    }
    Some((a as f32, b as f32, r_sq.sqrt() as f32))
}

fn suppress_close(sorted: Vec<DetectedCircle>, min_center_distance: f32) -> Vec<DetectedCircle> {
    let min_dist_sq = min_center_distance * min_center_distance;
    let mut out: Vec<DetectedCircle> = Vec::new();
    for c in sorted {
        if out
            .iter()
            .all(|o| (c.cx - o.cx).powi(2) + (c.cy - o.cy).powi(2) >= min_dist_sq)
        {
            out.push(c);
        }
    }
    out
}
