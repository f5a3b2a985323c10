use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;

use crate::config::TracingConfig;

/// A single transformation applied to the pixel surface before tracing.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessStep {
    SelectiveBlur {
        radius: u32,
        delta: u32,
    },
    Quantize {
        colors: usize,
        passes: usize,
        min_ratio: f32,
    },
}

impl PreprocessStep {
    pub fn apply(&self, input: &RgbaImage) -> RgbaImage {
        match self {
            PreprocessStep::SelectiveBlur { radius, delta } => {
                selective_blur(input, *radius, *delta)
            }
            PreprocessStep::Quantize {
                colors,
                passes,
                min_ratio,
            } => {
                let palette = Palette::build(input, *colors, *passes, *min_ratio);
                palette.quantize(input)
            }
        }
    }
}

/// Run a list of steps against the provided source image.
pub fn apply_steps(source: RgbaImage, steps: &[PreprocessStep]) -> RgbaImage {
    let mut current = source;
    for step in steps {
        current = step.apply(&current);
    }
    current
}

/// Blur first (if enabled), then quantize the palette.
pub fn steps_from_config(config: &TracingConfig) -> Vec<PreprocessStep> {
    let mut steps = Vec::new();
    if config.blur_radius > 0 {
        steps.push(PreprocessStep::SelectiveBlur {
            radius: config.blur_radius,
            delta: config.blur_delta,
        });
    }
    if config.color_count > 0 {
        steps.push(PreprocessStep::Quantize {
            colors: config.color_count,
            passes: config.quantization_passes,
            min_ratio: config.min_color_ratio,
        });
    }
    steps
}

/// Gaussian blur that only keeps blurred pixels close to the original.
///
/// A pixel whose summed RGBA difference from the source exceeds `delta` is
/// restored, so hard edges survive while flat areas are smoothed.
pub fn selective_blur(image: &RgbaImage, radius: u32, delta: u32) -> RgbaImage {
    if radius == 0 {
        return image.clone();
    }
    let mut out = gaussian_blur_f32(image, radius as f32);
    for (out_px, src_px) in out.pixels_mut().zip(image.pixels()) {
        if rgba_distance(&out_px.0, &src_px.0) > delta {
            *out_px = *src_px;
        }
    }
    out
}

fn rgba_distance(a: &[u8; 4], b: &[u8; 4]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| u32::from(x.abs_diff(*y)))
        .sum()
}

/// Minimum summed RGBA distance between seeds picked in the first sweep.
const SEED_SEPARATION: u32 = 32;

/// Fully transparent pixels all share one key, whatever their hidden RGB.
fn palette_key(px: [u8; 4]) -> [u8; 4] {
    if px[3] == 0 { [0; 4] } else { px }
}

/// One palette color and how many pixels it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub color: [u8; 4],
    pub count: usize,
}

/// A reduced color palette computed from an image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
    total: usize,
}

impl Palette {
    /// Build a palette of at most `max_colors` entries.
    ///
    /// Seeds are the most frequent distinct colors, preferring ones that are
    /// well apart from the seeds already taken. They are refined for `passes`
    /// rounds of nearest-color assignment. After each round, entries covering
    /// less than `min_ratio` of the pixels are dropped (the most populous entry
    /// is always kept) and the colors they held no longer move any center.
    /// Each surviving center is finally snapped to the most frequent source
    /// color of its cluster, so flat fills come out exactly. No randomness is
    /// involved, so the same image always yields the same palette.
    pub fn build(image: &RgbaImage, max_colors: usize, passes: usize, min_ratio: f32) -> Self {
        let histogram = histogram(image);
        let total: usize = histogram.iter().map(|(_, count)| count).sum();
        if total == 0 || max_colors == 0 {
            return Self {
                entries: Vec::new(),
                total,
            };
        }

        let mut centers = seed_centers(&histogram, max_colors);
        let mut active = vec![true; histogram.len()];

        for _ in 0..passes.max(1) {
            let assignment: Vec<usize> = histogram
                .iter()
                .map(|(color, _)| nearest(&centers, color))
                .collect();

            let mut counts = vec![0usize; centers.len()];
            let mut weights = vec![0u64; centers.len()];
            let mut sums = vec![[0u64; 4]; centers.len()];
            for (((color, count), &idx), &is_active) in
                histogram.iter().zip(&assignment).zip(&active)
            {
                counts[idx] += count;
                if is_active {
                    weights[idx] += *count as u64;
                    for (sum, channel) in sums[idx].iter_mut().zip(color.iter()) {
                        *sum += u64::from(*channel) * *count as u64;
                    }
                }
            }

            let keep = significant(&counts, total, min_ratio);
            for (is_active, &idx) in active.iter_mut().zip(&assignment) {
                if !keep[idx] {
                    *is_active = false;
                }
            }
            centers = centers
                .iter()
                .enumerate()
                .filter(|(idx, _)| keep[*idx])
                .map(|(idx, center)| match weights[idx] {
                    0 => *center,
                    weight => mean_color(&sums[idx], weight),
                })
                .collect();
        }

        let centers = snap_to_modes(&histogram, &active, &centers);
        let mut counts = vec![0usize; centers.len()];
        for (color, count) in &histogram {
            counts[nearest(&centers, color)] += count;
        }
        let entries = centers
            .into_iter()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(color, count)| PaletteEntry { color, count })
            .collect();

        Self { entries, total }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Share of pixels covered by the entry at `index`.
    pub fn coverage(&self, index: usize) -> Option<f32> {
        let entry = self.entries.get(index)?;
        Some(entry.count as f32 / self.total.max(1) as f32)
    }

    /// Index of the palette color closest to `color`.
    pub fn nearest(&self, color: &[u8; 4]) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let colors: Vec<[u8; 4]> = self.entries.iter().map(|e| e.color).collect();
        Some(nearest(&colors, &palette_key(*color)))
    }

    /// Replace every pixel with its nearest palette color.
    pub fn quantize(&self, image: &RgbaImage) -> RgbaImage {
        if self.entries.is_empty() {
            return image.clone();
        }
        let colors: Vec<[u8; 4]> = self.entries.iter().map(|e| e.color).collect();
        let mut out = image.clone();
        for px in out.pixels_mut() {
            *px = Rgba(colors[nearest(&colors, &palette_key(px.0))]);
        }
        out
    }
}

/// Distinct colors with their pixel counts, most frequent first. Ties are
/// ordered by color.
fn histogram(image: &RgbaImage) -> Vec<([u8; 4], usize)> {
    let mut counts: BTreeMap<[u8; 4], usize> = BTreeMap::new();
    for px in image.pixels() {
        *counts.entry(palette_key(px.0)).or_default() += 1;
    }
    let mut histogram: Vec<([u8; 4], usize)> = counts.into_iter().collect();
    histogram.sort_by(|(ca, a), (cb, b)| b.cmp(a).then(ca.cmp(cb)));
    histogram
}

/// Walk the histogram twice: first taking colors far enough from every seed
/// so far, then filling any remaining slots in frequency order.
fn seed_centers(histogram: &[([u8; 4], usize)], max_colors: usize) -> Vec<[u8; 4]> {
    let mut seeds: Vec<[u8; 4]> = Vec::with_capacity(max_colors.min(histogram.len()));
    for (color, _) in histogram {
        if seeds.len() == max_colors {
            return seeds;
        }
        if seeds
            .iter()
            .all(|seed| rgba_distance(seed, color) >= SEED_SEPARATION)
        {
            seeds.push(*color);
        }
    }
    for (color, _) in histogram {
        if seeds.len() == max_colors {
            break;
        }
        if !seeds.contains(color) {
            seeds.push(*color);
        }
    }
    seeds
}

/// Ties go to the earlier center.
fn nearest(centers: &[[u8; 4]], px: &[u8; 4]) -> usize {
    let mut best = 0;
    let mut best_distance = u32::MAX;
    for (idx, center) in centers.iter().enumerate() {
        let distance = rgba_distance(center, px);
        if distance < best_distance {
            best = idx;
            best_distance = distance;
        }
    }
    best
}

fn mean_color(sum: &[u64; 4], weight: u64) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (channel, total) in out.iter_mut().zip(sum.iter()) {
        *channel = ((total + weight / 2) / weight).min(255) as u8;
    }
    out
}

/// Which centers survive a round: non-empty, and either the most populous one
/// or covering at least `min_ratio` of the pixels.
fn significant(counts: &[usize], total: usize, min_ratio: f32) -> Vec<bool> {
    let largest = counts
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
        .map(|(idx, _)| idx);

    counts
        .iter()
        .enumerate()
        .map(|(idx, &count)| {
            count > 0 && (Some(idx) == largest || count as f32 / total as f32 >= min_ratio)
        })
        .collect()
}

/// Replace each center with the most frequent still-active color assigned to
/// it. Centers that end up on the same color are merged.
fn snap_to_modes(
    histogram: &[([u8; 4], usize)],
    active: &[bool],
    centers: &[[u8; 4]],
) -> Vec<[u8; 4]> {
    let mut modes: Vec<Option<[u8; 4]>> = vec![None; centers.len()];
    for ((color, _), _) in histogram.iter().zip(active).filter(|(_, is_active)| **is_active) {
        let slot = &mut modes[nearest(centers, color)];
        if slot.is_none() {
            *slot = Some(*color);
        }
    }

    let mut snapped: Vec<[u8; 4]> = Vec::with_capacity(centers.len());
    for (center, mode) in centers.iter().zip(modes) {
        let color = mode.unwrap_or(*center);
        if !snapped.contains(&color) {
            snapped.push(color);
        }
    }
    snapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_image(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    fn disc(size: u32, background: [u8; 4], fill: [u8; 4]) -> RgbaImage {
        let center = size as f32 / 2.0;
        let radius = size as f32 / 3.0;
        RgbaImage::from_fn(size, size, |x, y| {
            let (dx, dy) = (x as f32 - center, y as f32 - center);
            if dx * dx + dy * dy <= radius * radius {
                Rgba(fill)
            } else {
                Rgba(background)
            }
        })
    }

    fn checkerboard() -> RgbaImage {
        let mut img = rgba_image(2, 2, [255, 255, 255, 255]);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([0, 0, 0, 255]));
        img
    }

    mod palette {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn uniform_image_has_one_color() {
                let img = rgba_image(5, 5, [12, 34, 56, 255]);
                let palette = Palette::build(&img, 16, 3, 0.02);
                assert_eq!(palette.len(), 1);
                assert_eq!(palette.entries()[0].color, [12, 34, 56, 255]);
                assert_eq!(palette.entries()[0].count, 25);
                assert_eq!(palette.coverage(0), Some(1.0));
            }

            #[test]
            fn checkerboard_two_colors() {
                let palette = Palette::build(&checkerboard(), 2, 3, 0.02);
                let colors: Vec<[u8; 4]> = palette.entries().iter().map(|e| e.color).collect();
                assert_eq!(colors, vec![[0, 0, 0, 255], [255, 255, 255, 255]]);
            }

            #[test]
            fn duplicate_seeds_collapse() {
                // more seeds than distinct colors
                let palette = Palette::build(&checkerboard(), 16, 3, 0.0);
                assert_eq!(palette.len(), 2);
            }

            #[test]
            fn rare_color_merged_away() {
                // 1 red pixel out of 100 is below the 2% threshold
                let mut img = rgba_image(10, 10, [255, 255, 255, 255]);
                img.put_pixel(4, 4, Rgba([255, 0, 0, 255]));
                let palette = Palette::build(&img, 16, 3, 0.02);
                assert_eq!(palette.len(), 1);

                let quantized = palette.quantize(&img);
                assert!(quantized.pixels().all(|px| px.0 == [255, 255, 255, 255]));
            }

            #[test]
            fn rare_color_kept_with_zero_ratio() {
                let mut img = rgba_image(10, 10, [255, 255, 255, 255]);
                img.put_pixel(4, 4, Rgba([255, 0, 0, 255]));
                let palette = Palette::build(&img, 100, 1, 0.0);
                assert_eq!(palette.len(), 2);
            }

            #[test]
            fn largest_color_survives_aggressive_ratio() {
                let mut img = rgba_image(4, 1, [0, 0, 0, 255]);
                img.put_pixel(3, 0, Rgba([255, 255, 255, 255]));
                let palette = Palette::build(&img, 4, 3, 0.9);
                assert_eq!(palette.len(), 1);
                assert_eq!(palette.entries()[0].color, [0, 0, 0, 255]);
            }

            #[test]
            fn pruned_color_does_not_shift_survivor() {
                // 3 black + 1 white; white is pruned in the first round
                let mut img = rgba_image(4, 1, [0, 0, 0, 255]);
                img.put_pixel(3, 0, Rgba([255, 255, 255, 255]));
                let palette = Palette::build(&img, 4, 5, 0.5);
                assert_eq!(palette.entries(), &[PaletteEntry { color: [0, 0, 0, 255], count: 4 }]);
            }

            #[test]
            fn disc_on_white_keeps_both_colors() {
                let img = disc(64, [255, 255, 255, 255], [220, 20, 20, 255]);
                let palette = Palette::build(&img, 16, 3, 0.02);
                let colors: Vec<[u8; 4]> = palette.entries().iter().map(|e| e.color).collect();
                assert_eq!(colors, vec![[255, 255, 255, 255], [220, 20, 20, 255]]);
            }

            #[test]
            fn disc_on_black_keeps_both_colors() {
                let img = disc(64, [0, 0, 0, 255], [220, 20, 20, 255]);
                let palette = Palette::build(&img, 16, 3, 0.02);
                assert_eq!(palette.len(), 2);
                assert!(palette.entries().iter().any(|e| e.color == [220, 20, 20, 255]));
            }

            #[test]
            fn small_logo_color_gets_its_own_entry() {
                // 8x8 mark in one corner: 64 of 4096 pixels, above 1%
                let mut img = rgba_image(64, 64, [250, 250, 250, 255]);
                for x in 40..48 {
                    for y in 40..48 {
                        img.put_pixel(x, y, Rgba([0, 90, 160, 255]));
                    }
                }
                let palette = Palette::build(&img, 16, 3, 0.01);
                assert_eq!(palette.len(), 2);
                assert_eq!(palette.quantize(&img), img);
            }

            #[test]
            fn transparent_pixels_share_one_entry() {
                let img = RgbaImage::from_fn(8, 8, |x, y| {
                    if x < 4 {
                        Rgba([(x * 60) as u8, (y * 30) as u8, 7, 0])
                    } else {
                        Rgba([200, 10, 10, 255])
                    }
                });
                let palette = Palette::build(&img, 16, 3, 0.0);
                assert_eq!(palette.len(), 2);
                assert_eq!(palette.entries()[0].count, 32);
                assert_eq!(palette.entries()[1].count, 32);
                assert_eq!(palette.nearest(&[99, 99, 99, 0]), palette.nearest(&[0, 0, 0, 0]));
            }

            #[test]
            fn zero_colors_leaves_image_untouched() {
                let img = checkerboard();
                let palette = Palette::build(&img, 0, 3, 0.02);
                assert!(palette.is_empty());
                assert_eq!(palette.quantize(&img), img);
                assert_eq!(palette.nearest(&[0, 0, 0, 255]), None);
            }

            #[test]
            fn zero_passes_still_assigns() {
                let palette = Palette::build(&checkerboard(), 2, 0, 0.02);
                assert_eq!(palette.len(), 2);
            }

            #[test]
            fn alpha_participates_in_distance() {
                let mut img = rgba_image(2, 1, [10, 10, 10, 255]);
                img.put_pixel(1, 0, Rgba([10, 10, 10, 0]));
                let palette = Palette::build(&img, 2, 3, 0.0);
                assert_eq!(palette.len(), 2);
            }

            #[test]
            fn build_is_deterministic() {
                let mut img = rgba_image(16, 16, [200, 200, 200, 255]);
                for x in 0..16 {
                    for y in 0..(x % 7) {
                        img.put_pixel(x, y, Rgba([(x * 15) as u8, 40, (y * 30) as u8, 255]));
                    }
                }
                let a = Palette::build(&img, 8, 3, 0.02);
                let b = Palette::build(&img, 8, 3, 0.02);
                assert_eq!(a, b);
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// Palette::build: never more entries than requested, counts sum to the pixel total
                #[test]
                fn bounded_and_complete(
                    w in 1u32..12,
                    h in 1u32..12,
                    seed in proptest::collection::vec(proptest::num::u8::ANY, 4..64),
                    max_colors in 1usize..20,
                    min_ratio in 0.0f32..0.2f32
                ) {
                    let img = RgbaImage::from_fn(w, h, |x, y| {
                        let i = ((y * w + x) as usize * 4) % seed.len();
                        Rgba([seed[i], seed[(i + 1) % seed.len()], seed[(i + 2) % seed.len()], 255])
                    });
                    let palette = Palette::build(&img, max_colors, 3, min_ratio);

                    prop_assert!(!palette.is_empty());
                    prop_assert!(palette.len() <= max_colors);
                    let counted: usize = palette.entries().iter().map(|e| e.count).sum();
                    prop_assert_eq!(counted, (w * h) as usize);
                }

                /// Palette::quantize: output colors are a subset of the palette
                #[test]
                fn quantized_colors_from_palette(
                    w in 1u32..10,
                    h in 1u32..10,
                    max_colors in 1usize..6
                ) {
                    let img = RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 25) as u8, (y * 25) as u8, 90, 255]));
                    let palette = Palette::build(&img, max_colors, 3, 0.02);
                    let quantized = palette.quantize(&img);

                    prop_assert_eq!(quantized.dimensions(), (w, h));
                    for px in quantized.pixels() {
                        prop_assert!(palette.entries().iter().any(|e| e.color == px.0));
                    }
                }
            }
        }
    }

    mod selective_blur {
        use super::*;

        fn split_image() -> RgbaImage {
            RgbaImage::from_fn(10, 10, |x, _| {
                if x < 5 {
                    Rgba([0, 0, 0, 255])
                } else {
                    Rgba([255, 255, 255, 255])
                }
            })
        }

        #[test]
        fn radius_zero_is_identity() {
            let img = split_image();
            assert_eq!(selective_blur(&img, 0, 1024), img);
        }

        #[test]
        fn zero_delta_restores_every_changed_pixel() {
            let img = split_image();
            assert_eq!(selective_blur(&img, 2, 0), img);
        }

        #[test]
        fn large_delta_softens_edges() {
            let img = split_image();
            let out = selective_blur(&img, 2, 1024);
            assert_eq!(out.dimensions(), (10, 10));
            let edge = out.get_pixel(4, 5).0;
            assert!(edge[0] > 0 && edge[0] < 255, "edge pixel {edge:?}");
        }
    }

    mod steps {
        use super::*;

        #[test]
        fn default_profile_only_quantizes() {
            let steps = steps_from_config(&TracingConfig::default());
            assert_eq!(
                steps,
                vec![PreprocessStep::Quantize {
                    colors: 16,
                    passes: 3,
                    min_ratio: 0.02
                }]
            );
        }

        #[test]
        fn blur_runs_before_quantize() {
            let cfg = TracingConfig::default().with_blur(2, 20);
            let steps = steps_from_config(&cfg);
            assert_eq!(steps.len(), 2);
            assert_eq!(
                steps[0],
                PreprocessStep::SelectiveBlur {
                    radius: 2,
                    delta: 20
                }
            );
        }

        #[test]
        fn zero_colors_skips_quantize() {
            let cfg = TracingConfig::default().with_color_count(0);
            assert!(steps_from_config(&cfg).is_empty());
        }

        #[test]
        fn default_profile_keeps_pure_white_under_specks() {
            // 100 red specks on 10 000 white pixels, below the 2% ratio
            let mut img = rgba_image(100, 100, [255, 255, 255, 255]);
            for i in 0..100 {
                img.put_pixel(i, (i * 37) % 100, Rgba([255, 0, 0, 255]));
            }
            let out = apply_steps(img, &steps_from_config(&TracingConfig::default()));
            assert!(out.pixels().all(|px| px.0 == [255, 255, 255, 255]));
        }

        #[test]
        fn default_profile_keeps_logo_colors() {
            let img = disc(64, [255, 255, 255, 255], [220, 20, 20, 255]);
            let out = apply_steps(img.clone(), &steps_from_config(&TracingConfig::default()));
            assert_eq!(out, img);
        }

        #[test]
        fn apply_steps_empty_returns_source() {
            let img = checkerboard();
            assert_eq!(apply_steps(img.clone(), &[]), img);
        }

        #[test]
        fn apply_steps_quantizes() {
            let mut img = rgba_image(10, 10, [250, 250, 250, 255]);
            img.put_pixel(0, 0, Rgba([245, 250, 250, 255]));
            let steps = vec![PreprocessStep::Quantize {
                colors: 1,
                passes: 3,
                min_ratio: 0.0,
            }];
            let out = apply_steps(img, &steps);
            let first = out.get_pixel(0, 0).0;
            assert!(out.pixels().all(|px| px.0 == first));
        }
    }
}
