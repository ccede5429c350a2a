//! Dominant color extraction by modified median cut quantization (MMCQ).
//!
//! Pixels are bucketed into a 5-bit-per-channel histogram. The color space
//! box is then split repeatedly along its longest axis at the population
//! median: first by population alone until 75% of the requested colors
//! exist, then by population x volume for the rest. Each final box's
//! weighted average is one palette color, most representative first.

use crate::error::{Error, Result};
use image::DynamicImage;
use std::fmt;

const SIGBITS: u32 = 5;
const RSHIFT: u32 = 8 - SIGBITS;
const HISTO_SIZE: usize = 1 << (3 * SIGBITS);
const SLOTS: usize = 1 << SIGBITS;
const MAX_ITERATIONS: usize = 1000;
const FRACT_BY_POPULATIONS: f64 = 0.75;

/// Colors asked of the quantizer when only the dominant one is wanted.
const DOMINANT_PALETTE_SIZE: usize = 5;
const MIN_ALPHA: u8 = 125;
const NEAR_WHITE: u8 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// CSS form, `rgb(r, g, b)`
    pub fn to_css(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Red,
    Green,
    Blue,
}

fn color_index(r: i32, g: i32, b: i32) -> usize {
    ((r << (2 * SIGBITS)) + (g << SIGBITS) + b) as usize
}

struct Histogram(Vec<u64>);

impl Histogram {
    fn from_pixels(pixels: &[[u8; 3]]) -> Self {
        let mut histo = vec![0u64; HISTO_SIZE];
        for &[r, g, b] in pixels {
            let idx = color_index(
                (r >> RSHIFT) as i32,
                (g >> RSHIFT) as i32,
                (b >> RSHIFT) as i32,
            );
            histo[idx] += 1;
        }
        Self(histo)
    }

    fn get(&self, r: i32, g: i32, b: i32) -> u64 {
        self.0[color_index(r, g, b)]
    }
}

/// Axis-aligned box in the reduced color space, bounds inclusive. A box
/// whose lower bound passed its upper bound is empty.
#[derive(Debug, Clone)]
struct VBox {
    r1: i32,
    r2: i32,
    g1: i32,
    g2: i32,
    b1: i32,
    b2: i32,
    count: u64,
}

impl VBox {
    fn new(bounds: [i32; 6], histo: &Histogram) -> Self {
        let [r1, r2, g1, g2, b1, b2] = bounds;
        let mut vbox = Self {
            r1,
            r2,
            g1,
            g2,
            b1,
            b2,
            count: 0,
        };
        vbox.count = vbox.population(histo);
        vbox
    }

    fn from_pixels(pixels: &[[u8; 3]], histo: &Histogram) -> Self {
        let mut bounds = [i32::MAX, i32::MIN, i32::MAX, i32::MIN, i32::MAX, i32::MIN];
        for pixel in pixels {
            for (c, &value) in pixel.iter().enumerate() {
                let v = (value >> RSHIFT) as i32;
                bounds[2 * c] = bounds[2 * c].min(v);
                bounds[2 * c + 1] = bounds[2 * c + 1].max(v);
            }
        }
        Self::new(bounds, histo)
    }

    fn bounds(&self) -> [i32; 6] {
        [self.r1, self.r2, self.g1, self.g2, self.b1, self.b2]
    }

    fn channel_bounds(&self, channel: Channel) -> (i32, i32) {
        match channel {
            Channel::Red => (self.r1, self.r2),
            Channel::Green => (self.g1, self.g2),
            Channel::Blue => (self.b1, self.b2),
        }
    }

    fn volume(&self) -> u64 {
        let span = |lo: i32, hi: i32| (hi - lo + 1).max(0) as u64;
        span(self.r1, self.r2) * span(self.g1, self.g2) * span(self.b1, self.b2)
    }

    fn population(&self, histo: &Histogram) -> u64 {
        let mut total = 0;
        for r in self.r1..=self.r2 {
            for g in self.g1..=self.g2 {
                for b in self.b1..=self.b2 {
                    total += histo.get(r, g, b);
                }
            }
        }
        total
    }

    /// Population of the slice where `channel` equals `value`.
    fn slice_population(&self, histo: &Histogram, channel: Channel, value: i32) -> u64 {
        let (mut r, mut g, mut b) = ((self.r1, self.r2), (self.g1, self.g2), (self.b1, self.b2));
        match channel {
            Channel::Red => r = (value, value),
            Channel::Green => g = (value, value),
            Channel::Blue => b = (value, value),
        }
        let mut total = 0;
        for ri in r.0..=r.1 {
            for gi in g.0..=g.1 {
                for bi in b.0..=b.1 {
                    total += histo.get(ri, gi, bi);
                }
            }
        }
        total
    }

    /// Copy with one channel's bound replaced. `upper` picks which end.
    fn with_bound(&self, channel: Channel, upper: bool, value: i32, histo: &Histogram) -> Self {
        let mut bounds = self.bounds();
        let slot = match channel {
            Channel::Red => 0,
            Channel::Green => 2,
            Channel::Blue => 4,
        } + usize::from(upper);
        bounds[slot] = value;
        Self::new(bounds, histo)
    }

    fn average(&self, histo: &Histogram) -> Rgb {
        let mult = f64::from(1u32 << RSHIFT);
        let (mut total, mut r_sum, mut g_sum, mut b_sum) = (0u64, 0.0, 0.0, 0.0);

        for r in self.r1..=self.r2 {
            for g in self.g1..=self.g2 {
                for b in self.b1..=self.b2 {
                    let hval = histo.get(r, g, b);
                    if hval == 0 {
                        continue;
                    }
                    let weight = hval as f64;
                    total += hval;
                    r_sum += weight * (f64::from(r) + 0.5) * mult;
                    g_sum += weight * (f64::from(g) + 0.5) * mult;
                    b_sum += weight * (f64::from(b) + 0.5) * mult;
                }
            }
        }

        let to_u8 = |v: f64| (v as i64).clamp(0, 255) as u8;
        if total > 0 {
            let n = total as f64;
            Rgb(to_u8(r_sum / n), to_u8(g_sum / n), to_u8(b_sum / n))
        } else {
            // Empty box: its geometric center
            let mid = |lo: i32, hi: i32| to_u8(mult * f64::from(lo + hi + 1) / 2.0);
            Rgb(mid(self.r1, self.r2), mid(self.g1, self.g2), mid(self.b1, self.b2))
        }
    }
}

/// Split `vbox` at the population median of its widest channel.
///
/// `None` only when there is nothing to split; a single-pixel box comes back
/// unchanged with no sibling.
fn median_cut(histo: &Histogram, vbox: &VBox) -> Option<(VBox, Option<VBox>)> {
    if vbox.count == 0 {
        return None;
    }
    if vbox.count == 1 {
        return Some((vbox.clone(), None));
    }

    let rw = vbox.r2 - vbox.r1 + 1;
    let gw = vbox.g2 - vbox.g1 + 1;
    let bw = vbox.b2 - vbox.b1 + 1;
    let maxw = rw.max(gw).max(bw);
    let channel = if maxw == rw {
        Channel::Red
    } else if maxw == gw {
        Channel::Green
    } else {
        Channel::Blue
    };

    let (lo, hi) = vbox.channel_bounds(channel);
    let mut partial = [0u64; SLOTS];
    let mut total = 0;
    for i in lo..=hi {
        total += vbox.slice_population(histo, channel, i);
        partial[i as usize] = total;
    }

    let in_range = |i: i32| (lo..=hi).contains(&i);
    let partial_at = |i: i32| if in_range(i) { partial[i as usize] } else { 0 };
    let lookahead_at = |i: i32| if in_range(i) { total - partial[i as usize] } else { 0 };

    for i in lo..=hi {
        if partial[i as usize] as f64 <= total as f64 / 2.0 {
            continue;
        }

        let left = i - lo;
        let right = hi - i;
        let mut d2 = if left <= right {
            (hi - 1).min((f64::from(i) + f64::from(right) / 2.0) as i32)
        } else {
            lo.max((f64::from(i) - 1.0 - f64::from(left) / 2.0) as i32)
        };

        // Never cut off an empty half
        while partial_at(d2) == 0 {
            d2 += 1;
        }
        let mut count2 = lookahead_at(d2);
        while count2 == 0 && partial_at(d2 - 1) != 0 {
            d2 -= 1;
            count2 = lookahead_at(d2);
        }

        let first = vbox.with_bound(channel, true, d2, histo);
        let second = vbox.with_bound(channel, false, d2 + 1, histo);
        return Some((first, Some(second)));
    }

    None
}

/// Max-queue that only sorts when popped after a push. Ties pop the box
/// pushed last, like a stable ascending sort popped from the back.
struct BoxQueue {
    boxes: Vec<VBox>,
    sorted: bool,
    key: fn(&VBox) -> u64,
}

impl BoxQueue {
    fn new(key: fn(&VBox) -> u64) -> Self {
        Self {
            boxes: Vec::new(),
            sorted: true,
            key,
        }
    }

    fn push(&mut self, vbox: VBox) {
        self.boxes.push(vbox);
        self.sorted = false;
    }

    fn pop(&mut self) -> Option<VBox> {
        if !self.sorted {
            self.boxes.sort_by_key(self.key);
            self.sorted = true;
        }
        self.boxes.pop()
    }

    fn len(&self) -> usize {
        self.boxes.len()
    }
}

fn split_until(queue: &mut BoxQueue, histo: &Histogram, target: f64) -> Result<()> {
    let mut colors = 1usize;
    let mut iterations = 0usize;

    while iterations < MAX_ITERATIONS {
        let Some(vbox) = queue.pop() else {
            return Ok(());
        };
        if vbox.count == 0 {
            queue.push(vbox);
            iterations += 1;
            continue;
        }

        let (first, second) = median_cut(histo, &vbox).ok_or(Error::Quantize)?;
        queue.push(first);
        if let Some(second) = second {
            queue.push(second);
            colors += 1;
        }
        if colors as f64 >= target {
            return Ok(());
        }
        iterations += 1;
    }

    Ok(())
}

fn quantize(pixels: &[[u8; 3]], max_colors: usize) -> Result<Vec<Rgb>> {
    if pixels.is_empty() {
        return Err(Error::EmptyImage);
    }
    if !(2..=256).contains(&max_colors) {
        return Err(Error::ColorCount(max_colors));
    }

    let histo = Histogram::from_pixels(pixels);

    // 1. Split by population
    let mut by_count = BoxQueue::new(|b| b.count);
    by_count.push(VBox::from_pixels(pixels, &histo));
    split_until(&mut by_count, &histo, FRACT_BY_POPULATIONS * max_colors as f64)?;

    // 2. Split by population x volume
    let mut by_volume = BoxQueue::new(|b| b.count * b.volume());
    while let Some(vbox) = by_count.pop() {
        by_volume.push(vbox);
    }
    let remaining = max_colors as f64 - by_volume.len() as f64;
    split_until(&mut by_volume, &histo, remaining)?;

    let mut palette = Vec::with_capacity(by_volume.len());
    while let Some(vbox) = by_volume.pop() {
        palette.push(vbox.average(&histo));
    }
    Ok(palette)
}

/// Every `quality`-th pixel that is opaque enough and not near-white.
fn sample_pixels(img: &DynamicImage, quality: u32) -> Vec<[u8; 3]> {
    let step = quality.max(1) as usize;
    img.to_rgba8()
        .pixels()
        .step_by(step)
        .filter(|p| {
            let [r, g, b, a] = p.0;
            a >= MIN_ALPHA && !(r > NEAR_WHITE && g > NEAR_WHITE && b > NEAR_WHITE)
        })
        .map(|p| [p.0[0], p.0[1], p.0[2]])
        .collect()
}

/// Up to `color_count` representative colors, most representative first.
/// `quality` is the pixel sampling step; 1 looks at every pixel.
pub fn palette(img: &DynamicImage, color_count: usize, quality: u32) -> Result<Vec<Rgb>> {
    quantize(&sample_pixels(img, quality), color_count)
}

pub fn dominant_color(img: &DynamicImage, quality: u32) -> Result<Rgb> {
    palette(img, DOMINANT_PALETTE_SIZE, quality)?
        .first()
        .copied()
        .ok_or(Error::EmptyImage)
}
