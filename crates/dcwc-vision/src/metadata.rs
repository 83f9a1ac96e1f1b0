use dcwc_data::Rarity;
use dcwc_state::{clamp_badge, clamp_rank, CardMetadata};
use image::{Rgba, RgbaImage};
use tracing::debug;

// Rarity: border samples
const BORDER_INSET_PX: u32 = 5;
const BORDER_SAMPLE_STEP: usize = 10;
const YELLOW_MIN_R: u8 = 180;
const YELLOW_MIN_G: u8 = 140;
const YELLOW_MAX_B: u8 = 100;
const EPIC_YELLOW_RATIO: f64 = 0.5;

// Rank: star band along the bottom edge
const STAR_BAND_TOP: f64 = 0.85;
const STAR_MIN_BRIGHTNESS: u32 = 150;
const GOLD_MIN_R: u8 = 200;
const GOLD_MIN_G: u8 = 180;
const GOLD_MAX_B: u8 = 100;
const RED_STAR_MIN_R: u8 = 200;
const RED_STAR_MAX_G: u8 = 100;
const RED_STAR_MAX_B: u8 = 100;
const PLATINUM_MIN: u8 = 180;
const GOLD_BAND_START: i64 = 1;
const RED_BAND_START: i64 = 6;
const PLATINUM_BAND_START: i64 = 11;
const BAND_WIDTH: i64 = 5;

// Badge: icon in the top-left corner
const BADGE_LEFT: f64 = 0.05;
const BADGE_RIGHT: f64 = 0.20;
const BADGE_TOP: f64 = 0.10;
const BADGE_BOTTOM: f64 = 0.25;
const BADGE_SAMPLE_STEP: usize = 2;
const BADGE_MIN_PIXELS: u32 = 5;
const BLUE_BADGE_LEVEL: i64 = 5;
const PURPLE_BADGE_LEVEL: i64 = 15;
const RED_BADGE_FIRST_LEVEL: i64 = 21;

/// Read rarity, rank and badge level off a card.
/// Rank and badge are bucket midpoints, not exact counts.
pub fn detect_metadata(card: &RgbaImage) -> CardMetadata {
    let rarity = detect_rarity(card);
    let rank = detect_rank(card);
    let badge_level = detect_badge_level(card, rarity);

    debug!(
        "Card metadata: rarity={:?} rank={} badge={}",
        rarity, rank, badge_level
    );
    CardMetadata::new(rarity, rank as i64, badge_level as i64)
}

/// Yellow/gold background = Epic, anything else = Legendary
pub fn detect_rarity(card: &RgbaImage) -> Rarity {
    let (w, h) = card.dimensions();
    if w == 0 || h == 0 {
        return Rarity::Legendary;
    }

    let top_y = BORDER_INSET_PX.min(h - 1);
    let bottom_y = h.saturating_sub(BORDER_INSET_PX).min(h - 1);

    let mut total_r = 0u64;
    let mut total_g = 0u64;
    let mut yellow = 0u32;
    let mut samples = 0u32;

    for x in (w / 4..3 * w / 4).step_by(BORDER_SAMPLE_STEP) {
        for y in [top_y, bottom_y] {
            let px = card.get_pixel(x, y);
            total_r += px[0] as u64;
            total_g += px[1] as u64;
            if is_yellowish(px) {
                yellow += 1;
            }
            samples += 1;
        }
    }

    if samples == 0 {
        return Rarity::Legendary;
    }

    let n = samples as f64;
    let avg_r = total_r as f64 / n;
    let avg_g = total_g as f64 / n;
    let yellow_ratio = yellow as f64 / n;

    if yellow_ratio > EPIC_YELLOW_RATIO
        || (avg_r > YELLOW_MIN_R as f64 && avg_g > YELLOW_MIN_G as f64)
    {
        Rarity::Epic
    } else {
        Rarity::Legendary
    }
}

fn is_yellowish(px: &Rgba<u8>) -> bool {
    px[0] > YELLOW_MIN_R && px[1] > YELLOW_MIN_G && px[2] < YELLOW_MAX_B
}

#[derive(Debug, Default, Clone, Copy)]
struct StarCounts {
    bright: u64,
    gold: u64,
    red: u64,
    platinum: u64,
}

/// Star color picks the 5-wide rank band; colored pixel density picks the slot inside it
pub fn detect_rank(card: &RgbaImage) -> u8 {
    let (w, h) = card.dimensions();
    let band_top = (h as f64 * STAR_BAND_TOP) as u32;
    let band_height = h - band_top;

    let mut counts = StarCounts::default();
    for y in band_top..h {
        for x in w / 6..5 * w / 6 {
            let px = card.get_pixel(x, y);
            if brightness(px) <= STAR_MIN_BRIGHTNESS {
                continue;
            }
            counts.bright += 1;

            if px[0] > GOLD_MIN_R && px[1] > GOLD_MIN_G && px[2] < GOLD_MAX_B {
                counts.gold += 1;
            } else if px[0] > RED_STAR_MIN_R && px[1] < RED_STAR_MAX_G && px[2] < RED_STAR_MAX_B {
                counts.red += 1;
            } else if px[0] > PLATINUM_MIN && px[1] > PLATINUM_MIN && px[2] > PLATINUM_MIN {
                counts.platinum += 1;
            }
        }
    }

    let area = w as u64 * band_height as u64;
    let slot = |count: u64| -> i64 {
        let half_area = area / 2;
        if half_area == 0 {
            return 0;
        }
        ((count * BAND_WIDTH as u64) / half_area).min((BAND_WIDTH - 1) as u64) as i64
    };

    let rank = if counts.platinum > counts.gold && counts.platinum > counts.red {
        PLATINUM_BAND_START + slot(counts.platinum)
    } else if counts.red > counts.gold {
        RED_BAND_START + slot(counts.red)
    } else if counts.gold > 0 {
        GOLD_BAND_START + slot(counts.gold)
    } else if area > 0 {
        ((counts.bright * 15) / area) as i64
    } else {
        1
    };

    debug!(
        "Stars: bright={} gold={} red={} platinum={} -> rank {}",
        counts.bright, counts.gold, counts.red, counts.platinum, rank
    );
    clamp_rank(rank)
}

/// Badge icon color picks a tier; the level reported is that tier's midpoint
pub fn detect_badge_level(card: &RgbaImage, rarity: Rarity) -> u8 {
    let (w, h) = card.dimensions();
    let top = (h as f64 * BADGE_TOP) as u32;
    let bottom = (h as f64 * BADGE_BOTTOM) as u32;
    let left = (w as f64 * BADGE_LEFT) as u32;
    let right = (w as f64 * BADGE_RIGHT) as u32;

    let mut blue = 0u32;
    let mut purple = 0u32;
    let mut red = 0u32;

    for y in (top..bottom).step_by(BADGE_SAMPLE_STEP) {
        for x in (left..right).step_by(BADGE_SAMPLE_STEP) {
            let px = card.get_pixel(x, y);
            let (r, g, b) = (px[0], px[1], px[2]);
            if b > 150 && r < 100 && g < 150 {
                blue += 1;
            } else if r > 120 && b > 120 && g < 100 {
                purple += 1;
            } else if r > 150 && g < 80 && b < 80 {
                red += 1;
            }
        }
    }

    let max_badge = rarity.max_badge() as i64;
    let level = if red > BADGE_MIN_PIXELS {
        RED_BADGE_FIRST_LEVEL + (max_badge - RED_BADGE_FIRST_LEVEL) / 2
    } else if purple > BADGE_MIN_PIXELS {
        PURPLE_BADGE_LEVEL
    } else if blue > BADGE_MIN_PIXELS {
        BLUE_BADGE_LEVEL
    } else {
        1
    };

    debug!("Badge pixels: blue={} purple={} red={} -> {}", blue, purple, red, level);
    clamp_badge(level, rarity)
}

fn brightness(px: &Rgba<u8>) -> u32 {
    (px[0] as u32 + px[1] as u32 + px[2] as u32) / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    const DARK: Rgba<u8> = Rgba([40, 40, 60, 255]);
    const YELLOW: Rgba<u8> = Rgba([220, 180, 40, 255]);

    fn card(background: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(100, 100, background)
    }

    fn paint(img: &mut RgbaImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>, color: Rgba<u8>) {
        for y in ys {
            for x in xs.clone() {
                img.put_pixel(x, y, color);
            }
        }
    }

    #[test]
    fn test_rarity_from_background() {
        assert_eq!(detect_rarity(&card(YELLOW)), Rarity::Epic);
        assert_eq!(detect_rarity(&card(DARK)), Rarity::Legendary);
        assert_eq!(detect_rarity(&card(Rgba([200, 30, 30, 255]))), Rarity::Legendary);
    }

    #[test]
    fn test_rarity_by_average_without_yellow_samples() {
        // Blue channel too high for "yellow-ish", but averages still say gold
        assert_eq!(detect_rarity(&card(Rgba([200, 160, 120, 255]))), Rarity::Epic);
    }

    #[test]
    fn test_rank_gold_band() {
        let mut img = card(DARK);
        // 150 gold pixels: 150 * 5 / (100 * 15 / 2) = 1 -> rank 2
        paint(&mut img, 20..30, 85..100, Rgba([230, 200, 50, 255]));
        assert_eq!(detect_rank(&img), 2);
    }

    #[test]
    fn test_rank_red_band() {
        let mut img = card(DARK);
        paint(&mut img, 20..30, 85..100, Rgba([255, 99, 99, 255]));
        assert_eq!(detect_rank(&img), 7);
    }

    #[test]
    fn test_rank_platinum_band_saturates() {
        let mut img = card(DARK);
        paint(&mut img, 0..100, 85..100, Rgba([230, 230, 230, 255]));
        assert_eq!(detect_rank(&img), 15);
    }

    #[test]
    fn test_rank_fallback_on_uncolored_bright_pixels() {
        let mut img = card(DARK);
        // Bright but neither gold, red nor platinum: 1005 * 15 / 1500 = 10
        paint(&mut img, 0..100, 85..100, Rgba([255, 150, 150, 255]));
        assert_eq!(detect_rank(&img), 10);
    }

    #[test]
    fn test_rank_defaults_to_one_without_stars() {
        assert_eq!(detect_rank(&card(DARK)), 1);
    }

    #[test]
    fn test_badge_tiers() {
        let mut blue = card(DARK);
        paint(&mut blue, 5..20, 10..25, Rgba([30, 60, 220, 255]));
        assert_eq!(detect_badge_level(&blue, Rarity::Legendary), 5);

        let mut purple = card(DARK);
        paint(&mut purple, 5..20, 10..25, Rgba([160, 40, 160, 255]));
        assert_eq!(detect_badge_level(&purple, Rarity::Epic), 15);

        let mut red = card(DARK);
        paint(&mut red, 5..20, 10..25, Rgba([220, 30, 30, 255]));
        assert_eq!(detect_badge_level(&red, Rarity::Epic), 25);
        assert_eq!(detect_badge_level(&red, Rarity::Legendary), 30);

        assert_eq!(detect_badge_level(&card(DARK), Rarity::Epic), 1);
    }

    #[test]
    fn test_full_card() {
        let mut img = card(YELLOW);
        paint(&mut img, 5..20, 10..25, Rgba([160, 40, 160, 255]));
        let meta = detect_metadata(&img);
        assert_eq!(meta.rarity, Rarity::Epic);
        assert_eq!(meta.badge_level, 15);
        assert_eq!(meta.rank, 1);
    }

    #[test]
    fn test_degenerate_cards_stay_in_range() {
        for (w, h) in [(0, 0), (1, 1), (3, 2), (7, 40), (40, 3)] {
            let img = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
            let meta = detect_metadata(&img);
            assert!((1..=15).contains(&meta.rank), "{}x{}", w, h);
            assert!(meta.badge_level >= 1 && meta.badge_level <= meta.rarity.max_badge());
        }
    }
}
