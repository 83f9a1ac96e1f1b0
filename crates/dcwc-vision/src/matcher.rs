use crate::library::{portrait_hash, Template, TemplateLibrary};
use crate::similarity::{SimilarityStrategy, StrategyKind};
use dcwc_state::MatchCandidate;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Template matching knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub strategy: StrategyKind,
    /// Stop scanning as soon as a template scores above this
    pub early_exit: f64,
    /// Pixel-compare only the `k` templates nearest by perceptual hash of
    /// the portrait region. `None` compares against every template.
    pub hash_prefilter: Option<usize>,
    /// Hard cap on pixel comparisons per card
    pub max_comparisons: Option<usize>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::CenterCrop,
            early_exit: 0.90,
            hash_prefilter: Some(12),
            max_comparisons: None,
        }
    }
}

/// Finds the template that best matches a card
pub struct TemplateMatcher {
    config: MatchConfig,
    strategy: Box<dyn SimilarityStrategy>,
}

impl TemplateMatcher {
    pub fn new(config: MatchConfig) -> Self {
        let strategy = config.strategy.build();
        Self { config, strategy }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Similarity between a card and one template under the configured strategy
    pub fn similarity(&self, card: &RgbaImage, template: &RgbaImage) -> f64 {
        self.strategy.similarity(card, template)
    }

    /// Best template for `card`. Ties keep the lexically first id.
    /// Returns the unknown sentinel for an empty library.
    pub fn match_best(&self, card: &RgbaImage, library: &TemplateLibrary) -> MatchCandidate {
        if library.is_empty() {
            return MatchCandidate::unknown();
        }

        let candidates = self.candidates(card, library);
        let prepared = self.strategy.prepare(card);

        let mut best: Option<(&Template, f64)> = None;
        for template in candidates {
            let score = self
                .strategy
                .compare(&prepared, template.prepared(self.config.strategy));
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((template, score));
            }
            if score > self.config.early_exit {
                debug!("Early exit on {} ({:.3})", template.id, score);
                break;
            }
        }

        match best {
            Some((template, score)) => {
                debug!("Best match: {} ({:.3}, {})", template.id, score, self.strategy.name());
                MatchCandidate::from_template(&template.id, score)
            }
            None => MatchCandidate::unknown(),
        }
    }

    /// Templates to pixel-compare, in lexical id order
    fn candidates<'a>(&self, card: &RgbaImage, library: &'a TemplateLibrary) -> Vec<&'a Template> {
        let mut candidates: Vec<&Template> = library.iter().collect();

        if let Some(k) = self.config.hash_prefilter {
            if candidates.len() > k {
                let card_hash = portrait_hash(card);
                // Stable sort keeps lexical order among equal distances
                candidates.sort_by_key(|t| card_hash.hamming_distance(&t.hash));
                candidates.truncate(k);
                candidates.sort_by(|a, b| a.id.cmp(&b.id));
            }
        }

        if let Some(cap) = self.config.max_comparisons {
            candidates.truncate(cap);
        }
        candidates
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(color: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(32, 32, Rgba([color[0], color[1], color[2], 255]))
    }

    /// Bright left half, dark right half
    fn split() -> RgbaImage {
        RgbaImage::from_fn(32, 32, |x, _| {
            if x < 16 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    fn library(entries: Vec<(&str, RgbaImage)>) -> TemplateLibrary {
        TemplateLibrary::from_images(entries.into_iter().map(|(id, img)| (id.to_string(), img)))
    }

    #[test]
    fn test_empty_library_is_unknown() {
        let matcher = TemplateMatcher::default();
        let result = matcher.match_best(&solid([1, 2, 3]), &TemplateLibrary::new());
        assert!(result.is_unknown());
        assert_eq!(result.similarity, 0.0);
    }

    #[test]
    fn test_finds_exact_template() {
        let lib = library(vec![
            ("aquaman", solid([0, 120, 160])),
            ("batman", solid([20, 20, 20])),
            ("superman", solid([0, 0, 220])),
        ]);
        let matcher = TemplateMatcher::default();
        let result = matcher.match_best(&solid([20, 20, 20]), &lib);
        assert_eq!(result.character_id, "batman");
        assert!((result.similarity - 1.0).abs() < 1e-9);
        assert_eq!(result.confidence, result.similarity);
    }

    #[test]
    fn test_early_exit_takes_first_lexical_hit() {
        // Both score above 0.90; the scan stops at the first
        let lib = library(vec![("zatanna", solid([100, 100, 100])), ("flash", solid([102, 100, 100]))]);
        let matcher = TemplateMatcher::default();
        let result = matcher.match_best(&solid([100, 100, 100]), &lib);
        assert_eq!(result.character_id, "flash");
    }

    #[test]
    fn test_ties_keep_first_id() {
        let config = MatchConfig {
            early_exit: 1.0,
            ..MatchConfig::default()
        };
        let lib = library(vec![("cyborg", solid([0, 0, 0])), ("aquaman", solid([0, 0, 0]))]);
        let result = TemplateMatcher::new(config).match_best(&solid([0, 0, 0]), &lib);
        assert_eq!(result.character_id, "aquaman");
    }

    #[test]
    fn test_prefilter_limits_pixel_scan() {
        let mut entries: Vec<(String, RgbaImage)> = (0..20)
            .map(|i| (format!("hero{:02}", i), solid([128, 128, 128])))
            .collect();
        entries.push(("target".to_string(), split()));
        let lib = TemplateLibrary::from_images(entries);

        // early_exit 0 stops at the first template compared
        let prefiltered = MatchConfig {
            hash_prefilter: Some(1),
            early_exit: 0.0,
            ..MatchConfig::default()
        };
        let result = TemplateMatcher::new(prefiltered).match_best(&split(), &lib);
        assert_eq!(result.character_id, "target");
        assert!((result.similarity - 1.0).abs() < 1e-9);

        let pixel_only = MatchConfig {
            hash_prefilter: None,
            early_exit: 0.0,
            ..MatchConfig::default()
        };
        let result = TemplateMatcher::new(pixel_only).match_best(&split(), &lib);
        assert_eq!(result.character_id, "hero00");
    }

    #[test]
    fn test_framed_card_keeps_its_portrait_through_prefilter() {
        const YELLOW: Rgba<u8> = Rgba([255, 220, 0, 255]);
        let in_frame = |x: u32, y: u32| !(8..32).contains(&x) || !(8..32).contains(&y);

        let target = RgbaImage::from_fn(40, 40, |x, _| {
            if x < 20 {
                Rgba([240, 240, 240, 255])
            } else {
                Rgba([10, 10, 10, 255])
            }
        });
        let mut card = target.clone();
        for (x, y, p) in card.enumerate_pixels_mut() {
            if in_frame(x, y) {
                *p = YELLOW;
            }
        }
        // Decoys share the card's frame but not its portrait
        let decoy = RgbaImage::from_fn(40, 40, |x, y| {
            if in_frame(x, y) {
                YELLOW
            } else {
                Rgba([0, 160, 0, 255])
            }
        });

        let mut entries: Vec<(String, RgbaImage)> =
            (0..12).map(|i| (format!("decoy{:02}", i), decoy.clone())).collect();
        entries.push(("target".to_string(), target));
        let lib = TemplateLibrary::from_images(entries);

        let matcher = TemplateMatcher::default();
        assert_eq!(matcher.config().hash_prefilter, Some(12));
        let result = matcher.match_best(&card, &lib);
        assert_eq!(result.character_id, "target");
        assert!((result.similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_match_uses_configured_strategy() {
        let config = MatchConfig {
            strategy: StrategyKind::NormalizedCrossCorrelation,
            ..MatchConfig::default()
        };
        let lib = library(vec![("flash", split()), ("batman", solid([20, 20, 20]))]);
        let result = TemplateMatcher::new(config).match_best(&split(), &lib);
        assert_eq!(result.character_id, "flash");
        assert!((result.similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_comparisons_caps_scan() {
        let lib = library(vec![
            ("aquaman", solid([255, 255, 255])),
            ("batman", solid([0, 0, 0])),
        ]);
        let config = MatchConfig {
            hash_prefilter: None,
            max_comparisons: Some(1),
            ..MatchConfig::default()
        };
        let result = TemplateMatcher::new(config).match_best(&solid([0, 0, 0]), &lib);
        // Only "aquaman" was compared
        assert_eq!(result.character_id, "aquaman");
        assert_eq!(result.similarity, 0.0);
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: MatchConfig = serde_json::from_str(r#"{"hash_prefilter": null}"#).unwrap();
        assert_eq!(config.hash_prefilter, None);
        assert_eq!(config.early_exit, 0.90);
        assert_eq!(config.strategy, StrategyKind::CenterCrop);
    }
}
