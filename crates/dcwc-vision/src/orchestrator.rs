use crate::library::TemplateLibrary;
use crate::matcher::TemplateMatcher;
use crate::metadata::detect_metadata;
use dcwc_state::{CardMetadata, CardRecognitionResult, MatchCandidate, MatchSource, TextMatch};
use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Thresholds for combining template and text signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Template matches at or above this are trusted outright
    pub reliable_similarity: f64,
    /// Text candidates below this are never assigned to a card
    pub min_text_confidence: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            reliable_similarity: 0.60,
            min_text_confidence: 0.70,
        }
    }
}

/// Everything read off one card before merging
#[derive(Debug, Clone, PartialEq)]
pub struct CardSignals {
    pub metadata: CardMetadata,
    pub template: MatchCandidate,
}

/// Detect metadata and best template for one card
pub fn analyze_card(card: &RgbaImage, library: &TemplateLibrary, matcher: &TemplateMatcher) -> CardSignals {
    CardSignals {
        metadata: detect_metadata(card),
        template: matcher.match_best(card, library),
    }
}

/// Per-card signals, computed in parallel, in input order
pub fn analyze_cards(
    cards: &[RgbaImage],
    library: &TemplateLibrary,
    matcher: &TemplateMatcher,
) -> Vec<CardSignals> {
    cards
        .par_iter()
        .map(|card| analyze_card(card, library, matcher))
        .collect()
}

/// Decide each card's identity.
///
/// A template match at or above `reliable_similarity` wins. Otherwise the card
/// takes the most confident text candidate at or above `min_text_confidence`
/// that no other card has claimed; its rank/badge replace the detected ones.
/// Anything else is unknown.
pub fn merge_signals(
    signals: &[CardSignals],
    text: &[TextMatch],
    config: &MergeConfig,
) -> Vec<CardRecognitionResult> {
    let mut claimed: HashSet<&str> = signals
        .iter()
        .filter(|s| is_reliable(&s.template, config))
        .map(|s| s.template.character_id.as_str())
        .collect();

    let mut ranked: Vec<&TextMatch> = text
        .iter()
        .filter(|t| t.candidate.confidence >= config.min_text_confidence)
        .collect();
    ranked.sort_by(|a, b| b.candidate.confidence.total_cmp(&a.candidate.confidence));

    signals
        .iter()
        .enumerate()
        .map(|(index, s)| {
            if is_reliable(&s.template, config) {
                return CardRecognitionResult {
                    index,
                    character_id: s.template.character_id.clone(),
                    similarity: s.template.similarity,
                    confidence: s.template.similarity,
                    source: MatchSource::Template,
                    metadata: s.metadata,
                };
            }

            let pick = ranked
                .iter()
                .find(|t| !claimed.contains(t.candidate.character_id.as_str()));
            match pick {
                Some(t) => {
                    claimed.insert(t.candidate.character_id.as_str());
                    debug!(
                        "Card {}: text fallback {} ({:.2}), template was {:.3}",
                        index, t.candidate.character_id, t.candidate.confidence, s.template.similarity
                    );
                    CardRecognitionResult {
                        index,
                        character_id: t.candidate.character_id.clone(),
                        similarity: s.template.similarity,
                        confidence: t.candidate.confidence,
                        source: MatchSource::Text,
                        metadata: s.metadata.with_overrides(t.rank, t.badge_level),
                    }
                }
                None => {
                    debug!("Card {}: no confident match (best template {:.3})", index, s.template.similarity);
                    CardRecognitionResult::unknown(index, s.metadata)
                }
            }
        })
        .collect()
}

fn is_reliable(template: &MatchCandidate, config: &MergeConfig) -> bool {
    !template.is_unknown() && template.similarity >= config.reliable_similarity
}

/// Runs per-card analysis and merging for one screenshot's cards
pub struct RecognitionOrchestrator {
    matcher: TemplateMatcher,
    merge: MergeConfig,
}

impl RecognitionOrchestrator {
    pub fn new(matcher: TemplateMatcher, merge: MergeConfig) -> Self {
        Self { matcher, merge }
    }

    pub fn matcher(&self) -> &TemplateMatcher {
        &self.matcher
    }

    pub fn merge_config(&self) -> &MergeConfig {
        &self.merge
    }

    /// Per-card template and metadata signals only
    pub fn analyze(&self, cards: &[RgbaImage], library: &TemplateLibrary) -> Vec<CardSignals> {
        analyze_cards(cards, library, &self.matcher)
    }

    /// Merge already computed signals with text candidates
    pub fn merge(&self, signals: &[CardSignals], text: &[TextMatch]) -> Vec<CardRecognitionResult> {
        let results = merge_signals(signals, text, &self.merge);
        let identified = results.iter().filter(|r| !r.is_unknown()).count();
        let by_text = results.iter().filter(|r| r.source == MatchSource::Text).count();
        info!(
            "Recognized {} of {} cards ({} via text, {} templates)",
            identified,
            results.len(),
            by_text,
            signals.len()
        );
        results
    }

    pub fn process(
        &self,
        cards: &[RgbaImage],
        library: &TemplateLibrary,
        text: &[TextMatch],
    ) -> Vec<CardRecognitionResult> {
        let signals = self.analyze(cards, library);
        self.merge(&signals, text)
    }
}

impl Default for RecognitionOrchestrator {
    fn default() -> Self {
        Self::new(TemplateMatcher::default(), MergeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcwc_data::Rarity;
    use image::Rgba;

    fn signals(id: &str, similarity: f64) -> CardSignals {
        CardSignals {
            metadata: CardMetadata::new(Rarity::Legendary, 3, 4),
            template: if id.is_empty() {
                MatchCandidate::unknown()
            } else {
                MatchCandidate::from_template(id, similarity)
            },
        }
    }

    fn text(id: &str, confidence: f64, rank: Option<u8>, badge: Option<u8>) -> TextMatch {
        TextMatch {
            candidate: MatchCandidate::from_text(id, confidence),
            character_name: id.to_string(),
            rank,
            badge_level: badge,
            line: id.to_string(),
        }
    }

    #[test]
    fn test_weak_template_without_text_is_unknown() {
        let results = merge_signals(&[signals("batman", 0.55)], &[], &MergeConfig::default());
        assert_eq!(results.len(), 1);
        assert!(results[0].is_unknown());
        assert_eq!(results[0].source, MatchSource::None);
        assert_eq!(results[0].similarity, 0.0);
        assert_eq!(results[0].confidence, 0.0);
        assert_eq!(results[0].metadata.rank, 3);
    }

    #[test]
    fn test_template_at_threshold_wins() {
        let results = merge_signals(
            &[signals("batman", 0.60)],
            &[text("superman", 1.0, None, None)],
            &MergeConfig::default(),
        );
        assert_eq!(results[0].character_id, "batman");
        assert_eq!(results[0].source, MatchSource::Template);
        assert_eq!(results[0].confidence, 0.60);
    }

    #[test]
    fn test_text_fallback_skips_claimed_ids() {
        let cards = [signals("batman", 0.95), signals("flash", 0.30), signals("", 0.0)];
        let texts = [
            text("batman", 1.0, Some(10), None),
            text("aquaman", 0.71, Some(12), Some(50)),
            text("cyborg", 0.5, None, None),
        ];
        let results = merge_signals(&cards, &texts, &MergeConfig::default());

        assert_eq!(results[0].character_id, "batman");
        assert_eq!(results[0].source, MatchSource::Template);

        assert_eq!(results[1].character_id, "aquaman");
        assert_eq!(results[1].source, MatchSource::Text);
        assert_eq!(results[1].similarity, 0.30);
        assert_eq!(results[1].confidence, 0.71);
        assert_eq!(results[1].metadata.rank, 12);
        // Legendary badge is capped at 40
        assert_eq!(results[1].metadata.badge_level, 40);

        // cyborg is below the text floor; aquaman is taken
        assert!(results[2].is_unknown());
        assert_eq!(results.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_orchestrator_end_to_end() {
        let red = RgbaImage::from_pixel(40, 40, Rgba([200, 20, 20, 255]));
        let blue = RgbaImage::from_pixel(40, 40, Rgba([20, 20, 200, 255]));
        let library = TemplateLibrary::from_images(vec![
            ("batman".to_string(), red.clone()),
            ("superman".to_string(), blue.clone()),
        ]);

        let orchestrator = RecognitionOrchestrator::default();
        let results = orchestrator.process(&[blue, red], &library, &[]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].character_id, "superman");
        assert_eq!(results[1].character_id, "batman");
        assert!(results.iter().all(|r| r.source == MatchSource::Template));
    }

    #[test]
    fn test_empty_library_falls_back_to_text() {
        let card = RgbaImage::from_pixel(40, 40, Rgba([10, 10, 10, 255]));
        let orchestrator = RecognitionOrchestrator::default();
        let results = orchestrator.process(
            &[card],
            &TemplateLibrary::new(),
            &[text("cyborg", 0.9, Some(2), None)],
        );
        assert_eq!(results[0].character_id, "cyborg");
        assert_eq!(results[0].similarity, 0.0);
        assert_eq!(results[0].metadata.rank, 2);
    }
}
