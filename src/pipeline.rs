use anyhow::{Context, Result};
use image::RgbaImage;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use dcwc_capture::{decode_data_url, portrait_asset, AssetSource};
use dcwc_data::CharacterRoster;
use dcwc_state::{CardRecognitionResult, TextMatch};
use dcwc_vision::{
    slice_roster, RecognitionOrchestrator, TemplateCache, TemplateLibrary, TemplateMatcher, TextMatcher,
    TextRecognizer,
};

use crate::config::RecognitionConfig;

/// Progress sink for text recognition, in integer percent
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Where the per-screenshot text signal comes from
#[derive(Clone, Default)]
pub enum TextInput {
    /// Template matching only
    #[default]
    None,
    /// Text already extracted by the caller
    Recognized(String),
    /// Run an engine over the screenshot alongside template matching
    Engine {
        recognizer: Arc<dyn TextRecognizer>,
        progress: Option<ProgressFn>,
        cancel: Arc<AtomicBool>,
    },
}

/// Screenshot in, one result per card out.
/// Cheap to clone; clones share the roster and the template cache.
#[derive(Clone)]
pub struct RecognitionPipeline {
    config: Arc<RecognitionConfig>,
    roster: Arc<CharacterRoster>,
    templates: Arc<TemplateCache>,
    orchestrator: Arc<RecognitionOrchestrator>,
    text_matcher: TextMatcher,
}

impl RecognitionPipeline {
    pub fn new(config: RecognitionConfig, roster: CharacterRoster) -> Self {
        let orchestrator = RecognitionOrchestrator::new(
            TemplateMatcher::new(config.matching.clone()),
            config.merge.clone(),
        );
        Self {
            config: Arc::new(config),
            roster: Arc::new(roster),
            templates: Arc::new(TemplateCache::new()),
            orchestrator: Arc::new(orchestrator),
            text_matcher: TextMatcher::default(),
        }
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    pub fn roster(&self) -> &CharacterRoster {
        &self.roster
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    /// (Re)build the template library from `source` for every roster character
    /// and swap it in. Batches already running keep their old snapshot.
    pub async fn load_templates(&self, source: Arc<dyn AssetSource>) -> Result<usize> {
        let entries: Vec<(String, String)> = self
            .roster
            .iter()
            .map(|c| (c.id.clone(), portrait_asset(&c.portrait_file())))
            .collect();
        let strategy = self.config.matching.strategy;
        let library = tokio::task::spawn_blocking(move || {
            let library = TemplateLibrary::build_from_paths(source.as_ref(), &entries);
            library.precompute(strategy);
            library
        })
        .await
        .context("Template build task failed")?;

        let count = library.len();
        self.templates.replace(library);
        info!("Template cache ready: {} of {} characters", count, self.roster.len());
        Ok(count)
    }

    pub fn invalidate_templates(&self) {
        self.templates.invalidate();
    }

    /// Cut a screenshot into cards with the configured grid
    pub fn slice(&self, screenshot: &RgbaImage) -> Vec<RgbaImage> {
        slice_roster(screenshot, &self.config.slicer)
    }

    /// Decode a `data:` URL screenshot and recognize it
    pub async fn recognize_data_url(&self, data_url: &str, text: TextInput) -> Result<Vec<CardRecognitionResult>> {
        let screenshot = decode_data_url(data_url).context("Failed to decode screenshot")?;
        self.recognize(Arc::new(screenshot), text).await
    }

    /// Slice, match and merge one screenshot. Text recognition runs concurrently
    /// with card analysis; a failed or cancelled text pass just yields no text matches.
    pub async fn recognize(&self, screenshot: Arc<RgbaImage>, text: TextInput) -> Result<Vec<CardRecognitionResult>> {
        let library = self.templates.snapshot();
        if library.is_empty() {
            warn!("Template library is empty; only text can identify cards");
        }

        let orchestrator = self.orchestrator.clone();
        let slicer = self.config.slicer.clone();
        let shot = screenshot.clone();
        let cards_task = tokio::task::spawn_blocking(move || {
            let cards = slice_roster(&shot, &slicer);
            orchestrator.analyze(&cards, &library)
        });

        let (signals, text_matches) = tokio::join!(cards_task, self.text_matches(screenshot, text));
        let signals = signals.context("Card analysis task failed")?;

        debug!("{} cards analyzed, {} text candidates", signals.len(), text_matches.len());
        Ok(self.orchestrator.merge(&signals, &text_matches))
    }

    async fn text_matches(&self, screenshot: Arc<RgbaImage>, input: TextInput) -> Vec<TextMatch> {
        let text = match input {
            TextInput::None => return Vec::new(),
            TextInput::Recognized(text) => text,
            TextInput::Engine {
                recognizer,
                progress,
                cancel,
            } => {
                let task = tokio::task::spawn_blocking(move || {
                    let report = |pct: u8| {
                        if let Some(cb) = &progress {
                            cb(pct.min(100));
                        }
                    };
                    recognizer.recognize(&screenshot, &report, &cancel)
                });
                match task.await {
                    Ok(Ok(text)) => text,
                    Ok(Err(e)) => {
                        warn!("Text recognition skipped: {}", e);
                        return Vec::new();
                    }
                    Err(e) => {
                        warn!("Text recognition task failed: {}", e);
                        return Vec::new();
                    }
                }
            }
        };

        if text.trim().is_empty() {
            return Vec::new();
        }
        self.text_matcher.match_text(&text, &self.roster)
    }
}
