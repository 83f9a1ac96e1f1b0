pub mod library;
pub mod matcher;
pub mod metadata;
pub mod orchestrator;
pub mod phash;
pub mod similarity;
pub mod slicer;
pub mod text_matcher;
pub mod text_reader;

pub use library::{portrait_hash, Template, TemplateCache, TemplateLibrary};
pub use matcher::{MatchConfig, TemplateMatcher};
pub use metadata::{detect_badge_level, detect_metadata, detect_rank, detect_rarity};
pub use orchestrator::{analyze_cards, merge_signals, CardSignals, MergeConfig, RecognitionOrchestrator};
pub use phash::PerceptualHash;
pub use similarity::{center_crop, Prepared, SimilarityStrategy, StrategyKind};
pub use slicer::{card_cells, slice_roster, CardCell, SliceConfig, SliceConfigError};
pub use text_matcher::TextMatcher;
pub use text_reader::{TesseractReader, TextRecognitionError, TextRecognizer};
