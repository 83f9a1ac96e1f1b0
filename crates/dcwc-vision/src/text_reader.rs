use image::{GrayImage, Luma, RgbaImage};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Contrast gain applied around mid-grey before recognition
const OCR_CONTRAST: f32 = 1.5;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

// The tesseract CLI prints no progress, so the run is reported in stages
// with an estimate while the process works.
const PROGRESS_INPUT_WRITTEN: u8 = 10;
const PROGRESS_ENGINE_STARTED: u8 = 20;
const PROGRESS_ENGINE_CEILING: u8 = 90;
const PROGRESS_OUTPUT_READ: u8 = 95;
/// Elapsed time at which the estimate is halfway between start and ceiling
const TYPICAL_RUN: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum TextRecognitionError {
    #[error("text recognition engine is not available")]
    Unavailable,
    #[error("text recognition was cancelled")]
    Cancelled,
    #[error("text recognition engine failed: {0}")]
    Engine(String),
    #[error("no text recognized")]
    Empty,
    #[error("text recognition I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a screenshot into raw text. Blocking; run it off the async runtime.
pub trait TextRecognizer: Send + Sync {
    /// `progress` receives integer percentages in 0..=100.
    /// Implementations check `cancel` and stop early when it is set.
    fn recognize(
        &self,
        image: &RgbaImage,
        progress: &dyn Fn(u8),
        cancel: &AtomicBool,
    ) -> Result<String, TextRecognitionError>;

    fn is_available(&self) -> bool;
}

/// Runs the `tesseract` command-line engine.
/// Reports unavailable when the binary is not installed.
pub struct TesseractReader {
    tesseract_available: bool,
    temp_dir: PathBuf,
}

impl TesseractReader {
    pub fn new() -> Self {
        let tesseract_available = check_tesseract();
        if tesseract_available {
            debug!("Tesseract OCR available");
        } else {
            warn!("Tesseract not found. Text fallback disabled.");
        }

        let temp_dir = std::env::temp_dir().join("dcwc_ocr");
        if let Err(e) = std::fs::create_dir_all(&temp_dir) {
            warn!("Failed to create OCR temp dir {}: {}", temp_dir.display(), e);
        }

        Self {
            tesseract_available,
            temp_dir,
        }
    }

    fn scratch_base(&self) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        self.temp_dir.join(format!("ocr_{}_{}", std::process::id(), n))
    }
}

impl Default for TesseractReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer for TesseractReader {
    fn recognize(
        &self,
        image: &RgbaImage,
        progress: &dyn Fn(u8),
        cancel: &AtomicBool,
    ) -> Result<String, TextRecognitionError> {
        if !self.tesseract_available {
            return Err(TextRecognitionError::Unavailable);
        }
        if cancel.load(Ordering::Relaxed) {
            return Err(TextRecognitionError::Cancelled);
        }
        progress(0);

        let base = self.scratch_base();
        let input = base.with_extension("png");
        let output = base.with_extension("txt");

        preprocess_for_ocr(image)
            .save(&input)
            .map_err(|e| TextRecognitionError::Engine(format!("failed to write OCR input: {}", e)))?;
        progress(PROGRESS_INPUT_WRITTEN);

        let result = run_tesseract(&input, &base, &output, progress, cancel);
        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);

        let text = result?;
        progress(100);

        if text.trim().is_empty() {
            return Err(TextRecognitionError::Empty);
        }
        debug!("OCR extracted {} chars", text.len());
        Ok(text)
    }

    fn is_available(&self) -> bool {
        self.tesseract_available
    }
}

/// Run Tesseract (block layout) writing `<base>.txt`, killing it if `cancel` is raised
fn run_tesseract(
    input: &Path,
    base: &Path,
    output: &Path,
    progress: &dyn Fn(u8),
    cancel: &AtomicBool,
) -> Result<String, TextRecognitionError> {
    let mut child = Command::new("tesseract")
        .arg(input)
        .arg(base)
        .arg("--psm")
        .arg("6")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    progress(PROGRESS_ENGINE_STARTED);

    let started = Instant::now();
    let mut reported = PROGRESS_ENGINE_STARTED;
    let status = loop {
        if cancel.load(Ordering::Relaxed) {
            kill(&mut child);
            return Err(TextRecognitionError::Cancelled);
        }
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                let estimate = running_progress(started.elapsed());
                if estimate > reported {
                    reported = estimate;
                    progress(estimate);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    };

    if !status.success() {
        return Err(TextRecognitionError::Engine(format!("tesseract exited with {}", status)));
    }
    let text = std::fs::read_to_string(output)?;
    progress(PROGRESS_OUTPUT_READ);
    Ok(text)
}

/// Estimated percent while tesseract runs: rises from the start stage towards
/// the ceiling and never reaches it
fn running_progress(elapsed: Duration) -> u8 {
    let t = elapsed.as_secs_f64();
    let fraction = t / (t + TYPICAL_RUN.as_secs_f64());
    let span = (PROGRESS_ENGINE_CEILING - PROGRESS_ENGINE_STARTED) as f64;
    let pct = PROGRESS_ENGINE_STARTED as f64 + span * fraction;
    (pct.floor() as u8).min(PROGRESS_ENGINE_CEILING - 1)
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Failed to kill tesseract: {}", e);
    }
    let _ = child.wait();
}

/// Grayscale (channel average) with contrast stretched around 128
pub fn preprocess_for_ocr(image: &RgbaImage) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let p = image.get_pixel(x, y);
        let avg = (p[0] as f32 + p[1] as f32 + p[2] as f32) / 3.0;
        let adjusted = (avg - 128.0) * OCR_CONTRAST + 128.0;
        Luma([adjusted.round().clamp(0.0, 255.0) as u8])
    })
}

/// Check if Tesseract is installed and accessible
fn check_tesseract() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
