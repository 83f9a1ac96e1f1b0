//! CLI tool to run a saved roster screenshot through the recognition pipeline.
//! Usage: cargo run --bin analyze_roster -- <screenshot.png> [data_dir] [output_dir] [--text <file>] [--ocr]

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use dcwc_assist::{init_tracing, RecognitionConfig, RecognitionPipeline, TextInput};
use dcwc_capture::{load_image, DirectorySource};
use dcwc_data::CharacterRoster;
use dcwc_vision::{card_cells, TesseractReader, TextRecognizer};

struct Args {
    screenshot: PathBuf,
    data_dir: PathBuf,
    output_dir: PathBuf,
    text_file: Option<PathBuf>,
    ocr: bool,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut text_file = None;
    let mut ocr = false;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--text" => {
                let path = iter.next().context("--text needs a file argument")?;
                text_file = Some(PathBuf::from(path));
            }
            "--ocr" => ocr = true,
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    let Some(screenshot) = positional.next() else {
        bail!("Usage: analyze_roster <screenshot.png> [data_dir] [output_dir] [--text <file>] [--ocr]");
    };

    Ok(Args {
        screenshot,
        data_dir: positional.next().unwrap_or_else(|| PathBuf::from("./data")),
        output_dir: positional.next().unwrap_or_else(|| PathBuf::from("./debug_output")),
        text_file,
        ocr,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = parse_args()?;

    let config = RecognitionConfig::load(&args.data_dir.join("config.json"))?;
    let roster = CharacterRoster::load(&args.data_dir)?;
    println!("Roster: {} characters", roster.len());

    let pipeline = RecognitionPipeline::new(config, roster);
    let loaded = pipeline
        .load_templates(Arc::new(DirectorySource::new(&args.data_dir)))
        .await?;
    println!("Templates: {} portraits", loaded);

    println!("Loading image: {}", args.screenshot.display());
    let img = load_image(&args.screenshot)
        .with_context(|| format!("Failed to open {}", args.screenshot.display()))?;
    let (w, h) = img.dimensions();
    println!("Image size: {}x{}", w, h);

    // Save each card crop for inspection
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let cells = card_cells(w, h, &pipeline.config().slicer);
    println!("\n=== Grid ===");
    for (i, (cell, card)) in cells.iter().zip(pipeline.slice(&img)).enumerate() {
        println!(
            "  Card {:2} [r{} c{}]: x={} y={} {}x{}",
            i, cell.row, cell.col, cell.rect.x, cell.rect.y, cell.rect.width, cell.rect.height
        );
        let path = args.output_dir.join(format!("card_{:02}.png", i));
        if let Err(e) = card.save(&path) {
            eprintln!("  Failed to save {}: {}", path.display(), e);
        }
    }

    let text = if let Some(path) = &args.text_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        TextInput::Recognized(content)
    } else if args.ocr {
        let reader = TesseractReader::new();
        if !reader.is_available() {
            println!("Tesseract not available, continuing without text");
            TextInput::None
        } else {
            TextInput::Engine {
                recognizer: Arc::new(reader),
                progress: Some(Arc::new(|p: u8| println!("  OCR {}%", p))),
                cancel: Arc::new(AtomicBool::new(false)),
            }
        }
    } else {
        TextInput::None
    };

    let results = pipeline.recognize(Arc::new(img), text).await?;

    println!("\n=== Recognition ===");
    for r in &results {
        let name = pipeline
            .roster()
            .get(&r.character_id)
            .map(|c| c.name.as_str())
            .unwrap_or("Unknown");
        println!(
            "  Card {:2}: {:<16} source={:?} sim={:.3} conf={:.3} {:?} rank={} badge={}",
            r.index,
            name,
            r.source,
            r.similarity,
            r.confidence,
            r.metadata.rarity,
            r.metadata.rank,
            r.metadata.badge_level,
        );
    }

    let identified = results.iter().filter(|r| !r.is_unknown()).count();
    println!("\n{} of {} cards identified", identified, results.len());
    println!("Card crops saved to: {}", args.output_dir.display());
    Ok(())
}
