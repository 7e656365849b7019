//! OCR strategies backed by external tools.
//!
//! Recognition shells out to the `tesseract` CLI and scanned PDFs are
//! rasterized with `pdftoppm` (poppler-utils). Install:
//! - Linux: sudo apt-get install tesseract-ocr poppler-utils
//! - Mac: brew install tesseract poppler
//! - Windows: https://github.com/UB-Mannheim/tesseract/wiki

use image::{DynamicImage, GenericImageView, ImageOutputFormat, Rgb, RgbImage};
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use super::pdf_parser::join_pages;
use super::{ExtractionError, TextExtractor};
use crate::config::OcrConfig;
use crate::utils::normalize;

/// Turns one image into text.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractionError>;
}

/// Renders every page of a PDF to an image, in page order.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<DynamicImage>, ExtractionError>;
}

/// Tesseract invoked as a subprocess, image piped through stdin.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: String,
    language: String,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(config.tesseract_cmd.clone(), config.language.clone())
    }

    /// Check if tesseract can be started at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractionError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::OcrFailed(format!("Failed to encode image: {}", e)))?;

        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| unavailable(&self.command, e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExtractionError::OcrFailed("tesseract stdin not captured".to_string()))?;

        let output = thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(&png));
            let output = child.wait_with_output();
            // A broken pipe here means tesseract exited early; its stderr explains why.
            if let Ok(Err(e)) = writer.join() {
                debug!(error = %e, "Writing image to tesseract failed");
            }
            output
        })
        .map_err(|e| ExtractionError::OcrFailed(format!("tesseract did not complete: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_missing_language_data(&stderr) {
                return Err(ExtractionError::OcrUnavailable(format!(
                    "tesseract language data '{}' is not installed: {}",
                    self.language, stderr
                )));
            }
            return Err(ExtractionError::OcrFailed(format!(
                "tesseract exited with {}: {}",
                output.status, stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn is_missing_language_data(stderr: &str) -> bool {
    stderr.contains("Failed loading language") || stderr.contains("Error opening data file")
}

fn unavailable(command: &str, err: io::Error) -> ExtractionError {
    let hint = if err.kind() == io::ErrorKind::NotFound {
        "is not installed or not in PATH"
    } else {
        "could not be started"
    };
    ExtractionError::OcrUnavailable(format!("`{}` {}: {}", command, hint, err))
}

/// `pdftoppm` from poppler-utils, writing PNG pages into a temporary directory.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    command: String,
}

impl Pdftoppm {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl PageRasterizer for Pdftoppm {
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<DynamicImage>, ExtractionError> {
        let temp_dir = tempfile::tempdir()
            .map_err(|e| ExtractionError::OcrFailed(format!("Failed to create temp dir: {}", e)))?;

        let input = temp_dir.path().join("input.pdf");
        fs::write(&input, pdf)
            .map_err(|e| ExtractionError::OcrFailed(format!("Failed to stage PDF: {}", e)))?;

        info!(dpi, "Converting PDF to images...");
        let output = Command::new(&self.command)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(&input)
            .arg(temp_dir.path().join("page"))
            .output()
            .map_err(|e| unavailable(&self.command, e))?;

        if !output.status.success() {
            return Err(ExtractionError::OcrFailed(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pages = collect_page_images(temp_dir.path())?;
        info!("Rasterized {} pages", pages.len());
        Ok(pages)
    }
}

/// Load `page-N.png` files ordered by page number.
fn collect_page_images(dir: &Path) -> Result<Vec<DynamicImage>, ExtractionError> {
    let read_dir = fs::read_dir(dir)
        .map_err(|e| ExtractionError::OcrFailed(format!("Failed to list rendered pages: {}", e)))?;

    let mut numbered = Vec::new();
    for entry in read_dir.filter_map(|e| e.ok()) {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(number) = page_number(name) {
            numbered.push((number, path));
        }
    }
    numbered.sort_by_key(|(number, _)| *number);

    numbered
        .into_iter()
        .map(|(number, path)| {
            image::open(&path).map_err(|e| {
                ExtractionError::OcrFailed(format!("Failed to load rendered page {}: {}", number, e))
            })
        })
        .collect()
}

/// pdftoppm zero-pads page numbers depending on page count, so sort numerically.
fn page_number(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("page-")?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

/// Scanned PDF: rasterize pages, OCR each, join.
pub struct PdfOcrExtractor {
    rasterizer: Box<dyn PageRasterizer>,
    engine: Arc<dyn OcrEngine>,
    dpi: u32,
}

impl PdfOcrExtractor {
    pub fn new(rasterizer: Box<dyn PageRasterizer>, engine: Arc<dyn OcrEngine>, dpi: u32) -> Self {
        Self {
            rasterizer,
            engine,
            dpi,
        }
    }
}

impl TextExtractor for PdfOcrExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError> {
        let pages = self.rasterizer.rasterize(data, self.dpi)?;

        let mut texts = Vec::with_capacity(pages.len());
        for (idx, page) in pages.iter().enumerate() {
            info!("OCR processing page {}...", idx + 1);
            let text = self.engine.recognize(page)?;
            if text.trim().is_empty() {
                debug!(page = idx + 1, "No text recognized on page");
                continue;
            }
            texts.push(text);
        }

        info!("OCR completed: {} of {} pages produced text", texts.len(), pages.len());
        Ok(join_pages(&texts))
    }
}

/// Direct image upload: clean up the image, then OCR it.
pub struct ImageOcrExtractor {
    engine: Arc<dyn OcrEngine>,
    contrast_boost: f32,
}

impl ImageOcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, contrast_boost: f32) -> Self {
        Self {
            engine,
            contrast_boost,
        }
    }
}

impl TextExtractor for ImageOcrExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError> {
        let image = image::load_from_memory(data)
            .map_err(|e| ExtractionError::OcrFailed(format!("Failed to decode image: {}", e)))?;

        let (width, height) = image.dimensions();
        debug!(width, height, color = ?image.color(), "Decoded image");

        let prepared = prepare_for_ocr(image, self.contrast_boost);
        let text = self.engine.recognize(&prepared)?;
        if text.trim().is_empty() {
            warn!("OCR produced no text for image");
        }
        Ok(normalize(&text))
    }
}

/// Flatten transparency onto white and raise contrast.
///
/// Transparent regions otherwise reach the recognizer as black noise.
/// Palette images are expanded by the decoder, so checking alpha covers them too.
pub fn prepare_for_ocr(image: DynamicImage, contrast_boost: f32) -> DynamicImage {
    let flattened = if image.color().has_alpha() {
        DynamicImage::ImageRgb8(flatten_on_white(&image))
    } else {
        image
    };

    if contrast_boost == 0.0 {
        flattened
    } else {
        boost_contrast(flattened, contrast_boost)
    }
}

/// Scale each channel's distance from mid-grey by `1 + percent / 100`.
fn boost_contrast(image: DynamicImage, percent: f32) -> DynamicImage {
    let factor = 1.0 + percent / 100.0;
    let stretch = |c: u8| ((c as f32 - 128.0) * factor + 128.0).round().clamp(0.0, 255.0) as u8;

    match image {
        DynamicImage::ImageLuma8(mut gray) => {
            for pixel in gray.pixels_mut() {
                pixel.0[0] = stretch(pixel.0[0]);
            }
            DynamicImage::ImageLuma8(gray)
        }
        other => {
            let mut rgb = other.to_rgb8();
            for pixel in rgb.pixels_mut() {
                pixel.0 = pixel.0.map(stretch);
            }
            DynamicImage::ImageRgb8(rgb)
        }
    }
}

fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEngine {
        pages: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl OcrEngine for FixedEngine {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, ExtractionError> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.get(idx).copied().unwrap_or_default().to_string())
        }
    }

    struct BlankPages(usize);

    impl PageRasterizer for BlankPages {
        fn rasterize(&self, _pdf: &[u8], dpi: u32) -> Result<Vec<DynamicImage>, ExtractionError> {
            assert_eq!(dpi, 200);
            Ok((0..self.0).map(|_| DynamicImage::new_rgb8(4, 4)).collect())
        }
    }

    #[test]
    fn test_page_number_parsing() {
        assert_eq!(page_number("page-1.png"), Some(1));
        assert_eq!(page_number("page-012.png"), Some(12));
        assert_eq!(page_number("input.pdf"), None);
        assert_eq!(page_number("page-x.png"), None);
    }

    #[test]
    fn test_flatten_transparent_pixel_becomes_white() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 255]));

        let flat = flatten_on_white(&DynamicImage::ImageRgba8(img));
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_prepare_drops_alpha_channel() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(3, 3));
        let prepared = prepare_for_ocr(img, 15.0);
        assert!(!prepared.color().has_alpha());
    }

    #[test]
    fn test_contrast_boost_is_linear_percent() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([64])));
        let prepared = prepare_for_ocr(img, 15.0);
        // 128 - 64 * 1.15 = 54.4
        assert_eq!(prepared.to_luma8().get_pixel(0, 0).0, [54]);

        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([200, 128, 0])));
        let prepared = prepare_for_ocr(img, 15.0);
        assert_eq!(prepared.to_rgb8().get_pixel(0, 0).0, [211, 128, 0]);
    }

    #[test]
    fn test_zero_boost_leaves_pixels_alone() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([64])));
        assert_eq!(prepare_for_ocr(img, 0.0).to_luma8().get_pixel(0, 0).0, [64]);
    }

    #[test]
    fn test_pdf_ocr_joins_pages_in_order() {
        let engine = Arc::new(FixedEngine {
            pages: vec!["First   page", "  ", "Third page"],
            calls: AtomicUsize::new(0),
        });
        let extractor = PdfOcrExtractor::new(Box::new(BlankPages(3)), engine.clone(), 200);

        let text = extractor.extract(b"%PDF").unwrap();
        assert_eq!(text, "First page\n\nThird page");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_image_ocr_rejects_corrupt_image() {
        let engine = Arc::new(FixedEngine {
            pages: vec!["unused"],
            calls: AtomicUsize::new(0),
        });
        let extractor = ImageOcrExtractor::new(engine.clone(), 15.0);

        let err = extractor.extract(b"not an image").unwrap_err();
        assert!(matches!(err, ExtractionError::OcrFailed(_)));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_binary_reports_unavailable() {
        let engine = TesseractCli::new("definitely-not-tesseract-binary", "eng");
        assert!(!engine.is_available());

        let err = engine.recognize(&DynamicImage::new_rgb8(2, 2)).unwrap_err();
        assert!(matches!(err, ExtractionError::OcrUnavailable(_)));
    }

    #[test]
    fn test_missing_rasterizer_reports_unavailable() {
        let err = Pdftoppm::new("definitely-not-pdftoppm-binary")
            .rasterize(b"%PDF-1.4", 200)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::OcrUnavailable(_)));
    }
}
