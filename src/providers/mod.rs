use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

use crate::analysis::{BBoxNorm, OcrWord, TextRole};

mod inpaint;
mod openai;
mod retry;
mod vision;

pub use inpaint::StubInpainter;
pub use openai::{render_translation_prompt, OpenAiTranslator};
pub use vision::GoogleVision;

/// Words detected on one image, with the pixel dimensions they were
/// normalized against.
#[derive(Debug, Clone)]
pub struct OcrScan {
    pub words: Vec<OcrWord>,
    pub image_width: u32,
    pub image_height: u32,
}

/// One text region handed to the translator.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationRegion {
    pub text: String,
    pub role: TextRole,
    #[serde(rename = "boundingBox")]
    pub bbox: BBoxNorm,
}

/// Translator output, keyed back to the input by the original text.
#[derive(Debug, Clone)]
pub struct TranslatedRegion {
    pub original_text: String,
    pub translated_text: String,
}

pub type ClientFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

pub trait OcrClient: Send + Sync {
    fn recognize_text(&self, image: Vec<u8>) -> ClientFuture<OcrScan>;
}

pub trait TranslationClient: Send + Sync {
    fn translate_regions(
        &self,
        regions: Vec<TranslationRegion>,
        target_locale: String,
    ) -> ClientFuture<Vec<TranslatedRegion>>;
}

pub trait InpaintingClient: Send + Sync {
    fn inpaint_regions(&self, image: Vec<u8>, regions: Vec<BBoxNorm>) -> ClientFuture<Vec<u8>>;
}
