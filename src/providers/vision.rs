use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use super::retry::{is_rate_limited, retry_after, Backoff, RATE_LIMIT_MAX_RETRIES};
use super::{ClientFuture, OcrClient, OcrScan};
use crate::analysis::{
    geometry_from_bbox, geometry_from_quad, normalize_vertex_order, BBoxNorm, NormPoint, OcrWord,
};
use crate::imaging;

const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Cloud Vision `images:annotate` client in TEXT_DETECTION mode.
#[derive(Debug, Clone)]
pub struct GoogleVision {
    api_key: String,
    endpoint: String,
}

impl GoogleVision {
    pub fn new(api_key: impl Into<String>, endpoint: Option<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(anyhow!("OCR_API_KEY is required for live OCR mode"));
        }
        let endpoint = endpoint
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Ok(Self { api_key, endpoint })
    }

    async fn scan(self, image: Vec<u8>) -> Result<OcrScan> {
        let (image_width, image_height) = imaging::image_dimensions(&image)?;
        let body = json!({
            "requests": [
                {
                    "image": {"content": BASE64.encode(&image)},
                    "features": [{"type": "TEXT_DETECTION"}]
                }
            ]
        });
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut attempt = 0usize;
        let mut backoff = Backoff::new();
        loop {
            attempt += 1;
            let response = client.post(&url).json(&body).send().await.map_err(|err| {
                if err.is_timeout() {
                    anyhow!("OCR service timeout")
                } else {
                    anyhow!(err)
                }
            })?;

            let status = response.status();
            let retry_hint = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                let words = extract_words(&text, image_width, image_height)?;
                info!("ocr detected {} words", words.len());
                return Ok(OcrScan {
                    words,
                    image_width,
                    image_height,
                });
            }
            if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
                backoff.wait("Google Vision", attempt, retry_hint).await;
                continue;
            }
            return Err(anyhow!("OCR service returned error: {}", status.as_u16()));
        }
    }
}

impl OcrClient for GoogleVision {
    fn recognize_text(&self, image: Vec<u8>) -> ClientFuture<OcrScan> {
        let client = self.clone();
        Box::pin(async move { client.scan(image).await })
    }
}

fn extract_words(text: &str, image_width: u32, image_height: u32) -> Result<Vec<OcrWord>> {
    let payload: AnnotateResponse =
        serde_json::from_str(text).with_context(|| "failed to parse Vision response JSON")?;
    let mut words = Vec::new();
    let Some(first) = payload.responses.into_iter().next() else {
        return Ok(words);
    };

    for (index, annotation) in first.text_annotations.into_iter().enumerate() {
        // annotation 0 is the whole-image text summary
        if index == 0 || annotation.description.is_empty() {
            continue;
        }
        let Some(poly) = annotation.bounding_poly else {
            continue;
        };
        if poly.vertices.is_empty() {
            continue;
        }
        let points: Vec<NormPoint> = poly
            .vertices
            .iter()
            .map(|vertex| NormPoint {
                x: clamp_unit(vertex.x as f32 / image_width as f32),
                y: clamp_unit(vertex.y as f32 / image_height as f32),
            })
            .collect();

        let geometry = match normalize_vertex_order(&points) {
            Some(quad) => geometry_from_quad(quad),
            None => geometry_from_bbox(&points_bbox(&points)),
        };
        words.push(OcrWord {
            text: annotation.description,
            height: geometry.bbox.height(),
            geometry,
        });
    }
    Ok(words)
}

fn points_bbox(points: &[NormPoint]) -> BBoxNorm {
    let mut bbox = BBoxNorm {
        x1: f32::MAX,
        y1: f32::MAX,
        x2: f32::MIN,
        y2: f32::MIN,
    };
    for point in points {
        bbox.x1 = bbox.x1.min(point.x);
        bbox.y1 = bbox.y1.min(point.y);
        bbox.x2 = bbox.x2.max(point.x);
        bbox.y2 = bbox.y2.max(point.y);
    }
    bbox
}

fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResult {
    #[serde(default, rename = "textAnnotations")]
    text_annotations: Vec<TextAnnotation>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
    #[serde(rename = "boundingPoly")]
    bounding_poly: Option<BoundingPoly>,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

// Vision omits a coordinate entirely when it is zero.
#[derive(Debug, Default, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: i64,
    #[serde(default)]
    y: i64,
}
