use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tera::{Context as TeraContext, Tera};
use tracing::info;

use super::retry::{is_rate_limited, retry_after, Backoff, RATE_LIMIT_MAX_RETRIES};
use super::{ClientFuture, TranslatedRegion, TranslationClient, TranslationRegion};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";
const PROMPT_TEMPLATE: &str = include_str!("prompts/translation_prompt.tera");
const SYSTEM_PROMPT: &str = "You are a professional translator specializing in marketing \
and promotional materials for film and TV. Translate text while preserving tone, style, \
and cultural context.";

/// Chat-completions translator. One request carries every region of the
/// poster so the model sees titles, taglines, and credits together.
#[derive(Debug, Clone)]
pub struct OpenAiTranslator {
    api_key: String,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(anyhow!(
                "OPENAI_API_KEY is required for live translation mode"
            ));
        }
        let model = model.into();
        let model = if model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            model
        };
        Ok(Self { api_key, model })
    }

    async fn translate(
        self,
        regions: Vec<TranslationRegion>,
        target_locale: String,
    ) -> Result<Vec<TranslatedRegion>> {
        let prompt = render_translation_prompt(&regions, &target_locale)?;
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.3,
            "response_format": {"type": "json_object"}
        });
        let url = format!("{}/chat/completions", base_url());
        let client = reqwest::Client::new();

        let mut attempt = 0usize;
        let mut backoff = Backoff::new();
        loop {
            attempt += 1;
            let response = client
                .post(&url)
                .bearer_auth(self.api_key.clone())
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let retry_hint = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                let translated = apply_translations(&text, &regions)?;
                info!("translated {} regions to {}", translated.len(), target_locale);
                return Ok(translated);
            }
            if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
                backoff.wait("OpenAI", attempt, retry_hint).await;
                continue;
            }
            return Err(anyhow!("OpenAI API error ({}): {}", status, text));
        }
    }
}

impl TranslationClient for OpenAiTranslator {
    fn translate_regions(
        &self,
        regions: Vec<TranslationRegion>,
        target_locale: String,
    ) -> ClientFuture<Vec<TranslatedRegion>> {
        let client = self.clone();
        Box::pin(async move { client.translate(regions, target_locale).await })
    }
}

fn base_url() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

pub fn render_translation_prompt(
    regions: &[TranslationRegion],
    target_locale: &str,
) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("locale_name", locale_display_name(target_locale));
    context.insert("target_locale", target_locale);
    context.insert(
        "regions_json",
        &serde_json::to_string_pretty(regions).context("failed to serialize regions")?,
    );
    Tera::one_off(PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render translation prompt")
}

fn locale_display_name(locale: &str) -> &str {
    match locale {
        "fr-FR" => "French (France)",
        "es-MX" => "Spanish (Mexico)",
        "pt-BR" => "Portuguese (Brazil)",
        "ja-JP" => "Japanese (Japan)",
        "de-DE" => "German (Germany)",
        "ko-KR" => "Korean (South Korea)",
        "ru-RU" => "Russian (Russia)",
        "vi-VN" => "Vietnamese (Vietnam)",
        other => other,
    }
}

/// Maps the model's translations back onto the input regions by exact
/// original text. Regions the model skipped keep their original text.
fn apply_translations(text: &str, regions: &[TranslationRegion]) -> Result<Vec<TranslatedRegion>> {
    let payload: ChatResponse =
        serde_json::from_str(text).with_context(|| "failed to parse OpenAI response JSON")?;
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow!("Empty response from translation API"))?;

    let parsed: TranslationPayload = serde_json::from_str(&content)
        .map_err(|_| anyhow!("Invalid response format from translation API"))?;
    let by_original: HashMap<&str, &str> = parsed
        .translations
        .iter()
        .map(|item| (item.original_text.as_str(), item.translated_text.as_str()))
        .collect();

    Ok(regions
        .iter()
        .map(|region| {
            let translated = by_original
                .get(region.text.as_str())
                .map(|value| (*value).to_string())
                .unwrap_or_else(|| region.text.clone());
            TranslatedRegion {
                original_text: region.text.clone(),
                translated_text: translated,
            }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranslationPayload {
    #[serde(default)]
    translations: Vec<TranslationItem>,
}

#[derive(Debug, Deserialize)]
struct TranslationItem {
    #[serde(default, rename = "originalText")]
    original_text: String,
    #[serde(default, rename = "translatedText")]
    translated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BBoxNorm, TextRole};

    fn region(text: &str, role: TextRole) -> TranslationRegion {
        TranslationRegion {
            text: text.to_string(),
            role,
            bbox: BBoxNorm {
                x1: 0.1,
                y1: 0.2,
                x2: 0.8,
                y2: 0.3,
            },
        }
    }

    #[test]
    fn translations_map_by_original_text_with_fallback() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/openai_chat_response.json"
        ));
        let regions = vec![
            region("THE GREAT HEIST", TextRole::Title),
            region("COMING SOON", TextRole::Tagline),
            region("www.greatheist.example", TextRole::Other),
        ];
        let translated = apply_translations(payload, &regions).unwrap();
        assert_eq!(translated.len(), 3);
        assert_eq!(translated[0].translated_text, "LE GRAND CASSE");
        assert_eq!(translated[1].translated_text, "PROCHAINEMENT");
        assert_eq!(translated[2].translated_text, "www.greatheist.example");
    }

    #[test]
    fn empty_content_is_an_error() {
        let payload = r#"{"choices": [{"message": {"content": ""}}]}"#;
        let err = apply_translations(payload, &[]).unwrap_err();
        assert!(err.to_string().contains("Empty response"));
    }

    #[test]
    fn non_json_content_is_an_error() {
        let payload = r#"{"choices": [{"message": {"content": "sure, here you go"}}]}"#;
        let err = apply_translations(payload, &[]).unwrap_err();
        assert!(err.to_string().contains("Invalid response format"));
    }

    #[test]
    fn unknown_locales_pass_through_the_display_name() {
        assert_eq!(locale_display_name("fr-FR"), "French (France)");
        assert_eq!(locale_display_name("xx-YY"), "xx-YY");
    }

    #[test]
    fn prompt_names_the_locale_and_embeds_the_regions() {
        let prompt =
            render_translation_prompt(&[region("COMING SOON", TextRole::Tagline)], "ja-JP")
                .unwrap();
        assert!(prompt.contains("Japanese (Japan) (ja-JP)"));
        assert!(prompt.contains("\"COMING SOON\""));
        assert!(prompt.contains("\"tagline\""));
    }
}
