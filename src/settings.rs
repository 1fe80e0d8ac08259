use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalizationMode {
    Mock,
    Live,
}

impl LocalizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalizationMode::Mock => "mock",
            LocalizationMode::Live => "live",
        }
    }
}

impl FromStr for LocalizationMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(LocalizationMode::Mock),
            "live" => Ok(LocalizationMode::Live),
            other => Err(anyhow!("unknown localization mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: String,
    pub uploads_dir: PathBuf,
    pub max_upload_mb: u64,
    pub max_jobs: usize,
    pub job_ttl_seconds: u64,
    pub analysis_max_long_edge_px: u32,
    pub mode: LocalizationMode,
    pub ocr_provider: String,
    pub ocr_api_key: Option<String>,
    pub ocr_api_endpoint: Option<String>,
    pub openai_api_key: Option<String>,
    pub translation_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            uploads_dir: PathBuf::from("tmp/uploads"),
            max_upload_mb: 20,
            max_jobs: 50,
            job_ttl_seconds: 7200,
            analysis_max_long_edge_px: 3072,
            mode: LocalizationMode::Mock,
            ocr_provider: "google".to_string(),
            ocr_api_key: None,
            ocr_api_endpoint: None,
            openai_api_key: None,
            translation_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl Settings {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    jobs: Option<JobsSettings>,
    analysis: Option<AnalysisSettings>,
    pipeline: Option<PipelineSettings>,
    providers: Option<ProviderSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    uploads_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JobsSettings {
    max_upload_mb: Option<u64>,
    max_jobs: Option<usize>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisSettings {
    max_long_edge_px: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSettings {
    mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSettings {
    ocr_provider: Option<String>,
    ocr_api_key: Option<String>,
    ocr_api_endpoint: Option<String>,
    openai_api_key: Option<String>,
    translation_model: Option<String>,
}

/// Loads settings: compiled-in defaults, then `settings.toml` and
/// `settings.local.toml` from the working directory, then the extra path,
/// then environment variables. Later sources win per key.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings
        .merge(parse_settings(DEFAULT_SETTINGS_TOML).context("invalid built-in settings")?)
        .context("invalid built-in settings")?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed = parse_settings(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }

    settings.apply_env_overrides()?;
    Ok(settings)
}

fn parse_settings(content: &str) -> Result<SettingsFile> {
    toml::from_str(content).map_err(Into::into)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.addr = addr;
                }
            }
            if let Some(dir) = server.uploads_dir {
                if !dir.trim().is_empty() {
                    self.uploads_dir = PathBuf::from(dir);
                }
            }
        }
        if let Some(jobs) = incoming.jobs {
            if let Some(mb) = jobs.max_upload_mb {
                if mb > 0 {
                    self.max_upload_mb = mb;
                }
            }
            if let Some(max) = jobs.max_jobs {
                if max > 0 {
                    self.max_jobs = max;
                }
            }
            if let Some(ttl) = jobs.ttl_seconds {
                if ttl > 0 {
                    self.job_ttl_seconds = ttl;
                }
            }
        }
        if let Some(analysis) = incoming.analysis {
            if let Some(px) = analysis.max_long_edge_px {
                if px > 0 {
                    self.analysis_max_long_edge_px = px;
                }
            }
        }
        if let Some(pipeline) = incoming.pipeline {
            if let Some(mode) = pipeline.mode {
                if !mode.trim().is_empty() {
                    self.mode = mode.parse()?;
                }
            }
        }
        if let Some(providers) = incoming.providers {
            if let Some(name) = providers.ocr_provider {
                if !name.trim().is_empty() {
                    self.ocr_provider = name;
                }
            }
            if let Some(key) = providers.ocr_api_key {
                if !key.trim().is_empty() {
                    self.ocr_api_key = Some(key);
                }
            }
            if let Some(endpoint) = providers.ocr_api_endpoint {
                if !endpoint.trim().is_empty() {
                    self.ocr_api_endpoint = Some(endpoint);
                }
            }
            if let Some(key) = providers.openai_api_key {
                if !key.trim().is_empty() {
                    self.openai_api_key = Some(key);
                }
            }
            if let Some(model) = providers.translation_model {
                if !model.trim().is_empty() {
                    self.translation_model = model;
                }
            }
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(mode) = env_string("LOCALIZATION_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(mb) = env_string("MAX_UPLOAD_MB") {
            self.max_upload_mb = mb
                .parse()
                .with_context(|| format!("invalid MAX_UPLOAD_MB: {}", mb))?;
        }
        if let Some(max) = env_string("MAX_JOBS") {
            self.max_jobs = max
                .parse()
                .with_context(|| format!("invalid MAX_JOBS: {}", max))?;
        }
        if let Some(ttl) = env_string("JOB_TTL_SECONDS") {
            self.job_ttl_seconds = ttl
                .parse()
                .with_context(|| format!("invalid JOB_TTL_SECONDS: {}", ttl))?;
        }
        if let Some(px) = env_string("ANALYSIS_MAX_LONG_EDGE_PX") {
            self.analysis_max_long_edge_px = px
                .parse()
                .with_context(|| format!("invalid ANALYSIS_MAX_LONG_EDGE_PX: {}", px))?;
        }
        if let Some(provider) = env_string("OCR_PROVIDER") {
            self.ocr_provider = provider;
        }
        if let Some(key) = env_string("OCR_API_KEY") {
            self.ocr_api_key = Some(key);
        }
        if let Some(endpoint) = env_string("OCR_API_ENDPOINT") {
            self.ocr_api_endpoint = Some(endpoint);
        }
        if let Some(key) = env_string("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(model) = env_string("TRANSLATION_MODEL") {
            self.translation_model = model;
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_builtin_file() {
        let mut settings = Settings::default();
        settings
            .merge(parse_settings(DEFAULT_SETTINGS_TOML).unwrap())
            .unwrap();
        assert_eq!(settings.addr, "127.0.0.1:8080");
        assert_eq!(settings.max_upload_mb, 20);
        assert_eq!(settings.max_jobs, 50);
        assert_eq!(settings.job_ttl_seconds, 7200);
        assert_eq!(settings.analysis_max_long_edge_px, 3072);
        assert_eq!(settings.mode, LocalizationMode::Mock);
        assert_eq!(settings.translation_model, "gpt-4o-mini");
        assert!(settings.ocr_api_key.is_none());
    }

    #[test]
    fn later_sections_override_earlier_ones() {
        let mut settings = Settings::default();
        settings
            .merge(
                parse_settings(
                    r#"
[jobs]
max_upload_mb = 5

[pipeline]
mode = "live"

[providers]
translation_model = "gpt-4o"
"#,
                )
                .unwrap(),
            )
            .unwrap();
        assert_eq!(settings.max_upload_mb, 5);
        assert_eq!(settings.mode, LocalizationMode::Live);
        assert_eq!(settings.translation_model, "gpt-4o");
        assert_eq!(settings.max_jobs, 50);
    }

    #[test]
    fn empty_values_do_not_override() {
        let mut settings = Settings::default();
        settings
            .merge(
                parse_settings(
                    r#"
[server]
addr = ""

[providers]
ocr_api_key = "  "
"#,
                )
                .unwrap(),
            )
            .unwrap();
        assert_eq!(settings.addr, "127.0.0.1:8080");
        assert!(settings.ocr_api_key.is_none());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let mut settings = Settings::default();
        let result = settings.merge(
            parse_settings(
                r#"
[pipeline]
mode = "hybrid"
"#,
            )
            .unwrap(),
        );
        assert!(result.is_err());
    }
}
