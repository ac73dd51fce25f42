use std::env;

const DEFAULT_BUCKET: &str = "leenhan-figma";
const DEFAULT_REGION: &str = "ap-northeast-2";

/// Default (and maximum) output bounds
pub const MAX_WIDTH: u32 = 1500;
pub const MAX_HEIGHT: u32 = 1500;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "heic"];

/// Output quality used when re-encoding (engine default)
const OUTPUT_QUALITY: u8 = 80;

/// Quality hint for the intermediate HEIC -> JPEG conversion, on a 0..=1 scale
const HEIC_QUALITY: f32 = 1.0;

/// Deploy-time configuration for the resizer.
///
/// Lambda@Edge functions cannot read environment variables, so the defaults
/// are what actually runs at the edge. `from_env` exists for regional
/// deployments and local runs.
#[derive(Debug, Clone)]
pub struct ResizerConfig {
    pub bucket: String,
    pub region: String,
    pub max_width: u32,
    pub max_height: u32,
    pub allowed_extensions: Vec<String>,
    pub jpeg_quality: u8,
    pub webp_quality: f32,
    pub heic_quality: f32,
}

impl Default for ResizerConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            max_width: MAX_WIDTH,
            max_height: MAX_HEIGHT,
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            jpeg_quality: OUTPUT_QUALITY,
            webp_quality: OUTPUT_QUALITY as f32,
            heic_quality: HEIC_QUALITY,
        }
    }
}

impl ResizerConfig {
    /// Build config from env vars, falling back to the built-in defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bucket: env::var("IMAGE_BUCKET").unwrap_or_else(|_| defaults.bucket.clone()),
            region: env::var("IMAGE_REGION").unwrap_or_else(|_| defaults.region.clone()),
            max_width: bound_from_env("MAX_WIDTH", defaults.max_width),
            max_height: bound_from_env("MAX_HEIGHT", defaults.max_height),
            ..defaults
        }
    }

    pub fn is_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions.iter().any(|e| e == extension)
    }
}

fn bound_from_env(name: &str, default: u32) -> u32 {
    match env::var(name) {
        Ok(raw) => parse_bound(&raw).unwrap_or_else(|| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn parse_bound(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|v| *v > 0)
}
