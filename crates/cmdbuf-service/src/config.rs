use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for env var {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Decoder capabilities and limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Accept ES3-only commands and enum values. When off they decode as unknown commands.
    pub unsafe_es3_apis_enabled: bool,
    /// Let `Bind*` create objects for client ids that were never generated.
    pub bind_generates_resource: bool,
    pub max_vertex_attribs: u32,
    pub max_texture_units: u32,
    pub max_draw_buffers: u32,
    pub max_renderbuffer_size: u32,
    pub max_texture_size: u32,
    /// Largest size `SetBucketSize` may request, in bytes.
    pub max_bucket_size: u32,
    /// Reported by `GetString(GL_EXTENSIONS)`.
    pub extensions: Vec<String>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            unsafe_es3_apis_enabled: false,
            bind_generates_resource: true,
            max_vertex_attribs: 16,
            max_texture_units: 16,
            max_draw_buffers: 8,
            max_renderbuffer_size: 4096,
            max_texture_size: 4096,
            max_bucket_size: 16 << 20,
            extensions: vec![
                "GL_CHROMIUM_trace_marker".to_owned(),
                "GL_EXT_debug_marker".to_owned(),
                "GL_EXT_draw_buffers".to_owned(),
                "GL_EXT_occlusion_query_boolean".to_owned(),
                "GL_OES_vertex_array_object".to_owned(),
            ],
        }
    }
}

impl DecoderConfig {
    /// Reads overrides from `CMDBUF_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(v) = parse_bool(&lookup, "CMDBUF_UNSAFE_ES3_APIS")? {
            cfg.unsafe_es3_apis_enabled = v;
        }
        if let Some(v) = parse_bool(&lookup, "CMDBUF_BIND_GENERATES_RESOURCE")? {
            cfg.bind_generates_resource = v;
        }
        if let Some(v) = parse_u32(&lookup, "CMDBUF_MAX_VERTEX_ATTRIBS")? {
            cfg.max_vertex_attribs = v;
        }
        if let Some(v) = parse_u32(&lookup, "CMDBUF_MAX_TEXTURE_UNITS")? {
            cfg.max_texture_units = v;
        }
        if let Some(v) = parse_u32(&lookup, "CMDBUF_MAX_DRAW_BUFFERS")? {
            cfg.max_draw_buffers = v;
        }
        if let Some(v) = parse_u32(&lookup, "CMDBUF_MAX_RENDERBUFFER_SIZE")? {
            cfg.max_renderbuffer_size = v;
        }
        if let Some(v) = parse_u32(&lookup, "CMDBUF_MAX_TEXTURE_SIZE")? {
            cfg.max_texture_size = v;
        }
        if let Some(v) = parse_u32(&lookup, "CMDBUF_MAX_BUCKET_SIZE")? {
            cfg.max_bucket_size = v;
        }
        if let Some(raw) = lookup("CMDBUF_EXTENSIONS") {
            cfg.extensions = raw
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        Ok(cfg)
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidEnv { var, value: raw }),
    }
}

fn parse_u32(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u32>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(Some(v)),
        _ => Err(ConfigError::InvalidEnv { var, value: raw }),
    }
}
