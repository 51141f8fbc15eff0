//! Generation requests and their validation.
//!
//! A [`GenerationRequest`] carries the named fields a story is built from.
//! Every field is optional: absent, `null`, or blank values resolve to the
//! defaults in [`defaults`] when the prompt is assembled.
//!
//! [`RequestValidator`] turns raw JSON into a request. Anything that is not a
//! JSON object is rejected; missing expected fields are either logged
//! ([`ValidationPolicy::Lenient`]) or rejected ([`ValidationPolicy::Strict`]).

use crate::error::{Result, StoryError};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Default placeholder text for fields the caller left out.
pub mod defaults {
    pub const STYLE: &str = "默认风格";
    pub const TITLE: &str = "未命名小说";
    pub const BACKGROUND: &str = "在一个遥远的世界...";
    pub const CHARACTER: &str = "一位年轻的冒险者...";
    pub const PLOT: &str = "他/她踏上了一段奇妙的旅程...";
    pub const OTHER_REQS: &str = "无";
}

/// Fields a complete request is expected to carry.
pub const EXPECTED_FIELDS: [&str; 5] = ["style", "title", "background", "character", "plot"];

/// Message returned when the body is not a JSON document.
pub const NOT_JSON_MESSAGE: &str = "请求必须是 JSON 格式";

/// Message returned when the body is JSON but not an object.
pub const NOT_OBJECT_MESSAGE: &str = "请求体必须是 JSON 对象";

/// A structured story request.
///
/// Text fields hold `None` when the caller omitted them (or sent blanks);
/// the accessors return the resolved value with defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub style: Option<String>,
    pub title: Option<String>,
    pub background: Option<String>,
    pub character: Option<String>,
    pub plot: Option<String>,
    pub other_reqs: Option<String>,
    /// Source text to continue from (only used when `is_continue` is set).
    pub continue_from: Option<String>,
    pub is_continue: bool,
}

impl GenerationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = non_blank(style.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = non_blank(title.into());
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = non_blank(background.into());
        self
    }

    pub fn with_character(mut self, character: impl Into<String>) -> Self {
        self.character = non_blank(character.into());
        self
    }

    pub fn with_plot(mut self, plot: impl Into<String>) -> Self {
        self.plot = non_blank(plot.into());
        self
    }

    pub fn with_other_reqs(mut self, other_reqs: impl Into<String>) -> Self {
        self.other_reqs = non_blank(other_reqs.into());
        self
    }

    /// Mark this as a continuation of `source`.
    pub fn continuing(mut self, source: impl Into<String>) -> Self {
        self.continue_from = non_blank(source.into());
        self.is_continue = true;
        self
    }

    pub fn style(&self) -> &str {
        self.style.as_deref().unwrap_or(defaults::STYLE)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(defaults::TITLE)
    }

    pub fn background(&self) -> &str {
        self.background.as_deref().unwrap_or(defaults::BACKGROUND)
    }

    pub fn character(&self) -> &str {
        self.character.as_deref().unwrap_or(defaults::CHARACTER)
    }

    pub fn plot(&self) -> &str {
        self.plot.as_deref().unwrap_or(defaults::PLOT)
    }

    pub fn other_reqs(&self) -> &str {
        self.other_reqs.as_deref().unwrap_or(defaults::OTHER_REQS)
    }

    /// The continuation source, if this request asks to extend existing text.
    ///
    /// Returns `Some` only when `is_continue` is set and the source is non-blank.
    pub fn continuation_source(&self) -> Option<&str> {
        if self.is_continue {
            self.continue_from.as_deref()
        } else {
            None
        }
    }

    /// Expected fields the caller did not supply.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present = [
            self.style.is_some(),
            self.title.is_some(),
            self.background.is_some(),
            self.character.is_some(),
            self.plot.is_some(),
        ];
        EXPECTED_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(field, _)| *field)
            .collect()
    }
}

/// What to do with a request that lacks expected fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Log the gap and fall through to prompt defaults.
    #[default]
    Lenient,
    /// Reject with [`StoryError::MissingFields`].
    Strict,
}

impl FromStr for ValidationPolicy {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(ValidationPolicy::Lenient),
            "strict" => Ok(ValidationPolicy::Strict),
            other => Err(StoryError::InvalidConfig(format!(
                "unknown validation policy '{}', expected 'lenient' or 'strict'",
                other
            ))),
        }
    }
}

/// Checks raw input and converts it into a [`GenerationRequest`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestValidator {
    policy: ValidationPolicy,
}

impl RequestValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Parse raw bytes as JSON, then [`validate`](Self::validate) them.
    pub fn validate_bytes(&self, raw: &[u8]) -> Result<GenerationRequest> {
        let value: Value = serde_json::from_slice(raw).map_err(|e| {
            tracing::warn!(error = %e, "request body is not valid JSON");
            StoryError::MalformedRequest(NOT_JSON_MESSAGE.to_string())
        })?;
        self.validate(&value)
    }

    /// Validate an already-parsed JSON value.
    pub fn validate(&self, raw: &Value) -> Result<GenerationRequest> {
        let map = raw.as_object().ok_or_else(|| {
            tracing::warn!(kind = json_kind(raw), "request body is not a JSON object");
            StoryError::MalformedRequest(NOT_OBJECT_MESSAGE.to_string())
        })?;

        let request = GenerationRequest {
            style: text_field(map, "style")?,
            title: text_field(map, "title")?,
            background: text_field(map, "background")?,
            character: text_field(map, "character")?,
            plot: text_field(map, "plot")?,
            other_reqs: text_field(map, "other_reqs")?,
            continue_from: text_field(map, "continue_from")?,
            is_continue: flag_field(map, "is_continue"),
        };

        let missing = request.missing_fields();
        if !missing.is_empty() && request.continuation_source().is_none() {
            match self.policy {
                ValidationPolicy::Lenient => {
                    tracing::warn!(missing = ?missing, "incomplete generation request, using defaults");
                }
                ValidationPolicy::Strict => {
                    tracing::warn!(
                        missing = ?missing,
                        style = request.style(),
                        title = request.title(),
                        "incomplete generation request rejected"
                    );
                    return Err(StoryError::MissingFields(missing));
                }
            }
        }

        Ok(request)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(non_blank(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(StoryError::MalformedRequest(format!(
            "字段 {} 必须是文本",
            key
        ))),
    }
}

fn flag_field(map: &Map<String, Value>, key: &str) -> bool {
    match map.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}
