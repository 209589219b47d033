//! The render job record exchanged with the queue.
//!
//! On the wire a job is a flat JSON object using the queue's camelCase field
//! names (`browserWidth`, `clipX`, ...). In Rust the geometry is grouped into
//! [`Viewport`], [`ClipRect`] and [`ScrollOffset`].

use serde::{Deserialize, Serialize};

use crate::Result;

/// Browser viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(rename = "browserWidth")]
    pub width: u32,
    #[serde(rename = "browserHeight")]
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Region of the page that ends up in the captured image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRect {
    #[serde(rename = "clipX")]
    pub x: f64,
    #[serde(rename = "clipY")]
    pub y: f64,
    #[serde(rename = "clipWidth")]
    pub width: f64,
    #[serde(rename = "clipHeight")]
    pub height: f64,
}

/// Page scroll position applied right before capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollOffset {
    #[serde(rename = "scrollX")]
    pub x: f64,
    #[serde(rename = "scrollY")]
    pub y: f64,
}

/// A unit of rendering work.
///
/// Every input field is expected to be present and validated by the producer.
/// `image` is the only field the renderer writes, and only once, on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Opaque identifier owned by the queue
    #[serde(default)]
    pub id: String,
    /// Source URL of the document; subresources are resolved against it
    pub url: String,
    /// Raw HTML to render
    pub html: String,
    #[serde(flatten)]
    pub viewport: Viewport,
    #[serde(flatten)]
    pub clip: ClipRect,
    #[serde(flatten)]
    pub scroll: ScrollOffset,
    pub user_agent: String,
    /// Base64-encoded PNG, absent until the job is rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

impl Job {
    /// Build a job whose clip rectangle covers the whole viewport.
    pub fn new(id: impl Into<String>, url: impl Into<String>, html: impl Into<String>, viewport: Viewport) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            html: html.into(),
            viewport,
            clip: ClipRect {
                x: 0.0,
                y: 0.0,
                width: viewport.width as f64,
                height: viewport.height as f64,
            },
            scroll: ScrollOffset::default(),
            user_agent: String::new(),
            image: None,
        }
    }

    /// Decode a job from its JSON record
    pub fn from_json(record: &str) -> Result<Self> {
        Ok(serde_json::from_str(record)?)
    }

    /// Encode the job as a single-line JSON record
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn set_image(&mut self, image: String) {
        self.image = Some(image);
    }
}

/// Record written for a job that could not be rendered: the original job
/// (without `image`) plus the reason.
#[derive(Debug, Serialize)]
pub(crate) struct FailedJobRecord<'a> {
    #[serde(flatten)]
    pub job: &'a Job,
    pub error: String,
}
