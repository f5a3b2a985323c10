//! The SVG document produced by a vectorization run.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::TracingConfig;
use crate::error::TracingError;

static RE_ROOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(?:<\?xml.*?\?>\s*)?(?:<!--.*?-->\s*)*<svg[\s>]").unwrap()
});
static RE_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<path[\s/>]").unwrap());
static RE_FILL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<path[^>]*?\sfill="([^"]+)""#).unwrap());
static RE_VIEWBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<svg[^>]*?\sviewBox="([^"]*)""#).unwrap());
static RE_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<svg[^>]*?\swidth="([0-9.]+)(?:px)?""#).unwrap());
static RE_HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<svg[^>]*?\sheight="([0-9.]+)(?:px)?""#).unwrap());

/// The coordinate system declared by a document's `viewBox`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    fn parse(value: &str) -> Option<Self> {
        let mut parts = value
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(str::parse::<f64>);
        let view_box = ViewBox {
            min_x: parts.next()?.ok()?,
            min_y: parts.next()?.ok()?,
            width: parts.next()?.ok()?,
            height: parts.next()?.ok()?,
        };
        parts.next().is_none().then_some(view_box)
    }
}

/// A validated, self-contained SVG document.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    svg: String,
    path_count: usize,
    colors: BTreeSet<String>,
    view_box: Option<ViewBox>,
    width: Option<f64>,
    height: Option<f64>,
}

impl VectorDocument {
    /// File name used when the document is exported for download.
    pub const FILE_NAME: &'static str = "vectorized-image.svg";
    pub const MIME_TYPE: &'static str = "image/svg+xml";

    /// Validate engine output. The text must have an `<svg>` root, a closing
    /// `</svg>` and at least one `<path>`.
    pub fn parse(svg: String) -> Result<Self, TracingError> {
        let invalid = |reason: &str| TracingError::InvalidDocument {
            reason: reason.to_string(),
        };

        if svg.trim().is_empty() {
            return Err(invalid("document is empty"));
        }
        if !RE_ROOT.is_match(&svg) {
            return Err(invalid("missing <svg> root element"));
        }
        if !svg.trim_end().ends_with("</svg>") {
            return Err(invalid("missing closing </svg> tag"));
        }

        let path_count = RE_PATH.find_iter(&svg).count();
        if path_count == 0 {
            return Err(invalid("document contains no paths"));
        }

        let colors = RE_FILL
            .captures_iter(&svg)
            .map(|caps| caps[1].to_ascii_lowercase())
            .collect();
        let view_box = RE_VIEWBOX
            .captures(&svg)
            .and_then(|caps| ViewBox::parse(&caps[1]));
        let width = root_length(&RE_WIDTH, &svg);
        let height = root_length(&RE_HEIGHT, &svg);

        Ok(Self {
            svg,
            path_count,
            colors,
            view_box,
            width,
            height,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.svg
    }

    pub fn into_string(self) -> String {
        self.svg
    }

    pub fn len(&self) -> usize {
        self.svg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.svg.is_empty()
    }

    pub fn path_count(&self) -> usize {
        self.path_count
    }

    /// Distinct fill colors, lowercased.
    pub fn colors(&self) -> &BTreeSet<String> {
        &self.colors
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    pub fn view_box(&self) -> Option<ViewBox> {
        self.view_box
    }

    /// Width declared on the root element, in user units.
    pub fn width(&self) -> Option<f64> {
        self.width
    }

    pub fn height(&self) -> Option<f64> {
        self.height
    }

    /// Same path count and same distinct colors.
    pub fn is_equivalent(&self, other: &VectorDocument) -> bool {
        self.path_count == other.path_count && self.colors == other.colors
    }

    /// Write the document to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        fs::write(path, &self.svg)
    }
}

fn root_length(re: &Regex, svg: &str) -> Option<f64> {
    re.captures(svg).and_then(|caps| caps[1].parse().ok())
}

impl fmt::Display for VectorDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.svg)
    }
}

/// Incrementally builds the SVG text for a traced image.
#[derive(Debug, Clone)]
pub struct SvgWriter {
    body: String,
    stroke_width: f32,
}

impl SvgWriter {
    pub fn new(width: u32, height: u32, config: &TracingConfig) -> Self {
        let mut body = String::new();
        let _ = write!(
            body,
            r#"<svg width="{width}" height="{height}" version="1.1" xmlns="http://www.w3.org/2000/svg""#
        );
        if config.viewbox {
            let _ = write!(body, r#" viewBox="0 0 {width} {height}""#);
        }
        body.push_str(">\n");
        Self {
            body,
            stroke_width: config.stroke_width,
        }
    }

    /// Append a filled path. Empty outlines are skipped.
    pub fn push_path(&mut self, d: &str, fill: &str, offset: (f64, f64)) {
        let d = d.trim();
        if d.is_empty() {
            return;
        }
        let _ = write!(self.body, r#"<path fill="{fill}" d="{d}""#);
        if self.stroke_width > 0.0 {
            let _ = write!(
                self.body,
                r#" stroke="{fill}" stroke-width="{}""#,
                self.stroke_width
            );
        }
        if offset != (0.0, 0.0) {
            let _ = write!(
                self.body,
                r#" transform="translate({},{})""#,
                offset.0, offset.1
            );
        }
        self.body.push_str("/>\n");
    }

    pub fn finish(mut self) -> String {
        self.body.push_str("</svg>\n");
        self.body
    }
}
