//! Directive parsing
//!
//! Turns a raw request path into a [`TransformDirective`]: the structured
//! transformation request the rest of the pipeline works from.
//!
//! The first path segment may carry a compact modifier string
//! (`/h400-w600-gse/path/to/image.jpg`) or a named preset key. A trailing
//! `.json` suffix requests metadata instead of pixels, and a doubled
//! extension (`image.jpg.webp`) overrides the output format.
//!
//! Parsing is total: malformed tokens are discarded individually and never
//! abort parsing of their siblings, so the worst input degrades to default
//! directive values rather than an error.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::codec::format::{ImageFormat, OutputFormat};
use crate::config::PresetConfig;

/// What the request wants done with the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Serve the source as-is (optionally bounded by the configured max dimension)
    Original,
    /// Aspect-preserving resize to one explicit dimension
    Resize,
    /// Fill-crop to an exact square
    Square,
    /// Fill-crop to exact width and height
    Crop,
    /// Scale to fit and fill the remainder with a background color
    Pad,
    /// Return image metadata as JSON instead of pixels
    Json,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Resize => "resize",
            Self::Square => "square",
            Self::Crop => "crop",
            Self::Pad => "pad",
            Self::Json => "json",
        }
    }
}

/// Compass-direction anchor for positioning a crop or pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    Center,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Gravity {
    /// Parse a gravity code, case-insensitively. Unrecognized codes return
    /// `None` so the caller keeps the default.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "c" => Some(Self::Center),
            "n" => Some(Self::North),
            "ne" => Some(Self::NorthEast),
            "e" => Some(Self::East),
            "se" => Some(Self::SouthEast),
            "s" => Some(Self::South),
            "sw" => Some(Self::SouthWest),
            "w" => Some(Self::West),
            "nw" => Some(Self::NorthWest),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Center => "c",
            Self::North => "n",
            Self::NorthEast => "ne",
            Self::East => "e",
            Self::SouthEast => "se",
            Self::South => "s",
            Self::SouthWest => "sw",
            Self::West => "w",
            Self::NorthWest => "nw",
        }
    }

    /// True when the anchor pins to the top edge.
    pub fn is_north(&self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    /// True when the anchor pins to the bottom edge.
    pub fn is_south(&self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }

    /// True when the anchor pins to the left edge.
    pub fn is_west(&self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    /// True when the anchor pins to the right edge.
    pub fn is_east(&self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }
}

/// How a crop box relates to the source content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    /// Scale up until the target box is fully covered, crop the excess
    #[default]
    Fill,
    /// Scale down until the source fits, fill the remainder with color
    Pad,
}

/// The structured transformation request derived from a URL path.
///
/// Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformDirective {
    pub action: Action,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub gravity: Gravity,
    pub crop_mode: CropMode,
    /// RGB padding color, only meaningful when `crop_mode` is `Pad`
    pub padding_color: Option<[u8; 3]>,
    /// Explicit crop offsets overriding gravity
    pub x: Option<u32>,
    pub y: Option<u32>,
    /// Always within `[1, 100]`
    pub quality: u8,
    pub filter: Option<String>,
    /// Source backend override from the `e<name>` token or a preset
    pub source: Option<String>,
    /// Explicit output format; `None` means "same as input"
    pub output_format: Option<OutputFormat>,
}

/// Configuration limits the parser applies.
#[derive(Debug, Clone, Copy)]
pub struct ParserLimits {
    pub default_quality: u8,
    pub max_dimension: Option<u32>,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            default_quality: 80,
            max_dimension: None,
        }
    }
}

/// Result of parsing a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub directive: TransformDirective,
    /// The requested file name with metadata/format suffixes stripped
    pub image_name: String,
    /// Canonical source path: directive segment removed, suffixes stripped,
    /// percent-decoded
    pub source_path: String,
}

fn hex_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{6}$").expect("static regex"))
}

/// Accumulated modifier values from a directive segment or preset.
#[derive(Debug, Default)]
struct Modifiers {
    height: Option<u32>,
    width: Option<u32>,
    square: Option<u32>,
    gravity: Option<Gravity>,
    crop: Option<CropMode>,
    color: Option<[u8; 3]>,
    quality: Option<u8>,
    source: Option<String>,
    filter: Option<String>,
    x: Option<u32>,
    y: Option<u32>,
}

/// Parse a candidate directive segment into modifiers.
///
/// Returns `None` when no dash-token starts with a recognized modifier key,
/// in which case the segment is part of the file path, not a directive.
/// Individual tokens with unparseable values are discarded without affecting
/// their siblings.
fn parse_modifier_segment(segment: &str) -> Option<Modifiers> {
    let mut mods = Modifiers::default();
    let mut recognized = false;

    for token in segment.split('-') {
        let mut chars = token.chars();
        let key = match chars.next() {
            Some(c) => c.to_ascii_lowercase(),
            None => continue,
        };
        let value = chars.as_str();
        if value.is_empty() {
            continue;
        }

        match key {
            'h' => {
                recognized = true;
                if let Ok(v) = value.parse::<u32>() {
                    if v > 0 {
                        mods.height = Some(v);
                    }
                }
            }
            'w' => {
                recognized = true;
                if let Ok(v) = value.parse::<u32>() {
                    if v > 0 {
                        mods.width = Some(v);
                    }
                }
            }
            's' => {
                recognized = true;
                if let Ok(v) = value.parse::<u32>() {
                    if v > 0 {
                        mods.square = Some(v);
                    }
                }
            }
            'g' => {
                recognized = true;
                if let Some(g) = Gravity::from_code(value) {
                    mods.gravity = Some(g);
                }
            }
            'c' => {
                recognized = true;
                match value.to_lowercase().as_str() {
                    "fill" => mods.crop = Some(CropMode::Fill),
                    "pad" => mods.crop = Some(CropMode::Pad),
                    _ => {}
                }
            }
            'b' => {
                recognized = true;
                if hex_color_re().is_match(value) {
                    if let Ok(bytes) = hex::decode(value) {
                        mods.color = Some([bytes[0], bytes[1], bytes[2]]);
                    }
                }
            }
            'q' => {
                recognized = true;
                if let Ok(v) = value.parse::<u32>() {
                    mods.quality = Some(v.clamp(1, 100) as u8);
                }
            }
            'e' => {
                recognized = true;
                mods.source = Some(value.to_lowercase());
            }
            'f' => {
                recognized = true;
                mods.filter = Some(value.to_lowercase());
            }
            'x' => {
                recognized = true;
                if let Ok(v) = value.parse::<u32>() {
                    mods.x = Some(v);
                }
            }
            'y' => {
                recognized = true;
                if let Ok(v) = value.parse::<u32>() {
                    mods.y = Some(v);
                }
            }
            _ => {}
        }
    }

    if recognized {
        Some(mods)
    } else {
        None
    }
}

/// Lift a named preset into the same modifier shape a token segment produces.
fn preset_modifiers(preset: &PresetConfig) -> Modifiers {
    Modifiers {
        height: preset.height.filter(|v| *v > 0),
        width: preset.width.filter(|v| *v > 0),
        square: preset.square.filter(|v| *v > 0),
        gravity: preset.gravity.as_deref().and_then(Gravity::from_code),
        crop: preset.crop.as_deref().and_then(|c| match c {
            "fill" => Some(CropMode::Fill),
            "pad" => Some(CropMode::Pad),
            _ => None,
        }),
        color: None,
        quality: preset.quality.map(|q| q.clamp(1, 100)),
        source: preset.source.clone(),
        filter: preset.filter.clone(),
        x: None,
        y: None,
    }
}

/// Strip metadata and output-format suffixes from a file name.
///
/// Returns the cleaned name, whether this is a metadata (`.json`) request,
/// and any explicit output-format override.
fn parse_file_name(file: &str) -> (String, bool, Option<OutputFormat>) {
    let mut exts: Vec<&str> = file.split('.').collect();
    let mut is_json = false;
    let mut output_format = None;

    if exts.len() >= 2 && exts[exts.len() - 1].eq_ignore_ascii_case("json") {
        is_json = true;
        exts.pop();
    }

    // An explicit output format needs the real extension right before it:
    // image.jpg.webp, never image.webp
    if exts.len() >= 3 {
        let input = exts[exts.len() - 2];
        let output = exts[exts.len() - 1];
        if ImageFormat::from_str(input).is_ok() {
            if let Ok(fmt) = OutputFormat::from_str(output) {
                output_format = Some(fmt);
                exts.pop();
            }
        }
    }

    (exts.join("."), is_json, output_format)
}

/// Parse a request path into a directive plus the canonical source path.
///
/// Total: never fails. Malformed modifiers degrade to defaults.
pub fn parse(
    path: &str,
    presets: &HashMap<String, PresetConfig>,
    limits: &ParserLimits,
) -> ParsedRequest {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let file = segments.last().copied().unwrap_or("");

    let (image_name, is_json, mut output_format) = parse_file_name(file);

    // The first segment is only a directive candidate when something follows it.
    let mut mods = Modifiers::default();
    let mut has_directive_segment = false;
    if segments.len() >= 2 {
        let candidate = segments[0];
        if let Some(preset) = presets.get(candidate) {
            mods = preset_modifiers(preset);
            has_directive_segment = true;
        } else if let Some(parsed) = parse_modifier_segment(candidate) {
            mods = parsed;
            has_directive_segment = true;
        }
    }

    // Square always fill-crops; a stray cpad on an s token is ignored.
    if mods.square.is_some() {
        mods.crop = Some(CropMode::Fill);
    }

    let mut width = mods.width;
    let mut height = mods.height;
    if let Some(s) = mods.square {
        width = Some(s);
        height = Some(s);
    }

    let crop_mode = mods.crop.unwrap_or_default();

    let action = if is_json {
        Action::Json
    } else if mods.square.is_some() {
        Action::Square
    } else if crop_mode == CropMode::Pad && (width.is_some() || height.is_some()) {
        // Pad always carries two positive dimensions
        let side = width.or(height);
        width = width.or(side);
        height = height.or(side);
        Action::Pad
    } else if width.is_some() && height.is_some() {
        Action::Crop
    } else if width.is_some() || height.is_some() {
        Action::Resize
    } else {
        Action::Original
    };

    // An unbounded original request is boxed in by the configured maximum.
    if action == Action::Original {
        if let Some(max) = limits.max_dimension {
            width = Some(max);
            height = Some(max);
        }
    }

    // Explicit dimensions are clamped down to the maximum, never up.
    if let Some(max) = limits.max_dimension {
        width = width.map(|w| w.min(max));
        height = height.map(|h| h.min(max));
    }

    // Metadata requests keep the source override but disregard any
    // output-format token: the .json suffix wins.
    if action == Action::Json {
        output_format = None;
    }

    let quality = mods
        .quality
        .unwrap_or(limits.default_quality)
        .clamp(1, 100);

    let directive = TransformDirective {
        action,
        width,
        height,
        gravity: mods.gravity.unwrap_or_default(),
        crop_mode,
        padding_color: mods.color,
        x: mods.x,
        y: mods.y,
        quality,
        filter: mods.filter,
        source: mods.source,
        output_format,
    };

    // Canonical path: drop the directive segment and replace the file name
    // with the cleaned version.
    let mut path_parts: Vec<&str> = segments;
    if has_directive_segment {
        path_parts.remove(0);
    }
    if let Some(last) = path_parts.last_mut() {
        *last = &image_name;
    }
    let joined = path_parts.join("/");
    let source_path = urlencoding::decode(&joined)
        .map(|c| c.into_owned())
        .unwrap_or(joined);

    ParsedRequest {
        directive,
        image_name,
        source_path,
    }
}
