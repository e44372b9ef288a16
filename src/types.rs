use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn perimeter(&self) -> u64 {
        2 * (self.w as u64 + self.h as u64)
    }

    pub fn aspect_ratio(&self) -> f64 {
        let long = self.w.max(self.h) as f64;
        let short = self.w.min(self.h).max(1) as f64;
        long / short
    }

    pub fn rotated(&self) -> Self {
        Self {
            w: self.h,
            h: self.w,
        }
    }

    pub fn fits_in(&self, other: &Rect) -> bool {
        self.w <= other.w && self.h <= other.h
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// Accepts JSON floats for integer dimension fields; the surrounding
/// application produces JS numbers.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(D::Error::custom(format!(
            "expected a non-negative number, got {value}"
        )));
    }
    Ok(value.round() as u32)
}

fn default_true() -> bool {
    true
}

/// One stock board size shared by every sheet in a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSpec {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub width: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub height: u32,
    #[serde(default, deserialize_with = "deserialize_u32_from_number")]
    pub kerf: u32,
}

impl SheetSpec {
    pub fn rect(&self) -> Rect {
        Rect::new(self.width, self.height)
    }

    pub fn area(&self) -> u64 {
        self.rect().area()
    }
}

/// Immutable part template from the cut list. `quantity` is expanded into
/// individual [`PartInstance`]s before packing. The metadata fields
/// (`gaddi_mark`, `laminate_code`, nominal dimensions) ride along for the
/// label/summary layers and are inert during optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: String,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub width: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub height: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub quantity: u32,
    #[serde(default = "default_true")]
    pub rotation_allowed: bool,
    #[serde(default)]
    pub gaddi_mark: bool,
    #[serde(default)]
    pub laminate_code: Option<String>,
    #[serde(default)]
    pub nominal_width: Option<u32>,
    #[serde(default)]
    pub nominal_height: Option<u32>,
}

impl Part {
    pub fn rect(&self) -> Rect {
        Rect::new(self.width, self.height)
    }
}

fn default_time_budget_ms() -> u64 {
    3000
}

/// The full input contract as produced by the surrounding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub sheet: SheetSpec,
    pub parts: Vec<Part>,
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
}

/// One physical piece to place. References its originating part by index.
#[derive(Debug, Clone, Copy)]
pub struct PartInstance {
    pub part: usize,
}

/// One scheduling decision: which instance to place next and whether to
/// prefer its rotated orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gene {
    pub instance: usize,
    pub rotated: bool,
}

/// An available, unobstructed region of a sheet. A sheet's free rectangles
/// never overlap in area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FreeRect {
    pub fn rect(&self) -> Rect {
        Rect::new(self.width, self.height)
    }

    pub fn area(&self) -> u64 {
        self.rect().area()
    }

    pub fn admits(&self, piece: Rect) -> bool {
        piece.fits_in(&self.rect())
    }
}

/// A piece committed to a position on a sheet. `rotated` is true only when
/// the originating part allows rotation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedPiece {
    pub instance: usize,
    pub part: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
}

impl PlacedPiece {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetLayout {
    pub width: u32,
    pub height: u32,
    pub placed_pieces: Vec<PlacedPiece>,
    pub free_rectangles: Vec<FreeRect>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub sheet_count: usize,
    pub total_area: u64,
    pub used_area: u64,
    pub waste_area: u64,
    pub waste_percent: f64,
    pub efficiency_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnplacedReason {
    TooLarge,
}

/// Part-like entry for a piece that could not be placed on any sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnplacedPart {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub rotation_allowed: bool,
    pub gaddi_mark: bool,
    pub laminate_code: Option<String>,
    pub nominal_width: Option<u32>,
    pub nominal_height: Option<u32>,
    pub reason: UnplacedReason,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub total_input: usize,
    pub total_placed: usize,
    pub total_unplaced: usize,
    pub pieces_lost: i64,
    pub all_accounted_for: bool,
}

/// Full optimization output consumed by the PDF renderer, preview UI and
/// material summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    pub sheets: Vec<SheetLayout>,
    pub totals: Totals,
    pub unplaced: Vec<UnplacedPart>,
    pub validation: Validation,
    pub strategy: String,
}
