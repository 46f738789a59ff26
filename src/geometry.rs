use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static TRANSLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"translate\((-?\d+\.?\d*)px, (-?\d+\.?\d*)px\)").expect("valid translate regex")
});
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"width: (\d+\.?\d*)px; height: (\d+\.?\d*)px;").expect("valid size regex")
});

/// Axis-aligned box in canvas space, stored as min/max corners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Same origin and width, with the height replaced.
    pub fn with_height(self, height: f64) -> Self {
        Self {
            max_y: self.min_y + height,
            ..self
        }
    }

    /// Inclusive overlap test; touching edges count as intersecting.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

pub fn contains(outer: &Rect, inner: &Rect) -> bool {
    outer.min_x <= inner.min_x
        && outer.min_y <= inner.min_y
        && outer.max_x >= inner.max_x
        && outer.max_y >= inner.max_y
}

/// Smallest box covering every input box. `None` when the input is empty.
pub fn union<I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = Rect>,
{
    rects.into_iter().reduce(|acc, rect| Rect {
        min_x: acc.min_x.min(rect.min_x),
        min_y: acc.min_y.min(rect.min_y),
        max_x: acc.max_x.max(rect.max_x),
        max_y: acc.max_y.max(rect.max_y),
    })
}

/// Reads the rubber-band selection box out of the rendered selection element.
///
/// The host renders the element with an inline `transform: translate(..)` and a
/// `width: ..px; height: ..px;` style pair. Anything that does not carry both is
/// treated as absent.
pub fn parse_selection_rect(markup: &str) -> Option<Rect> {
    let translate = TRANSLATE_RE.captures(markup)?;
    let size = SIZE_RE.captures(markup)?;

    let x = translate.get(1)?.as_str().parse::<f64>().ok()?;
    let y = translate.get(2)?.as_str().parse::<f64>().ok()?;
    let width = size.get(1)?.as_str().parse::<f64>().ok()?;
    let height = size.get(2)?.as_str().parse::<f64>().ok()?;

    Some(Rect::from_xywh(x, y, width, height))
}
