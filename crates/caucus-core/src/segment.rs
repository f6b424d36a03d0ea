//! Directory segments: the three independently-sourced partitions of the
//! contact directory.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
  /// House of Commons members and their constituency staff.
  House,
  /// Senators and their staffers.
  Senate,
  /// Provincial and territorial legislators.
  Provincial,
}

impl Segment {
  pub const ALL: [Segment; 3] = [Segment::House, Segment::Senate, Segment::Provincial];

  /// The segment used when a selector is absent or unrecognised.
  pub const DEFAULT: Segment = Segment::House;

  pub fn as_str(self) -> &'static str {
    match self {
      Self::House => "house",
      Self::Senate => "senate",
      Self::Provincial => "provincial",
    }
  }

  /// Strict parse; `None` for anything that is not a known selector.
  ///
  /// `minister` is accepted as an alias for `house` because ministers are
  /// listed in the House view.
  pub fn parse(selector: &str) -> Option<Self> {
    match selector.trim().to_ascii_lowercase().as_str() {
      "house" | "minister" => Some(Self::House),
      "senate" => Some(Self::Senate),
      "provincial" => Some(Self::Provincial),
      _ => None,
    }
  }

  /// Lenient parse used at the request boundary: unknown selectors resolve
  /// to [`Segment::DEFAULT`]. The fallback is logged by the caller since it
  /// can hide a client bug.
  pub fn from_selector(selector: Option<&str>) -> (Self, bool) {
    match selector.map(str::trim).filter(|s| !s.is_empty()) {
      None => (Self::DEFAULT, false),
      Some(s) => match Self::parse(s) {
        Some(segment) => (segment, false),
        None => (Self::DEFAULT, true),
      },
    }
  }
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}
