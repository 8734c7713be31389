use serde::{Deserialize, Serialize};
use std::fmt;

/// A user rating on the 1-10 integer scale used by the primary service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: u8) -> Option<Self> {
        (1..=10).contains(&value).then_some(Rating(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    fn clamped(value: f32) -> Self {
        Rating(value.round().clamp(1.0, 10.0) as u8)
    }
}

impl TryFrom<u8> for Rating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(value).ok_or_else(|| format!("rating {} is outside 1-10", value))
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/10", self.0)
    }
}

/// Score scales used by list services. A secondary service with coarse semantics
/// stores ratings in one of these.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScoreFormat {
    #[default]
    #[serde(rename = "point_10")]
    Point10,
    #[serde(rename = "point_100")]
    Point100,
    #[serde(rename = "point_10_decimal")]
    Point10Decimal,
    /// Stars
    #[serde(rename = "point_5")]
    Point5,
    /// Smileys: 1 = disliked, 2 = neutral, 3 = liked
    #[serde(rename = "point_3")]
    Point3,
}

impl ScoreFormat {
    /// Convert a 1-10 rating into this scale.
    pub fn from_rating(&self, rating: Rating) -> f32 {
        let value = rating.value();
        match self {
            ScoreFormat::Point10 | ScoreFormat::Point10Decimal => value as f32,
            ScoreFormat::Point100 => (value as u32 * 10) as f32,
            ScoreFormat::Point5 => ((value + 1) / 2) as f32,
            ScoreFormat::Point3 => match value {
                1..=4 => 1.0,
                5..=7 => 2.0,
                _ => 3.0,
            },
        }
    }

    /// Convert a score in this scale back to 1-10. A zero or negative score means
    /// "not rated" on every service.
    pub fn to_rating(&self, score: f32) -> Option<Rating> {
        if !score.is_finite() || score <= 0.0 {
            return None;
        }
        let rating = match self {
            ScoreFormat::Point10 | ScoreFormat::Point10Decimal => Rating::clamped(score),
            ScoreFormat::Point100 => Rating::clamped(score / 10.0),
            ScoreFormat::Point5 => Rating::clamped(score * 2.0),
            ScoreFormat::Point3 => match score.round() as u8 {
                1 => Rating(3),
                2 => Rating(6),
                _ => Rating(9),
            },
        };
        Some(rating)
    }
}
