//! Mood rating model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Mood attached to a journal entry, from worst to best.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mood {
    #[serde(rename = "Very Dissatisfied")]
    VeryDissatisfied,
    #[serde(rename = "Dissatisfied")]
    Dissatisfied,
    #[default]
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Satisfied")]
    Satisfied,
    #[serde(rename = "Very Satisfied")]
    VerySatisfied,
}

impl Mood {
    /// All moods in slider order
    pub const ALL: [Self; 5] = [
        Self::VeryDissatisfied,
        Self::Dissatisfied,
        Self::Neutral,
        Self::Satisfied,
        Self::VerySatisfied,
    ];

    /// Display label, also used as the stored and wire value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryDissatisfied => "Very Dissatisfied",
            Self::Dissatisfied => "Dissatisfied",
            Self::Neutral => "Neutral",
            Self::Satisfied => "Satisfied",
            Self::VerySatisfied => "Very Satisfied",
        }
    }

    /// Map a mood slider position (`0..=4`) to a mood
    #[must_use]
    pub fn from_slider(position: u8) -> Option<Self> {
        Self::ALL.get(usize::from(position)).copied()
    }

    /// Slider position of this mood
    #[must_use]
    pub const fn slider_position(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = Error;

    /// Parses a mood label case-insensitively; `-`, `_` and spaces are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(position) = s.trim().parse::<u8>() {
            return Self::from_slider(position).ok_or_else(|| {
                Error::InvalidInput(format!("Mood slider position out of range: {position}"))
            });
        }

        let wanted = normalize_label(s);
        Self::ALL
            .into_iter()
            .find(|mood| normalize_label(mood.as_str()) == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown mood: {}", s.trim())))
    }
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slider_positions() {
        assert_eq!("0".parse::<Mood>().unwrap(), Mood::VeryDissatisfied);
        assert_eq!(" 4 ".parse::<Mood>().unwrap(), Mood::VerySatisfied);
        assert!("5".parse::<Mood>().is_err());
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("Very Dissatisfied".parse::<Mood>().unwrap(), Mood::VeryDissatisfied);
        assert_eq!("neutral".parse::<Mood>().unwrap(), Mood::Neutral);
        assert_eq!("very-satisfied".parse::<Mood>().unwrap(), Mood::VerySatisfied);
        assert_eq!(" Satisfied ".parse::<Mood>().unwrap(), Mood::Satisfied);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("Mood".parse::<Mood>().is_err());
        assert!("".parse::<Mood>().is_err());
    }

    #[test]
    fn test_slider_mapping() {
        assert_eq!(Mood::from_slider(0), Some(Mood::VeryDissatisfied));
        assert_eq!(Mood::from_slider(2), Some(Mood::Neutral));
        assert_eq!(Mood::from_slider(4), Some(Mood::VerySatisfied));
        assert_eq!(Mood::from_slider(5), None);
        assert_eq!(Mood::Satisfied.slider_position(), 3);
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&Mood::VeryDissatisfied).unwrap();
        assert_eq!(json, "\"Very Dissatisfied\"");
        let parsed: Mood = serde_json::from_str("\"Satisfied\"").unwrap();
        assert_eq!(parsed, Mood::Satisfied);
    }

    #[test]
    fn test_default_is_neutral() {
        assert_eq!(Mood::default(), Mood::Neutral);
    }
}
