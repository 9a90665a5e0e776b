//! Expression vocabulary

use serde::{Deserialize, Serialize};

/// Mood shown on the face
///
/// Doubles as the command vocabulary of the control surface and as the key
/// of the static pose table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionKind {
    Happy,
    Sad,
    Puzzled,
    Angry,
    Neutral,
}

impl ExpressionKind {
    /// Every expression, in demo-cycle order
    pub const ALL: [Self; 5] = [
        Self::Happy,
        Self::Sad,
        Self::Puzzled,
        Self::Angry,
        Self::Neutral,
    ];

    /// Parse a command name, normalizing anything unknown to `Neutral`
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "happy" => Self::Happy,
            "sad" => Self::Sad,
            "puzzled" => Self::Puzzled,
            "angry" => Self::Angry,
            _ => Self::Neutral,
        }
    }

    /// Lowercase name used on the wire
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Puzzled => "puzzled",
            Self::Angry => "angry",
            Self::Neutral => "neutral",
        }
    }

    /// The expression after this one in the demo cycle
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Happy => Self::Sad,
            Self::Sad => Self::Puzzled,
            Self::Puzzled => Self::Angry,
            Self::Angry => Self::Neutral,
            Self::Neutral => Self::Happy,
        }
    }
}

impl std::fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_round_trip() {
        for kind in ExpressionKind::ALL {
            assert_eq!(ExpressionKind::from_name(kind.name()), kind);
        }
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(ExpressionKind::from_name("  ANGRY "), ExpressionKind::Angry);
        assert_eq!(ExpressionKind::from_name("Puzzled"), ExpressionKind::Puzzled);
    }

    #[test]
    fn unknown_names_become_neutral() {
        assert_eq!(ExpressionKind::from_name("ecstatic"), ExpressionKind::Neutral);
        assert_eq!(ExpressionKind::from_name(""), ExpressionKind::Neutral);
    }

    #[test]
    fn demo_cycle_visits_every_expression() {
        let mut kind = ExpressionKind::Happy;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(kind);
            kind = kind.next();
        }
        assert_eq!(seen, ExpressionKind::ALL);
        assert_eq!(kind, ExpressionKind::Happy);
    }
}
