use std::fmt;

use crate::shared::constants::UNKNOWN_LABEL;

/// FER-2013 expression classes, in model output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Class for a model output index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "Angry",
            Emotion::Disgust => "Disgust",
            Emotion::Fear => "Fear",
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Surprise => "Surprise",
            Emotion::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What gets shown for one face: a class, or the `Unknown` sentinel when
/// detection, preprocessing or classification failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum EmotionLabel {
    Known(Emotion),
    #[default]
    Unknown,
}

impl EmotionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            EmotionLabel::Known(emotion) => emotion.label(),
            EmotionLabel::Unknown => UNKNOWN_LABEL,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, EmotionLabel::Known(_))
    }
}

impl From<Emotion> for EmotionLabel {
    fn from(emotion: Emotion) -> Self {
        EmotionLabel::Known(emotion)
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Emotion::Angry)]
    #[case(3, Emotion::Happy)]
    #[case(6, Emotion::Neutral)]
    fn test_from_index(#[case] index: usize, #[case] expected: Emotion) {
        assert_eq!(Emotion::from_index(index), Some(expected));
    }

    #[test]
    fn test_from_index_out_of_range() {
        assert_eq!(Emotion::from_index(7), None);
    }

    #[test]
    fn test_labels_are_capitalised() {
        for emotion in Emotion::ALL {
            let label = emotion.label();
            assert!(label.chars().next().unwrap().is_uppercase());
            assert_eq!(emotion.to_string(), label);
        }
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(EmotionLabel::Unknown.to_string(), "Unknown");
        assert_eq!(EmotionLabel::default(), EmotionLabel::Unknown);
        assert!(!EmotionLabel::Unknown.is_known());
        assert_eq!(EmotionLabel::from(Emotion::Sad).as_str(), "Sad");
    }
}
