use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "timertype", rename_all = "snake_case")]
pub(crate) enum TimerType {
    PerCategory,
    PerTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "scoringmode", rename_all = "lowercase")]
pub(crate) enum ScoringMode {
    Point,
    Irt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub(crate) enum QuestionType {
    MultipleChoice,
    TrueFalse,
    MultipleChoiceMultipleAnswer,
    MultipleChoiceMultipleCategory,
    Essay,
    Matching,
}

impl QuestionType {
    pub(crate) fn is_auto_gradable(self) -> bool {
        !matches!(self, Self::Essay)
    }

    /// Types whose answer is exactly one option token.
    pub(crate) fn is_single_choice(self) -> bool {
        matches!(self, Self::MultipleChoice | Self::TrueFalse)
    }

    /// Types whose tokens are `key:value` pairs.
    pub(crate) fn is_paired(self) -> bool {
        matches!(self, Self::MultipleChoiceMultipleCategory | Self::Matching)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::TrueFalse => "true_false",
            Self::MultipleChoiceMultipleAnswer => "multiple_choice_multiple_answer",
            Self::MultipleChoiceMultipleCategory => "multiple_choice_multiple_category",
            Self::Essay => "essay",
            Self::Matching => "matching",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "endreason", rename_all = "snake_case")]
pub(crate) enum EndReason {
    Submitted,
    TimeExpired,
    Violation,
    Abandoned,
}

impl EndReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::TimeExpired => "time_expired",
            Self::Violation => "violation",
            Self::Abandoned => "abandoned",
        }
    }
}
