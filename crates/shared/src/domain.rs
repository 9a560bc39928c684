use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub fn next(self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// One attempt per file selection or reset.
id_newtype!(AttemptId);
// One submission per `submit()` call within an attempt.
id_newtype!(SubmissionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Empty,
    FileInvalid,
    FileAccepted,
    ColumnSelected,
    Submitting,
    Completed,
    SubmissionFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_ids_advance() {
        let first = AttemptId::default();
        assert_eq!(first.next(), AttemptId(1));
        assert_ne!(first, first.next());
        assert_eq!(SubmissionId(7).next().to_string(), "8");
    }

    #[test]
    fn phase_serializes_snake_case() {
        let raw = serde_json::to_string(&SessionPhase::SubmissionFailed).expect("serialize");
        assert_eq!(raw, "\"submission_failed\"");
    }
}
