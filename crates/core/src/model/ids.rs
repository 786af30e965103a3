use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an identifier from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! server_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            #[must_use]
            pub const fn new(id: $inner) -> Self {
                Self(id)
            }

            /// Returns the underlying value.
            #[must_use]
            pub fn value(&self) -> $inner {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<$inner>()
                    .map($name::new)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                    })
            }
        }
    };
}

server_id!(
    /// Enrollment-scoped course identifier, as used in dashboard API paths.
    CourseId(u64)
);
server_id!(
    /// Identifier of a course module.
    ModuleId(u64)
);
server_id!(
    /// Server-assigned quiz identifier.
    QuizId(u64)
);
server_id!(
    /// Identifier of a single multiple-choice question.
    QuestionId(u64)
);
server_id!(
    /// Identifier of an answer option row.
    OptionId(u64)
);
server_id!(
    /// Identifier of a graded submission, returned by the submit endpoint.
    QuizResultId(u64)
);
server_id!(
    /// Display position of an option within its question (1-based on the wire).
    OptionOrder(u32)
);

/// Composite key that namespaces per-quiz client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub course_id: CourseId,
    pub module_id: ModuleId,
}

impl SessionKey {
    #[must_use]
    pub fn new(course_id: CourseId, module_id: ModuleId) -> Self {
        Self {
            course_id,
            module_id,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.course_id, self.module_id)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
