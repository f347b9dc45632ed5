use ::core::fmt::Display;
use ::std::{borrow::Cow, fmt};

use ::anyhow::anyhow;
use ::serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};
use ::uuid::Uuid;

use crate::error::{OpalError, Result};

/// Unique identifier for a task, generated at submission.
#[derive(Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Clone, Serialize)]
pub struct TaskId {
    id: Cow<'static, str>,
}

impl TaskId {
    pub fn new(id: Cow<'static, str>) -> Result<Self> {
        if id.is_empty() {
            Err(OpalError::not_allowed(anyhow!("Task id cannot be empty.")))
        } else {
            Ok(Self { id })
        }
    }

    /// Generate a fresh unique id.
    pub fn fresh() -> Self {
        Self {
            id: Cow::Owned(Uuid::new_v4().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_string(TaskIdVisitor)
    }
}

struct TaskIdVisitor;

impl Visitor<'_> for TaskIdVisitor {
    type Value = TaskId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a non-empty string representing a TaskId")
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        TaskId::try_from(value.to_owned()).map_err(de::Error::custom)
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl TryFrom<String> for TaskId {
    type Error = OpalError;
    fn try_from(id: String) -> Result<Self> {
        Self::new(Cow::Owned(id))
    }
}

impl TryFrom<&'static str> for TaskId {
    type Error = OpalError;
    fn try_from(id: &'static str) -> Result<Self> {
        Self::new(Cow::Borrowed(id))
    }
}
