use ::core::fmt::Display;
use ::std::{borrow::Cow, fmt};

use ::anyhow::anyhow;
use ::serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};

use crate::error::{OpalError, Result};

/// Unique identifier for a compute node, chosen by the node itself.
#[derive(Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Clone, Serialize)]
pub struct NodeId {
    id: Cow<'static, str>,
}

impl NodeId {
    pub fn new(id: Cow<'static, str>) -> Result<Self> {
        if id.is_empty() {
            Err(OpalError::not_allowed(anyhow!("Node id cannot be empty.")))
        } else {
            Ok(Self { id })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_string(NodeIdVisitor)
    }
}

struct NodeIdVisitor;

impl Visitor<'_> for NodeIdVisitor {
    type Value = NodeId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a non-empty string representing a NodeId")
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        NodeId::try_from(value.to_owned()).map_err(de::Error::custom)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl TryFrom<String> for NodeId {
    type Error = OpalError;
    fn try_from(id: String) -> Result<Self> {
        Self::new(Cow::Owned(id))
    }
}

impl TryFrom<&'static str> for NodeId {
    type Error = OpalError;
    fn try_from(id: &'static str) -> Result<Self> {
        Self::new(Cow::Borrowed(id))
    }
}
