use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    Earliest,
    #[default]
    Latest,
    Pending,
    Safe,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockIdentifier {
    Number(u64),
    Tag(BlockTag),
}

impl Default for BlockIdentifier {
    fn default() -> Self {
        Self::Tag(BlockTag::Latest)
    }
}

impl Display for BlockTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockTag::Earliest => write!(f, "earliest"),
            BlockTag::Latest => write!(f, "latest"),
            BlockTag::Pending => write!(f, "pending"),
            BlockTag::Safe => write!(f, "safe"),
            BlockTag::Finalized => write!(f, "finalized"),
        }
    }
}

impl Display for BlockIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockIdentifier::Number(number) => write!(f, "{number:#x}"),
            BlockIdentifier::Tag(tag) => write!(f, "{tag}"),
        }
    }
}

impl From<BlockIdentifier> for serde_json::Value {
    fn from(value: BlockIdentifier) -> Self {
        serde_json::Value::String(value.to_string())
    }
}
