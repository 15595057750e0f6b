use garde::Validate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
pub struct NewItem {
    #[garde(length(min = 1, max = 100))]
    pub name: String,
    #[garde(range(min = 1, max = 10_000))]
    pub quantity: u32,
    #[serde(default)]
    #[garde(skip)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ItemId {
    /// Item identifier.
    pub id: u64,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListQuery {
    /// Only items carrying this tag.
    pub tag: Option<String>,
    /// Maximum number of items returned.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiKey {
    #[serde(rename = "x-api-key")]
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ItemList {
    pub items: Vec<Item>,
    pub total: usize,
}
