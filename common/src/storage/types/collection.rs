use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::stored_object;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Metric {
    L2,
    Cosine,
    Ip,
}

stored_object!(Collection, "collection", {
    name: String,
    vector_backend: String,
    /// Immutable after creation.
    dimension: usize,
    metric: Metric,
    index_kind: String,
    index_params: HashMap<String, String>,
    owner_id: String
});

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn table_name_is_collection() {
        assert_eq!(Collection::table_name(), "collection");
    }

    #[test]
    fn get_id_returns_id() {
        let c = Collection {
            id: "abc".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            name: "docs".to_string(),
            vector_backend: "milvus".to_string(),
            dimension: 1536,
            metric: Metric::Cosine,
            index_kind: "HNSW".to_string(),
            index_params: HashMap::new(),
            owner_id: "user:1".to_string(),
        };
        assert_eq!(c.get_id(), "abc");
    }
}
