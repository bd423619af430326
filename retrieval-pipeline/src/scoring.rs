use std::cmp::Ordering;

use common::storage::types::chunk::QueryResult;

/// Holds optional subscores gathered from different retrieval signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scores {
    pub fts: Option<f32>,
    pub vector: Option<f32>,
    pub graph: Option<f32>,
}

/// Generic wrapper combining an item with its accumulated retrieval scores.
#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub item: T,
    pub scores: Scores,
    pub fused: f32,
}

impl<T> Scored<T> {
    pub fn new(item: T) -> Self {
        Self {
            item,
            scores: Scores::default(),
            fused: 0.0,
        }
    }

    pub const fn with_vector_score(mut self, score: f32) -> Self {
        self.scores.vector = Some(score);
        self
    }

    pub const fn with_fts_score(mut self, score: f32) -> Self {
        self.scores.fts = Some(score);
        self
    }

    pub const fn with_graph_score(mut self, score: f32) -> Self {
        self.scores.graph = Some(score);
        self
    }

    pub const fn update_fused(&mut self, fused: f32) {
        self.fused = fused;
    }
}

/// Weights used for linear score fusion.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct FusionWeights {
    pub vector: f32,
    pub fts: f32,
    pub graph: f32,
    pub multi_bonus: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        // Defaults favor vector search; FTS complements it when there's
        // overlap; the multi_bonus rewards chunks both signals agree on.
        Self {
            vector: 0.8,
            fts: 0.2,
            graph: 0.2,
            multi_bonus: 0.3,
        }
    }
}

pub const fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

pub fn distance_to_similarity(distance: f32) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    clamp_unit(1.0 / (1.0 + distance.max(0.0)))
}

pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let mut min = f32::MAX;
    let mut max = f32::MIN;

    for s in scores {
        if !s.is_finite() {
            continue;
        }
        if *s < min {
            min = *s;
        }
        if *s > max {
            max = *s;
        }
    }

    if !min.is_finite() || !max.is_finite() {
        return scores.iter().map(|_| 0.0).collect();
    }

    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }

    scores
        .iter()
        .map(|score| {
            if score.is_finite() {
                clamp_unit((score - min) / (max - min))
            } else {
                0.0
            }
        })
        .collect()
}

pub fn fuse_scores(scores: &Scores, weights: FusionWeights) -> f32 {
    let vector = scores.vector.unwrap_or(0.0);
    let fts = scores.fts.unwrap_or(0.0);
    let graph = scores.graph.unwrap_or(0.0);

    let mut fused = graph.mul_add(
        weights.graph,
        vector.mul_add(weights.vector, fts * weights.fts),
    );

    let signals_present = scores
        .vector
        .iter()
        .chain(scores.fts.iter())
        .chain(scores.graph.iter())
        .count();

    if signals_present >= 2 {
        if scores.vector.is_some() && scores.fts.is_some() {
            fused *= 1.0 + weights.multi_bonus;
        } else {
            fused += weights.multi_bonus;
        }
    }

    clamp_unit(fused)
}

/// Sorts by fused score descending. Ties break on insertion order — lower
/// `chunk_index`, then lexicographically lower `document_id` — rather
/// than on a stored-object ID, since fusion here operates directly over
/// retrieval hits rather than repository-backed entities.
pub fn sort_by_fused_desc(items: &mut [Scored<QueryResult>]) {
    items.sort_by(|a, b| {
        b.fused
            .partial_cmp(&a.fused)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.item.chunk.chunk_index.cmp(&b.item.chunk.chunk_index))
            .then_with(|| a.item.chunk.document_id.cmp(&b.item.chunk.document_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::chunk::Chunk;

    fn scored(chunk_index: u32, document_id: &str, fused: f32) -> Scored<QueryResult> {
        let mut s = Scored::new(QueryResult {
            chunk: Chunk::new("c", "text", document_id, chunk_index),
            score: fused,
        });
        s.update_fused(fused);
        s
    }

    #[test]
    fn fuse_scores_rewards_multi_signal_chunks() {
        let mut only_vector = Scores::default();
        only_vector.vector = Some(0.5);
        let mut both = Scores::default();
        both.vector = Some(0.5);
        both.fts = Some(0.5);

        let weights = FusionWeights::default();
        assert!(fuse_scores(&both, weights) > fuse_scores(&only_vector, weights));
    }

    #[test]
    fn sort_by_fused_desc_breaks_ties_on_chunk_index_then_document_id() {
        let mut items = vec![
            scored(1, "doc-b", 0.9),
            scored(0, "doc-z", 0.9),
            scored(1, "doc-a", 0.9),
        ];
        sort_by_fused_desc(&mut items);
        assert_eq!(items[0].item.chunk.document_id, "doc-z");
        assert_eq!(items[1].item.chunk.document_id, "doc-a");
        assert_eq!(items[2].item.chunk.document_id, "doc-b");
    }
}
