//! Threshold ranking over in-memory candidates.

use crate::distance::try_cosine_similarity;

/// A candidate paired with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    /// The scored item.
    pub item: T,
    /// Similarity score; higher is more similar.
    pub score: f32,
}

/// Score every candidate against `query`, keeping those strictly above
/// `threshold`, highest first.
///
/// Candidates whose dimension differs from the query are skipped.
pub fn rank_by_similarity<T, I>(query: &[f32], candidates: I, threshold: f32) -> Vec<Scored<T>>
where
    I: IntoIterator<Item = (T, Vec<f32>)>,
{
    let mut scored: Vec<Scored<T>> = candidates
        .into_iter()
        .filter_map(|(item, vector)| {
            let score = try_cosine_similarity(query, &vector).ok()?;
            (score > threshold).then_some(Scored { item, score })
        })
        .collect();
    sort_scored(&mut scored);
    scored
}

/// Sort scored items by descending score.
pub fn sort_scored<T>(items: &mut [Scored<T>]) {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
}
