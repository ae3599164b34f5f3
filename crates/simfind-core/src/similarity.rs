//! Cosine similarity and ranking of candidates against a query vector.

use std::collections::HashSet;

/// Default number of results returned.
pub const DEFAULT_LIMIT: usize = 10;
/// Default inclusive similarity threshold.
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// Anything that can be scored against a dense query vector.
pub trait Weighted {
    /// Cosine similarity to `query`. Zero when either side has zero norm.
    fn cosine_to(&self, query: &[f32]) -> f32;
}

impl Weighted for [f32] {
    fn cosine_to(&self, query: &[f32]) -> f32 {
        cosine(self, query)
    }
}

impl Weighted for Vec<f32> {
    fn cosine_to(&self, query: &[f32]) -> f32 {
        cosine(self, query)
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    (0..n).map(|i| a[i] * b[i]).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Unit-length copy of `v`; the zero vector is returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Cosine similarity. Never divides by zero: a zero vector scores 0 against anything.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom <= 0.0 {
        return 0.0;
    }
    dot(a, b) / denom
}

/// Score rounded to 2 decimals for display. Sorting always uses the full value.
pub fn round_score(score: f32) -> f32 {
    ((f64::from(score) * 100.0).round() / 100.0) as f32
}

/// A candidate document: its id and its vector.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a, V: Weighted + ?Sized> {
    pub id: &'a str,
    pub vector: &'a V,
}

#[derive(Debug, Clone)]
pub struct RankOptions {
    pub limit: usize,
    /// Inclusive lower bound on the score.
    pub threshold: f32,
    /// Ids never returned (the query's own document).
    pub exclude: HashSet<String>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            threshold: DEFAULT_THRESHOLD,
            exclude: HashSet::new(),
        }
    }
}

/// One ranked candidate. `position` is its index in the candidate sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<'a> {
    pub position: usize,
    pub id: &'a str,
    pub score: f32,
}

/// Rank `candidates` against `query`: drop excluded ids, drop scores below the
/// threshold, sort descending (ties keep candidate order) and keep the top `limit`.
pub fn rank<'a, V, I>(query: &[f32], candidates: I, options: &RankOptions) -> Vec<Ranked<'a>>
where
    V: Weighted + ?Sized + 'a,
    I: IntoIterator<Item = Candidate<'a, V>>,
{
    let mut scored: Vec<Ranked<'a>> = candidates
        .into_iter()
        .enumerate()
        .filter(|(_, c)| !options.exclude.contains(c.id))
        .map(|(position, c)| Ranked {
            position,
            id: c.id,
            score: c.vector.cosine_to(query),
        })
        .filter(|r| r.score >= options.threshold)
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(options.limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn candidates<'a>(ids: &'a [&'a str], vectors: &'a [Vec<f32>]) -> Vec<Candidate<'a, Vec<f32>>> {
        ids.iter()
            .zip(vectors)
            .map(|(id, vector)| Candidate { id: *id, vector })
            .collect()
    }

    #[test]
    fn self_similarity_is_one() {
        let v = normalize(&[0.3, 0.0, 1.2, 4.0]);
        assert!((cosine(&v, &v) - 1.0).abs() < EPS);
        let raw = [2.0, 5.0, 0.5];
        assert!((cosine(&raw, &raw) - 1.0).abs() < EPS);
    }

    #[test]
    fn symmetric() {
        let a = [0.1, 0.7, 0.0, 0.2];
        let b = [0.5, 0.1, 0.9, 0.0];
        assert_eq!(cosine(&a, &b), cosine(&b, &a));
    }

    #[test]
    fn zero_vector_scores_zero() {
        let zero = [0.0f32; 4];
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(cosine(&zero, &v), 0.0);
        assert_eq!(cosine(&v, &zero), 0.0);
        assert_eq!(cosine(&zero, &zero), 0.0);
        assert!(!cosine(&zero, &zero).is_nan());
    }

    #[test]
    fn normalize_leaves_zero_alone() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert!((l2_norm(&normalize(&[3.0, 4.0])) - 1.0).abs() < EPS);
    }

    #[test]
    fn rounds_for_display_only() {
        assert_eq!(round_score(0.456), 0.46);
        assert_eq!(round_score(0.454), 0.45);
        assert_eq!(round_score(1.0), 1.0);
    }

    #[test]
    fn threshold_limit_and_order() {
        let query = vec![1.0, 0.0, 0.0];
        let ids = ["a", "b", "c", "d", "e"];
        let vectors = vec![
            vec![0.2, 1.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![1.0, 1.0, 0.0],
            vec![1.0, 0.1, 0.0],
        ];
        for (threshold, limit) in [(0.0, 10), (0.1, 10), (0.5, 2), (0.99, 10), (0.0, 0)] {
            let options = RankOptions {
                limit,
                threshold,
                ..RankOptions::default()
            };
            let ranked = rank(&query, candidates(&ids, &vectors), &options);
            assert!(ranked.len() <= limit);
            assert!(ranked.iter().all(|r| r.score >= threshold));
            assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        }
        let all = rank(&query, candidates(&ids, &vectors), &RankOptions::default());
        let order: Vec<&str> = all.iter().map(|r| r.id).collect();
        assert_eq!(order, ["b", "e", "d", "a"]);
        assert_eq!(all[0].position, 1);
    }

    #[test]
    fn threshold_is_inclusive() {
        let query = vec![1.0, 0.0];
        let ids = ["same"];
        let vectors = vec![vec![1.0, 0.0]];
        let options = RankOptions {
            threshold: 1.0,
            ..RankOptions::default()
        };
        assert_eq!(rank(&query, candidates(&ids, &vectors), &options).len(), 1);
    }

    #[test]
    fn ties_keep_candidate_order() {
        let query = vec![1.0, 0.0];
        let ids = ["first", "second", "third"];
        let vectors = vec![vec![1.0, 1.0], vec![2.0, 2.0], vec![4.0, 4.0]];
        let ranked = rank(&query, candidates(&ids, &vectors), &RankOptions::default());
        let order: Vec<&str> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(order, ["first", "second", "third"]);
    }

    #[test]
    fn excluded_ids_never_returned() {
        let query = vec![1.0, 0.0];
        let ids = ["me", "other"];
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.5]];
        let options = RankOptions {
            exclude: HashSet::from(["me".to_string()]),
            ..RankOptions::default()
        };
        let ranked = rank(&query, candidates(&ids, &vectors), &options);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "other");
        assert_eq!(ranked[0].position, 1);
    }

    #[test]
    fn zero_query_matches_nothing_above_positive_threshold() {
        let query = vec![0.0, 0.0];
        let ids = ["a"];
        let vectors = vec![vec![1.0, 0.0]];
        assert!(rank(&query, candidates(&ids, &vectors), &RankOptions::default()).is_empty());
    }
}
