//! Weakness profiling over scored attempts.

use std::collections::BTreeMap;

use repcoach_core::{
    Attempt, CoachConfig, DimensionKind, DimensionResult, OrgId, Trend, UserId,
};
use repcoach_storage::{Result, Storage};

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pull the numeric sub-scores out of one attempt's breakdown.
///
/// A dimension's value may be a plain 0-100 number or an object carrying a
/// numeric `percentage` field; anything else is ignored for that attempt.
fn dimension_scores(attempt: &Attempt) -> Vec<(String, f64)> {
    let Some(map) = attempt.breakdown.as_object() else {
        return Vec::new();
    };

    let mut scores = Vec::new();
    for (key, value) in map {
        let raw = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::Object(obj) => obj.get("percentage").and_then(|v| v.as_f64()),
            _ => None,
        };
        if let Some(score) = raw {
            if score.is_finite() {
                scores.push((key.clone(), score.clamp(0.0, 100.0)));
            }
        }
    }
    scores
}

/// Average each dimension's sub-scores across a set of attempts.
///
/// Attempts lacking a dimension are skipped for that dimension; there is
/// no zero-fill, so every reported average rests on real observations.
pub fn extract_dimension_averages(attempts: &[Attempt]) -> BTreeMap<String, f64> {
    let mut by_dimension: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for attempt in attempts {
        for (key, score) in dimension_scores(attempt) {
            by_dimension.entry(key).or_default().push(score);
        }
    }

    by_dimension
        .into_iter()
        .map(|(key, scores)| {
            let avg = average(&scores);
            (key, avg)
        })
        .collect()
}

/// Per-dimension observation series in chronological order.
fn dimension_series(attempts: &[Attempt]) -> BTreeMap<String, Vec<f64>> {
    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for attempt in attempts {
        for (key, score) in dimension_scores(attempt) {
            series.entry(key).or_default().push(score);
        }
    }
    series
}

/// Judge a dimension's direction by comparing the recent half of its
/// observations against the earlier half.
fn series_trend(scores: &[f64], config: &CoachConfig) -> Trend {
    if scores.len() < config.min_trend_evidence {
        return Trend::New;
    }

    let split = scores.len() / 2;
    let (earlier, recent) = scores.split_at(split);
    if earlier.is_empty() {
        return Trend::New;
    }

    let diff = average(recent) - average(earlier);
    if diff > config.dimension_trend_threshold {
        Trend::Improving
    } else if diff < -config.dimension_trend_threshold {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Analyze a user's recent attempts and regenerate their skill profile.
///
/// Fetches the evidence window (most recent `config.evidence_window`
/// completed attempts), aggregates every dimension found in their
/// breakdowns, and overwrites the persisted dimension rows partitioned at
/// the weakness threshold. Returns the full profile, weakest first, ties
/// broken by lower evidence count then key.
///
/// Fetch failures propagate; callers choose their own degradation policy.
pub async fn generate_weakness_profile<S: Storage + ?Sized>(
    storage: &S,
    config: &CoachConfig,
    org: &OrgId,
    user: &UserId,
) -> Result<Vec<DimensionResult>> {
    let mut attempts = storage
        .recent_completed_attempts(org, user, config.evidence_window)
        .await?;

    if attempts.is_empty() {
        return Ok(Vec::new());
    }

    // Newest-first fetch, oldest-first for trend math.
    attempts.reverse();

    let mut results: Vec<DimensionResult> = dimension_series(&attempts)
        .into_iter()
        .map(|(key, scores)| DimensionResult {
            score: average(&scores),
            trend: series_trend(&scores, config),
            evidence_count: scores.len(),
            key,
        })
        .collect();

    results.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.evidence_count.cmp(&b.evidence_count))
            .then(a.key.cmp(&b.key))
    });

    let rows: Vec<(DimensionKind, DimensionResult)> = results
        .iter()
        .map(|result| {
            let kind = if result.score < config.weakness_threshold {
                DimensionKind::Weakness
            } else {
                DimensionKind::Skill
            };
            (kind, result.clone())
        })
        .collect();

    storage.replace_dimension_rows(org, user, &rows).await?;

    tracing::debug!(
        org = %org,
        user = %user,
        dimensions = results.len(),
        "regenerated weakness profile"
    );

    Ok(results)
}
