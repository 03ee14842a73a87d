use std::collections::HashMap;

use crate::scores::PathologyScoreMap;

/// Averages per-image score maps into one map.
///
/// Keys come out in first-seen order. Only finite scores count toward a mean; a key
/// that was observed but never had a finite score maps to `0.0`. No weighting by view
/// or image quality is applied.
pub fn aggregate_scores(maps: &[PathologyScoreMap]) -> PathologyScoreMap {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();

    for map in maps {
        for (pathology, score) in map.iter() {
            let entry = totals.entry(pathology).or_insert_with(|| {
                order.push(pathology);
                (0.0, 0)
            });
            if score.is_finite() {
                entry.0 += score;
                entry.1 += 1;
            }
        }
    }

    order
        .into_iter()
        .map(|pathology| {
            let (sum, count) = totals[pathology];
            let mean = if count > 0 { sum / count as f64 } else { 0.0 };
            (pathology, mean)
        })
        .collect()
}
