//! Mask-based request building and response reassembly

use super::{InferenceRequest, Scorer};
use crate::error::{Result, ScanError};
use crate::features::{FeatureRow, FeatureSpec};
use crate::telemetry::{record_count, CounterMetric};
use std::collections::BTreeMap;

/// Payload for the valid rows of `rows`, plus the position mask of rows sent
pub fn build_request(spec: &FeatureSpec, rows: &[FeatureRow]) -> (InferenceRequest, Vec<bool>) {
    let mask: Vec<bool> = rows.iter().map(|r| spec.is_valid(r)).collect();

    let payload = rows
        .iter()
        .zip(&mask)
        .filter(|(_, &valid)| valid)
        .map(|(row, _)| {
            spec.inference_features
                .iter()
                .filter_map(|f| row.get(*f).map(|v| (f.name().to_string(), v)))
                .collect::<BTreeMap<_, _>>()
        })
        .collect();

    (InferenceRequest { rows: payload }, mask)
}

/// Score `rows`, returning one entry per input row in input order.
///
/// Rows that fail validation are never sent and keep `None`. No request is
/// made when nothing is valid. A response whose length differs from the number
/// of rows sent aborts with [`ScanError::InferenceCountMismatch`].
pub async fn score_rows(
    scorer: &dyn Scorer,
    spec: &FeatureSpec,
    rows: &[FeatureRow],
) -> Result<Vec<Option<f64>>> {
    let (request, mask) = build_request(spec, rows);
    let mut scores: Vec<Option<f64>> = vec![None; rows.len()];

    if request.is_empty() {
        tracing::warn!(rows = rows.len(), "No valid feature rows, skipping inference call");
        return Ok(scores);
    }

    let sent = request.len();
    tracing::info!(sent, excluded = rows.len() - sent, "Inference payload ready");

    let response = scorer.score(&request).await?;
    if response.len() != sent {
        return Err(ScanError::InferenceCountMismatch {
            sent,
            received: response.len(),
        });
    }

    let positions = mask
        .iter()
        .enumerate()
        .filter_map(|(i, &valid)| valid.then_some(i));

    for (pos, score) in positions.zip(response) {
        match score.raw_alpha.filter(|v| v.is_finite()) {
            Some(v) => scores[pos] = Some(v),
            None => {
                tracing::warn!(symbol = %rows[pos].symbol, "Scorer returned no usable raw_alpha");
            }
        }
    }

    record_count(
        CounterMetric::RowsScored,
        scores.iter().filter(|s| s.is_some()).count() as u64,
    );

    Ok(scores)
}
