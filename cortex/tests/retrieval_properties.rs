// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{Duration, Utc};
use counsel_cortex::{rank, MemoryItem, MemoryKind, RecencyDecay, RetrievalWeights, Rule};
use proptest::prelude::*;

fn weights() -> impl Strategy<Value = RetrievalWeights> {
    (0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(r, i, v)| RetrievalWeights::new(r, i, v))
}

proptest! {
    #[test]
    fn ranked_scores_never_increase(
        entries in prop::collection::vec((0.0f64..=1.0, 0.0f64..=1.0, 0i64..500), 0..40),
        weights in weights(),
        top_k in 0usize..50,
    ) {
        let now = Utc::now();
        let candidates: Vec<(MemoryItem, f64)> = entries
            .iter()
            .map(|(importance, relevance, hours)| {
                let item = MemoryItem::new("m", MemoryKind::Observation, *importance, vec![1.0])
                    .with_created_at(now - Duration::hours(*hours));
                (item, *relevance)
            })
            .collect();

        let ranked = rank(candidates, now, &weights, &RecencyDecay::default(), top_k);

        prop_assert_eq!(ranked.len(), top_k.min(entries.len()));
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for scored in &ranked {
            prop_assert!(scored.recency >= 0.0 && scored.recency <= 1.0);
        }
    }

    #[test]
    fn recency_decreases_with_age(a in 0.0f64..10_000.0, b in 0.0f64..10_000.0) {
        let decay = RecencyDecay::default();
        let (younger, older) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(decay.score_hours(younger) >= decay.score_hours(older));
    }

    #[test]
    fn confidence_stays_in_unit_interval(
        start in 0.0f64..=1.0,
        outcomes in prop::collection::vec((any::<bool>(), 0.0f64..=1.0), 0..60),
        learning_rate in 0.0f64..=1.0,
    ) {
        let mut rule = Rule::new("p", "d", start, vec![1.0]);
        for (success, quality) in &outcomes {
            let change = rule.record_outcome(*success, *quality, learning_rate);
            prop_assert!((0.0..=1.0).contains(&change.new));
            if *success {
                prop_assert!(change.new >= change.old);
            } else {
                prop_assert!(change.new <= change.old);
            }
        }
        prop_assert_eq!(rule.performance.uses, outcomes.len() as u64);
        prop_assert_eq!(
            rule.performance.successes + rule.performance.failures,
            rule.performance.uses
        );
    }
}
