//! Property-based tests for socialmeter

use std::sync::Arc;

use proptest::prelude::*;
use socialmeter::evaluation::KFold;
use socialmeter::features::{ExcessiveCapitals, ExcessivePunctuation, NegationParity, WordCount};
use socialmeter::pipeline::traits::FeatureExtractor;
use socialmeter::pipeline::FeatureModule;
use socialmeter::*;

fn inclusive_rule() -> impl Strategy<Value = (String, f64, f64)> {
    (-100i32..100, 0i32..50).prop_map(|(lo, width)| {
        let lo = lo as f64;
        let hi = lo + width as f64;
        (format!("{lo}_{hi}"), lo, hi)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The label is the first rule that matches, or NoMatch.
    #[test]
    fn test_discretizer_first_match(
        rules in prop::collection::vec(inclusive_rule(), 1..6),
        value in -150.0f64..150.0,
    ) {
        let strings: Vec<String> = rules.iter().map(|(s, _, _)| s.clone()).collect();
        let labels: Vec<i64> = (0..rules.len() as i64).collect();
        let d = Discretizer::new(&strings, &labels).unwrap();

        let expected = rules
            .iter()
            .position(|(_, lo, hi)| *lo <= value && value <= *hi)
            .map(|i| Value::Label(i as i64))
            .unwrap_or(Value::NoMatch);
        prop_assert_eq!(d.apply(value), expected);
    }

    /// Parsing then printing a rule gives a rule with the same predicate.
    #[test]
    fn test_rule_display_reparses(lo in -1000i32..1000, width in 1i32..100) {
        for raw in [
            format!("{}_{}", lo, lo + width),
            format!("{}-{}", lo, lo + width),
            format!("{lo}<"),
            format!("{lo}>"),
        ] {
            let rule: DiscreteRule = raw.parse().unwrap();
            let again: DiscreteRule = rule.to_string().parse().unwrap();
            prop_assert_eq!(rule, again);
        }
    }

    /// Exponent notation in an exclusive lower bound does not hide the delimiter.
    #[test]
    fn test_exclusive_rule_with_exponent_bound(
        mantissa in 1u32..10,
        exponent in 1u32..6,
        hi in -50i32..50,
    ) {
        let lo_raw = format!("{mantissa}e-{exponent}");
        let lo: f64 = lo_raw.parse().unwrap();
        let rule: DiscreteRule = format!("{lo_raw}-{hi}").parse().unwrap();
        prop_assert_eq!(rule, DiscreteRule::Exclusive { lo, hi: hi as f64 });
    }

    /// Extractors are pure: the same text always gives the same value.
    #[test]
    fn test_extractors_are_idempotent(text in "[A-Za-z !?.#@]{0,60}") {
        let extractors: Vec<Box<dyn FeatureExtractor>> = vec![
            Box::new(WordCount::new()),
            Box::new(ExcessiveCapitals::new()),
            Box::new(ExcessivePunctuation::new()),
            Box::new(NegationParity::new()),
        ];
        for e in &extractors {
            let first = e.extract(&text);
            prop_assert_eq!(first, e.extract(&text));
        }
        let caps = ExcessiveCapitals::new().extract(&text);
        prop_assert!((0.0..=1.0).contains(&caps));
    }

    /// Attaching N feature modules grows the schema by N, in order.
    #[test]
    fn test_schema_grows_by_feature_count(n in 1usize..12) {
        let mut p = Pipeline::new();
        let before = p.schema().len();
        let keys: Vec<String> = (0..n).map(|i| format!("f{i}")).collect();
        for key in &keys {
            p.add_feature_module(FeatureModule::with_key(
                Feature::new(Arc::new(WordCount::new())),
                key.clone(),
            ))
            .unwrap();
        }
        prop_assert_eq!(p.schema().len(), before + n);
        prop_assert_eq!(p.feature_keys(), keys);
    }

    /// K-fold test sets partition the samples.
    #[test]
    fn test_kfold_partitions_samples(
        labels in prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 5..40),
        n_folds in 2usize..5,
        stratified in any::<bool>(),
    ) {
        let labels: Vec<String> = labels.into_iter().map(String::from).collect();
        let splits = KFold::new(n_folds)
            .with_stratified(stratified)
            .split(&labels)
            .unwrap();
        prop_assert_eq!(splits.len(), n_folds);

        let mut tested: Vec<usize> = Vec::new();
        for split in &splits {
            prop_assert!(!split.test_indices.is_empty());
            prop_assert_eq!(split.train_indices.len() + split.test_indices.len(), labels.len());
            tested.extend(&split.test_indices);
        }
        tested.sort_unstable();
        prop_assert_eq!(tested, (0..labels.len()).collect::<Vec<_>>());
    }
}
