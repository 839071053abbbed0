//! Property tests for the genetic operators.
//!
//! For arbitrary parents, rates and magnitudes:
//! 1. Every offspring satisfies every gene bound
//! 2. Offspring generation is exactly one past the oldest parent
//! 3. Offspring record their parents and never inherit a fitness report

use darwinfi_core::domain::FitnessReport;
use darwinfi_core::genome::StrategyGenome;
use darwinfi_core::scenario::MarketCondition;
use darwinfi_runner::operators::{
    crossover, mutate, specialize, CrossoverPolicy, GeneCrossover, GeneOverrides,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn parent(seed: u64, generations: u32) -> StrategyGenome {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut genome = StrategyGenome::create_random(&mut rng);
    for _ in 0..generations {
        genome = mutate(&genome, 0.3, 0.3, &mut rng);
    }
    genome.with_fitness(FitnessReport::failed("scored parent"))
}

fn arb_rule() -> impl Strategy<Value = GeneCrossover> {
    prop_oneof![
        Just(GeneCrossover::Average),
        Just(GeneCrossover::Inherit),
        Just(GeneCrossover::Either),
    ]
}

fn arb_condition() -> impl Strategy<Value = MarketCondition> {
    prop::sample::select(MarketCondition::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn crossover_children_in_bounds(
        seed_a in any::<u64>(),
        seed_b in any::<u64>(),
        gen_a in 0u32..4,
        gen_b in 0u32..4,
        rule in arb_rule(),
        op_seed in any::<u64>(),
    ) {
        let (a, b) = (parent(seed_a, gen_a), parent(seed_b, gen_b));
        let child = crossover(&a, &b, &CrossoverPolicy::uniform(rule), &mut StdRng::seed_from_u64(op_seed));
        prop_assert!(child.genes().validate().is_ok());
        prop_assert_eq!(child.generation(), a.generation().max(b.generation()) + 1);
        prop_assert_eq!(child.parent_ids().len(), 2);
        prop_assert!(child.fitness().is_none());
    }

    #[test]
    fn mutation_children_in_bounds(
        seed in any::<u64>(),
        generation in 0u32..4,
        rate in 0.0..=1.0_f64,
        magnitude in 0.0..=1.0_f64,
        op_seed in any::<u64>(),
    ) {
        let p = parent(seed, generation);
        let child = mutate(&p, rate, magnitude, &mut StdRng::seed_from_u64(op_seed));
        prop_assert!(child.genes().validate().is_ok());
        prop_assert_eq!(child.generation(), p.generation() + 1);
        prop_assert_eq!(child.parent_ids(), &[p.id().clone()][..]);
        prop_assert!(child.fitness().is_none());
    }

    #[test]
    fn specialized_children_in_bounds(
        seed in any::<u64>(),
        condition in arb_condition(),
        rate in 0.0..=1.0_f64,
        magnitude in 0.0..=1.0_f64,
        op_seed in any::<u64>(),
    ) {
        let p = parent(seed, 1);
        let child = specialize(
            &p,
            condition,
            &GeneOverrides::default(),
            rate,
            magnitude,
            &mut StdRng::seed_from_u64(op_seed),
        );
        prop_assert!(child.genes().validate().is_ok());
        prop_assert_eq!(child.specialization(), Some(condition));
        prop_assert_eq!(child.generation(), p.generation() + 1);
    }

    #[test]
    fn out_of_range_operator_inputs_are_tolerated(
        seed in any::<u64>(),
        rate in -5.0..5.0_f64,
        magnitude in -5.0..5.0_f64,
    ) {
        let p = parent(seed, 0);
        let child = mutate(&p, rate, magnitude, &mut StdRng::seed_from_u64(seed));
        prop_assert!(child.genes().validate().is_ok());
    }
}
