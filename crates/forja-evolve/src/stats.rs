//! Per-generation statistics.

use serde::{Deserialize, Serialize};

/// Summary of one evaluated generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation number, 0 for the initial population.
    pub generation: usize,
    /// Best fitness in the population.
    pub max_fitness: f64,
    /// Mean fitness.
    pub mean_fitness: f64,
    /// Worst fitness.
    pub min_fitness: f64,
    /// Population standard deviation of fitness.
    pub std_fitness: f64,
    /// Individuals with a valid score.
    pub valid_count: usize,
    /// Fitness evaluations performed in this generation.
    pub evaluations: usize,
    /// Fitness evaluations since the start of the run.
    pub cumulative_evaluations: usize,
    /// Seconds since the start of the run.
    pub elapsed_secs: f64,
    /// Canonical text of the best individual.
    pub best_expression: String,
}

impl GenerationStats {
    /// Summarizes `(expression, fitness, valid)` triples.
    pub fn compute<'a>(
        generation: usize,
        scored: impl IntoIterator<Item = (&'a str, f64, bool)>,
        evaluations: usize,
        cumulative_evaluations: usize,
        elapsed_secs: f64,
    ) -> Self {
        let mut n = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        let mut valid_count = 0;
        let mut best_expression = String::new();

        for (expression, fitness, valid) in scored {
            n += 1;
            sum += fitness;
            sum_sq += fitness * fitness;
            if fitness > max {
                max = fitness;
                best_expression = expression.to_string();
            }
            min = min.min(fitness);
            valid_count += usize::from(valid);
        }

        let (mean, std) = if n == 0 {
            (f64::NAN, f64::NAN)
        } else {
            let mean = sum / n as f64;
            (mean, (sum_sq / n as f64 - mean * mean).max(0.0).sqrt())
        };

        Self {
            generation,
            max_fitness: max,
            mean_fitness: mean,
            min_fitness: min,
            std_fitness: std,
            valid_count,
            evaluations,
            cumulative_evaluations,
            elapsed_secs,
            best_expression,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_compute() {
        let stats = GenerationStats::compute(
            2,
            [("a", 1.0, true), ("b", 3.0, true), ("c", -10.0, false)],
            3,
            9,
            0.5,
        );
        assert_eq!(stats.max_fitness, 3.0);
        assert_eq!(stats.min_fitness, -10.0);
        assert_relative_eq!(stats.mean_fitness, -2.0);
        assert_relative_eq!(stats.std_fitness, (110.0_f64 / 3.0 - 4.0).sqrt());
        assert_eq!(stats.valid_count, 2);
        assert_eq!(stats.best_expression, "b");
        assert_eq!(stats.cumulative_evaluations, 9);
    }
}
