//! Best-ever individuals of a run.

use forja_eval::FitnessResult;
use forja_expr::Expr;
use std::collections::HashSet;

/// A scored expression.
#[derive(Debug, Clone)]
pub struct Member {
    /// Canonical expression text.
    pub expression: String,
    /// The tree.
    pub expr: Expr,
    /// Its score.
    pub result: FitnessResult,
}

/// Bounded set of the best valid individuals, unique by canonical text and
/// sorted by descending fitness.
#[derive(Debug, Clone)]
pub struct HallOfFame {
    capacity: usize,
    members: Vec<Member>,
    seen: HashSet<String>,
}

impl HallOfFame {
    /// An empty hall of fame holding at most `capacity` members.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            members: Vec::with_capacity(capacity + 1),
            seen: HashSet::new(),
        }
    }

    /// Offers a scored individual. Invalid results and duplicates are ignored.
    ///
    /// Returns whether the individual was admitted.
    pub fn offer(&mut self, expr: &Expr, result: &FitnessResult) -> bool {
        if !result.valid || !result.fitness.is_finite() || self.capacity == 0 {
            return false;
        }
        let expression = expr.to_string();
        if self.seen.contains(&expression) {
            return false;
        }
        if self.members.len() == self.capacity
            && self
                .members
                .last()
                .is_some_and(|worst| worst.fitness() >= result.fitness)
        {
            return false;
        }

        let position = self
            .members
            .partition_point(|m| m.result.fitness >= result.fitness);
        self.seen.insert(expression.clone());
        self.members.insert(
            position,
            Member {
                expression,
                expr: expr.clone(),
                result: result.clone(),
            },
        );
        if self.members.len() > self.capacity
            && let Some(evicted) = self.members.pop()
        {
            self.seen.remove(&evicted.expression);
        }
        true
    }

    /// Best member.
    pub fn best(&self) -> Option<&Member> {
        self.members.first()
    }

    /// The best `n` members.
    pub fn top(&self, n: usize) -> &[Member] {
        &self.members[..n.min(self.members.len())]
    }

    /// All members, best first.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Whether `expression` is a member.
    pub fn contains(&self, expression: &str) -> bool {
        self.seen.contains(expression)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the hall of fame is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Member {
    /// Fitness of the member.
    pub const fn fitness(&self) -> f64 {
        self.result.fitness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forja_expr::parse_expr;

    fn scored(fitness: f64, valid: bool) -> FitnessResult {
        FitnessResult {
            fitness,
            valid,
            error: None,
            ..FitnessResult::invalid(fitness, "", 1.0)
        }
    }

    #[test]
    fn test_sorted_and_bounded() {
        let mut hof = HallOfFame::new(3);
        for (text, fitness) in [("Close", 1.0), ("Volume", 3.0), ("abs(Close)", 2.0), ("neg(Close)", 0.5)] {
            hof.offer(&parse_expr(text).unwrap(), &scored(fitness, true));
        }
        let fitness: Vec<f64> = hof.members().iter().map(Member::fitness).collect();
        assert_eq!(fitness, vec![3.0, 2.0, 1.0]);
        assert!(!hof.contains("neg(Close)"));

        assert!(hof.offer(&parse_expr("abs(Volume)").unwrap(), &scored(5.0, true)));
        assert_eq!(hof.len(), 3);
        assert_eq!(hof.best().unwrap().expression, "abs(Volume)");
        assert!(!hof.contains("Close"));
    }

    #[test]
    fn test_unique_by_expression() {
        let mut hof = HallOfFame::new(5);
        let expr = parse_expr("ts_mean(Close, 10)").unwrap();
        assert!(hof.offer(&expr, &scored(1.0, true)));
        assert!(!hof.offer(&expr, &scored(2.0, true)));
        assert_eq!(hof.len(), 1);
    }

    #[test]
    fn test_invalid_results_are_ignored() {
        let mut hof = HallOfFame::new(5);
        assert!(!hof.offer(&parse_expr("Close").unwrap(), &scored(-10.0, false)));
        assert!(hof.is_empty());
        assert_eq!(hof.top(3).len(), 0);
    }
}
