//! The generational search loop.

use crate::config::EvolutionConfig;
use crate::fitness_fn::FitnessFunction;
use crate::hall_of_fame::{HallOfFame, Member};
use crate::memory::{CollectTrigger, MemoryMonitor};
use crate::stats::GenerationStats;
use crate::variation::Variation;
use forja_eval::FitnessResult;
use forja_expr::{DimensionTracker, Expr, PrimitiveSet, TreeGenerator};
use forja_traits::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Cooperative cancellation flag, checked between generations.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests that the run stop after the current generation.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// All configured generations ran.
    Completed,
    /// Best fitness stopped improving.
    EarlyStopped,
    /// A [`StopHandle`] was triggered.
    Cancelled,
    /// The initial population had no valid individual.
    NoValidIndividuals,
    /// Resident memory stayed above the ceiling.
    MemoryLimit,
}

/// A factor with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFactor {
    /// Canonical expression text.
    pub expression: String,
    /// Its score.
    pub result: FitnessResult,
}

/// State handed to sinks at checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Last completed generation.
    pub generation: usize,
    /// Fitness evaluations so far.
    pub total_evaluations: usize,
    /// Best fitness so far, if any individual was valid.
    pub best_fitness: Option<f64>,
    /// Hall of fame, best first.
    pub hall_of_fame: Vec<RankedFactor>,
    /// Stats of every generation so far.
    pub history: Vec<GenerationStats>,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningResult {
    /// Best expression found.
    pub best_expression: Option<String>,
    /// Its score.
    pub best: Option<FitnessResult>,
    /// Best entries of the hall of fame.
    pub top: Vec<RankedFactor>,
    /// Stats of every generation.
    pub history: Vec<GenerationStats>,
    /// Wall-clock seconds.
    pub runtime_secs: f64,
    /// Fitness evaluations performed.
    pub total_evaluations: usize,
    /// Why the run ended.
    pub termination: Termination,
    /// Operator applications that fell back to a default dimension.
    pub dimension_fallbacks: usize,
}

/// Receives run progress. Errors are logged and never abort the run.
pub trait RunSink {
    /// Called every `checkpoint_every` generations and once at the end.
    fn checkpoint(&mut self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }

    /// Called once with the final result.
    fn finish(&mut self, _result: &MiningResult) -> Result<()> {
        Ok(())
    }
}

/// Genetic-programming search over factor expressions.
pub struct Miner {
    config: EvolutionConfig,
    fitness: Arc<dyn FitnessFunction>,
    primitives: PrimitiveSet,
    tracker: DimensionTracker,
    stop: StopHandle,
}

impl fmt::Debug for Miner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Miner")
            .field("config", &self.config)
            .field("primitives", &self.primitives.len())
            .finish_non_exhaustive()
    }
}

/// Run-local state of the loop.
struct RunState {
    hall_of_fame: HallOfFame,
    cache: HashMap<String, FitnessResult>,
    history: Vec<GenerationStats>,
    total_evaluations: usize,
}

impl RunState {
    fn snapshot(&self, generation: usize) -> Snapshot {
        Snapshot {
            generation,
            total_evaluations: self.total_evaluations,
            best_fitness: self.hall_of_fame.best().map(|m| m.fitness()),
            hall_of_fame: ranked(self.hall_of_fame.members()),
            history: self.history.clone(),
        }
    }
}

fn ranked(members: &[Member]) -> Vec<RankedFactor> {
    members
        .iter()
        .map(|m| RankedFactor {
            expression: m.expression.clone(),
            result: m.result.clone(),
        })
        .collect()
}

impl Miner {
    /// Creates a miner.
    ///
    /// # Errors
    ///
    /// Returns [`forja_traits::ForjaError::InvalidConfig`] when the
    /// configuration is inconsistent.
    pub fn new(
        config: EvolutionConfig,
        fitness: Arc<dyn FitnessFunction>,
        primitives: PrimitiveSet,
        tracker: DimensionTracker,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            fitness,
            primitives,
            tracker,
            stop: StopHandle::default(),
        })
    }

    /// Handle that cancels the run from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The configuration.
    pub const fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Runs the search to completion.
    ///
    /// Generation 0 is always evaluated. Sink failures are logged and
    /// skipped.
    pub fn run(&mut self, sinks: &mut [&mut dyn RunSink]) -> Result<MiningResult> {
        let start = Instant::now();
        let cfg = &self.config;
        let mut rng = cfg
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        let generator = TreeGenerator::new(&self.primitives, &self.tracker, cfg.max_nodes);
        let variation = Variation::new(
            &self.primitives,
            &self.tracker,
            cfg.max_depth,
            cfg.max_nodes,
            cfg.mutation_weights,
        );
        let monitor = MemoryMonitor::new(cfg.gc_every, cfg.memory_limit_mb);

        info!(
            population = cfg.population_size,
            generations = cfg.generations,
            primitives = self.primitives.len(),
            terminals = self.primitives.terminals().len(),
            "starting factor mining"
        );

        let mut population = generator.ramped_half_and_half(
            &mut rng,
            cfg.population_size,
            cfg.init_min_depth,
            cfg.init_max_depth,
        );
        let mut state = RunState {
            hall_of_fame: HallOfFame::new(cfg.hall_of_fame_size),
            cache: HashMap::new(),
            history: Vec::new(),
            total_evaluations: 0,
        };
        let mut best_so_far = f64::NEG_INFINITY;
        let mut stale = 0;
        let mut last_checkpoint = None;
        let mut generation = 0;

        let termination = loop {
            let keys: Vec<String> = population.iter().map(ToString::to_string).collect();
            let (scores, evaluations) = self.evaluate(&population, &keys, &mut state.cache);
            state.total_evaluations += evaluations;
            for (expr, result) in population.iter().zip(&scores) {
                state.hall_of_fame.offer(expr, result);
            }

            let stats = GenerationStats::compute(
                generation,
                keys.iter()
                    .zip(&scores)
                    .map(|(k, r)| (k.as_str(), r.fitness, r.valid)),
                evaluations,
                state.total_evaluations,
                start.elapsed().as_secs_f64(),
            );
            info!(
                generation,
                max = stats.max_fitness,
                mean = stats.mean_fitness,
                valid = stats.valid_count,
                evaluations,
                best = %stats.best_expression,
                "generation complete"
            );
            let valid_count = stats.valid_count;
            let generation_best = stats.max_fitness;
            state.history.push(stats);

            if generation == 0 && valid_count == 0 {
                error!(
                    population = population.len(),
                    "no valid individual in the initial population; check the panel columns and fitness data requirements"
                );
                break Termination::NoValidIndividuals;
            }

            if generation_best > best_so_far + cfg.early_stop_min_delta {
                best_so_far = generation_best;
                stale = 0;
            } else {
                stale += 1;
            }

            if cfg.checkpoint_every > 0 && generation > 0 && generation % cfg.checkpoint_every == 0 {
                notify_checkpoint(sinks, &state.snapshot(generation));
                last_checkpoint = Some(generation);
            }

            if let Some(trigger) = monitor.check(generation) {
                let live: HashSet<&str> = keys
                    .iter()
                    .map(String::as_str)
                    .chain(state.hall_of_fame.members().iter().map(|m| m.expression.as_str()))
                    .collect();
                let before = state.cache.len();
                state.cache.retain(|k, _| live.contains(k.as_str()));
                state.cache.shrink_to_fit();
                debug!(generation, ?trigger, before, after = state.cache.len(), "collected evaluation cache");

                if let CollectTrigger::OverLimit { resident_mb } = trigger {
                    warn!(generation, resident_mb, "resident memory above the ceiling");
                    if cfg.abort_on_memory_limit && monitor.over_limit() {
                        error!(generation, "memory ceiling exceeded after collection, stopping");
                        break Termination::MemoryLimit;
                    }
                }
            }

            if generation >= cfg.generations {
                break Termination::Completed;
            }
            if cfg.early_stop_patience > 0 && stale >= cfg.early_stop_patience {
                info!(generation, patience = cfg.early_stop_patience, "early stop");
                break Termination::EarlyStopped;
            }
            if self.stop.is_stopped() {
                info!(generation, "run cancelled");
                break Termination::Cancelled;
            }

            population = self.breed(&mut rng, &variation, &population, &scores, &state.hall_of_fame);
            generation += 1;
        };

        if last_checkpoint != Some(generation) {
            notify_checkpoint(sinks, &state.snapshot(generation));
        }

        let best = state.hall_of_fame.best();
        let result = MiningResult {
            best_expression: best.map(|m| m.expression.clone()),
            best: best.map(|m| m.result.clone()),
            top: ranked(state.hall_of_fame.top(cfg.top_n)),
            history: state.history,
            runtime_secs: start.elapsed().as_secs_f64(),
            total_evaluations: state.total_evaluations,
            termination,
            dimension_fallbacks: self.tracker.fallback_count(),
        };
        info!(
            ?termination,
            best = result.best_expression.as_deref().unwrap_or("<none>"),
            evaluations = result.total_evaluations,
            runtime_secs = result.runtime_secs,
            "mining finished"
        );

        for sink in sinks.iter_mut() {
            if let Err(e) = sink.finish(&result) {
                warn!(error = %e, "failed to record the final result");
            }
        }
        Ok(result)
    }

    /// Scores a population, evaluating only expressions missing from the cache.
    fn evaluate(
        &self,
        population: &[Expr],
        keys: &[String],
        cache: &mut HashMap<String, FitnessResult>,
    ) -> (Vec<FitnessResult>, usize) {
        let mut seen = HashSet::new();
        let pending: Vec<(&String, &Expr)> = keys
            .iter()
            .zip(population)
            .filter(|&(k, _)| !cache.contains_key(k) && seen.insert(k.as_str()))
            .collect();

        let fitness = self.fitness.as_ref();
        let fresh: Vec<(String, FitnessResult)> = if self.config.parallel {
            pending
                .par_iter()
                .map(|(k, expr)| ((*k).clone(), fitness.evaluate(expr)))
                .collect()
        } else {
            pending
                .iter()
                .map(|(k, expr)| ((*k).clone(), fitness.evaluate(expr)))
                .collect()
        };
        let evaluations = fresh.len();
        cache.extend(fresh);

        let floor = fitness.floor();
        let scores = keys
            .iter()
            .map(|k| {
                cache
                    .get(k)
                    .cloned()
                    .unwrap_or_else(|| FitnessResult::invalid(floor, "missing from cache", 0.0))
            })
            .collect();
        (scores, evaluations)
    }

    /// Builds the next generation: elites first, then varied offspring of
    /// tournament winners.
    fn breed(
        &self,
        rng: &mut StdRng,
        variation: &Variation<'_>,
        population: &[Expr],
        scores: &[FitnessResult],
        hall_of_fame: &HallOfFame,
    ) -> Vec<Expr> {
        let cfg = &self.config;
        let mut next: Vec<Expr> = hall_of_fame
            .top(cfg.elite_size)
            .iter()
            .map(|m| m.expr.clone())
            .collect();

        while next.len() < cfg.population_size {
            let a = &population[tournament(rng, scores, cfg.tournament_size)];
            let b = &population[tournament(rng, scores, cfg.tournament_size)];
            let (c1, c2) = if rng.random_bool(cfg.crossover_prob) {
                variation.crossover(rng, a, b)
            } else {
                (a.clone(), b.clone())
            };
            for child in [c1, c2] {
                if next.len() == cfg.population_size {
                    break;
                }
                let child = if rng.random_bool(cfg.mutation_prob) {
                    variation.mutate(rng, &child)
                } else {
                    child
                };
                next.push(child);
            }
        }
        next
    }
}

/// Index of the fittest of `size` uniformly drawn contestants.
///
/// A valid contestant always beats an invalid one, whatever the floor.
fn tournament<R: Rng + ?Sized>(rng: &mut R, scores: &[FitnessResult], size: usize) -> usize {
    let beats = |a: &FitnessResult, b: &FitnessResult| {
        (a.valid, a.fitness).partial_cmp(&(b.valid, b.fitness)) == Some(std::cmp::Ordering::Greater)
    };
    let mut winner = rng.random_range(0..scores.len());
    for _ in 1..size {
        let challenger = rng.random_range(0..scores.len());
        if beats(&scores[challenger], &scores[winner]) {
            winner = challenger;
        }
    }
    winner
}

fn notify_checkpoint(sinks: &mut [&mut dyn RunSink], snapshot: &Snapshot) {
    for sink in sinks.iter_mut() {
        if let Err(e) = sink.checkpoint(snapshot) {
            warn!(generation = snapshot.generation, error = %e, "checkpoint failed");
        }
    }
}
