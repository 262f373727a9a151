//! Elitist evolutionary driver: keep the best parents, fill the rest of the
//! population with their mutated copies.

use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::config::SimConfig;
use crate::error::Result;
use crate::evaluation::{Candidate, Evaluate, GenerationOutcome, PolicyId, Session};
use crate::policy::{FeedForwardNet, NetworkPolicy};

/// Best policy seen so far.
#[derive(Clone, Debug)]
pub struct Winner {
    pub net: FeedForwardNet,
    pub fitness: f64,
    pub generation: u64,
}

/// Per-generation summary kept by the driver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationStats {
    pub generation: u64,
    pub best_fitness: f64,
    pub max_size: usize,
    pub best_size_ever: usize,
}

pub struct ElitistDriver {
    population: Vec<(PolicyId, FeedForwardNet)>,
    next_id: u64,
    elites: usize,
    sigma: f32,
    threshold: f32,
    session: Session,
    winner: Option<Winner>,
    history: Vec<GenerationStats>,
    rng: SmallRng,
}

impl ElitistDriver {
    pub fn new(config: &SimConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = SmallRng::seed_from_u64(seed);
        let layout = config.network_layout();
        let mut population = Vec::with_capacity(config.num_episodes);
        for id in 0..config.num_episodes as u64 {
            population.push((PolicyId(id), FeedForwardNet::random(&layout, &mut rng)?));
        }
        Ok(Self {
            next_id: config.num_episodes as u64,
            population,
            elites: config.evolution.elites.clamp(1, config.num_episodes),
            sigma: config.evolution.mutation_sigma,
            threshold: config.episode.decision_threshold,
            session: Session::default(),
            winner: None,
            history: Vec::new(),
            rng,
        })
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn winner(&self) -> Option<&Winner> {
        self.winner.as_ref()
    }

    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    pub fn population(&self) -> &[(PolicyId, FeedForwardNet)] {
        &self.population
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.population
            .iter()
            .map(|(id, net)| Candidate::new(*id, NetworkPolicy::new(net.clone(), self.threshold)))
            .collect()
    }

    /// Evaluate the current population once and breed the next one.
    pub fn step<E: Evaluate + ?Sized>(&mut self, evaluator: &mut E) -> Result<GenerationStats> {
        let generation = self.session.generation;
        let outcome = evaluator.evaluate(self.session, self.candidates())?;
        self.session = outcome.session;

        let ranked = self.rank(&outcome);
        let best_fitness = ranked.first().map_or(0.0, |&(_, f)| f);
        if let Some(&(idx, fitness)) = ranked.first() {
            if self.winner.as_ref().is_none_or(|w| fitness > w.fitness) {
                log::info!("new winner {} with fitness {fitness:.4}", self.population[idx].0);
                self.winner = Some(Winner {
                    net: self.population[idx].1.clone(),
                    fitness,
                    generation,
                });
            }
        }

        let stats = GenerationStats {
            generation,
            best_fitness,
            max_size: outcome.max_size,
            best_size_ever: self.session.best_size_ever,
        };
        self.history.push(stats);
        self.reproduce(&ranked);
        Ok(stats)
    }

    /// Population indices sorted by fitness, best first. Policies missing
    /// from the outcome count as zero.
    fn rank(&self, outcome: &GenerationOutcome) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self
            .population
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (i, outcome.fitness.get(id).copied().unwrap_or(0.0)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    fn reproduce(&mut self, ranked: &[(usize, f64)]) {
        let size = self.population.len();
        let parents: Vec<FeedForwardNet> = ranked
            .iter()
            .take(self.elites)
            .map(|&(i, _)| self.population[i].1.clone())
            .collect();
        if parents.is_empty() {
            return;
        }

        let mut next = Vec::with_capacity(size);
        for (rank, &(i, _)) in ranked.iter().take(self.elites).enumerate() {
            next.push((self.population[i].0, parents[rank].clone()));
        }
        let mut k = 0;
        while next.len() < size {
            let mut child = parents[k % parents.len()].clone();
            child.mutate(self.sigma, &mut self.rng);
            next.push((PolicyId(self.next_id), child));
            self.next_id += 1;
            k += 1;
        }
        self.population = next;
    }

    /// Run `generations` rounds and return the best policy seen.
    pub fn run<E: Evaluate + ?Sized>(&mut self, evaluator: &mut E, generations: usize) -> Result<Option<Winner>> {
        log::info!(
            "training {} policies for {generations} generations",
            self.population.len()
        );
        for _ in 0..generations {
            let stats = self.step(evaluator)?;
            log::info!(
                "generation {}: best fitness {:.4}, max size {}, best ever {}",
                stats.generation,
                stats.best_fitness,
                stats.max_size,
                stats.best_size_ever
            );
        }
        Ok(self.winner.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;

    /// Scores policies by their id so the ranking is predictable.
    struct ById {
        calls: u64,
    }

    impl Evaluate for ById {
        fn evaluate(&mut self, mut session: Session, population: Vec<Candidate>) -> Result<GenerationOutcome> {
            self.calls += 1;
            let fitness: AHashMap<PolicyId, f64> = population.iter().map(|c| (c.id, c.id.0 as f64)).collect();
            session.generation += 1;
            session.best_size_ever = session.best_size_ever.max(3);
            Ok(GenerationOutcome {
                session,
                fitness,
                max_size: 3,
                ticks: 1,
            })
        }
    }

    fn config(n: usize, elites: usize) -> SimConfig {
        let mut config = SimConfig::default();
        config.num_episodes = n;
        config.evolution.elites = elites;
        config.evolution.hidden_layers = vec![4];
        config
    }

    #[test]
    fn test_elites_survive_and_population_refills() {
        let mut driver = ElitistDriver::new(&config(6, 2), 1).unwrap();
        let mut eval = ById { calls: 0 };
        let stats = driver.step(&mut eval).unwrap();
        assert_eq!(stats.best_fitness, 5.0);
        assert_eq!(stats.generation, 0);

        let ids: Vec<PolicyId> = driver.population().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![PolicyId(5), PolicyId(4), PolicyId(6), PolicyId(7), PolicyId(8), PolicyId(9)]);
        assert_eq!(driver.session().generation, 1);
        assert_eq!(driver.winner().map(|w| w.fitness), Some(5.0));
    }

    #[test]
    fn test_run_keeps_best_winner() {
        let mut driver = ElitistDriver::new(&config(4, 1), 2).unwrap();
        let mut eval = ById { calls: 0 };
        let winner = driver.run(&mut eval, 3).unwrap().unwrap();
        assert_eq!(eval.calls, 3);
        assert_eq!(driver.history().len(), 3);
        // fresh children get ever larger ids, so every generation beats the last
        assert_eq!(winner.generation, 2);
        assert_eq!(winner.fitness, 9.0);
        assert_eq!(winner.net.layer_sizes(), vec![35, 4, 4]);
    }
}
