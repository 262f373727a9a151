use std::io::{BufRead, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use snake_neuroevo::arcade::{Arcade, InputEvent};
use snake_neuroevo::evaluation::{Candidate, Evaluator, PolicyId, Session};
use snake_neuroevo::evolution::ElitistDriver;
use snake_neuroevo::persistence;
use snake_neuroevo::policy::NetworkPolicy;
use snake_neuroevo::render::{self, BoardView, Layout, Overlay};
use snake_neuroevo::{Direction, SimConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evolve a population and save the best policy
    Train {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        generations: Option<usize>,
        /// Where the winner is written
        #[arg(long, default_value = "winner.bin")]
        out: PathBuf,
    },
    /// Run a saved policy on a single board
    Replay {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long, default_value = "winner.bin")]
        winner: PathBuf,
        /// Write the last frame as a PPM image
        #[arg(long)]
        frame: Option<PathBuf>,
    },
    /// Steer the snakes from stdin: w/a/s/d, p pause, r reset, q quit
    Play {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    episodes: Option<usize>,
    /// Seconds between ticks
    #[arg(long)]
    tick_interval: Option<f64>,
}

impl CommonArgs {
    fn load(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };
        if let Some(n) = self.episodes {
            config.num_episodes = n;
        }
        if let Some(t) = self.tick_interval {
            config.tick_interval_seconds = t;
        }
        if self.seed.is_some() {
            config.evolution.seed = self.seed;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Train {
            common,
            generations,
            out,
        } => train(common.load()?, generations, &out),
        Command::Replay { common, winner, frame } => {
            let mut config = common.load()?;
            if common.tick_interval.is_none() {
                config.tick_interval_seconds = 0.05;
            }
            replay(config, &winner, frame.as_deref())
        }
        Command::Play { common } => {
            let mut config = common.load()?;
            if common.tick_interval.is_none() {
                config.tick_interval_seconds = 0.3;
            }
            play(config)
        }
    }
}

fn session_seed(config: &SimConfig) -> u64 {
    config.evolution.seed.unwrap_or_else(rand::random)
}

fn train(config: SimConfig, generations: Option<usize>, out: &Path) -> Result<()> {
    let seed = session_seed(&config);
    let generations = generations.unwrap_or(config.evolution.generations);
    log::info!("seed {seed}, layout {:?}", config.network_layout());

    let mut driver = ElitistDriver::new(&config, seed)?;
    let mut evaluator = Evaluator::new(config, seed.wrapping_add(1))?;
    let winner = driver.run(&mut evaluator, generations)?;

    match winner {
        Some(w) => {
            persistence::save_policy(out, &w.net, w.fitness)
                .with_context(|| format!("saving winner to {}", out.display()))?;
            log::info!("winner from generation {} has fitness {:.4}", w.generation, w.fitness);
        }
        None => log::warn!("no generation ran, nothing saved"),
    }
    Ok(())
}

fn replay(mut config: SimConfig, winner: &Path, frame: Option<&Path>) -> Result<()> {
    let (net, fitness) =
        persistence::load_policy(winner).with_context(|| format!("loading winner from {}", winner.display()))?;
    log::info!("replaying policy saved with fitness {fitness:.4}");

    config.num_episodes = 1;
    config.episodes_per_row = 1;
    config.episode.parallel_advance = false;
    let threshold = config.episode.decision_threshold;
    let seed = session_seed(&config);
    let layout = Layout::new(&config);

    let mut evaluator = Evaluator::new(config, seed)?;
    let population = vec![Candidate::new(PolicyId(0), NetworkPolicy::new(net, threshold))];
    let mut last: Vec<BoardView> = Vec::new();
    let mut overlay = Overlay::default();

    let outcome = evaluator.run_generation(Session::default(), population, |eval, session| {
        overlay = Overlay {
            generation: session.generation,
            max_size: eval.max_size(),
            best_size_ever: session.best_size_ever,
        };
        if let Some(ep) = eval.episodes().first() {
            last = vec![BoardView::capture(0, ep.grid(), ep.snake())];
            print!("{}", render::ascii_frame(&last, &overlay));
        }
    })?;
    let fitness = outcome.fitness.get(&PolicyId(0)).copied().unwrap_or(0.0);
    println!("ticks {}, size {}, fitness {fitness:.4}", outcome.ticks, outcome.max_size);

    if let Some(path) = frame {
        let canvas = render::rasterize(&layout, &last, Some(&overlay));
        let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        canvas
            .write_ppm(BufWriter::new(file))
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("last frame written to {}", path.display());
    }
    Ok(())
}

fn parse_command(line: &str) -> Option<InputEvent> {
    Some(match line.trim() {
        "w" => InputEvent::Turn(Direction::Up),
        "s" => InputEvent::Turn(Direction::Down),
        "a" => InputEvent::Turn(Direction::Left),
        "d" => InputEvent::Turn(Direction::Right),
        "p" => InputEvent::Pause,
        "r" => InputEvent::Reset,
        "q" => InputEvent::Quit,
        _ => return None,
    })
}

fn play(config: SimConfig) -> Result<()> {
    let seed = session_seed(&config);
    let mut arcade = Arcade::new(&config, seed)?;

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if let Some(event) = parse_command(&line) {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
        let _ = tx.send(InputEvent::Quit);
    });

    arcade.run(
        || rx.try_iter().collect(),
        |arcade| print!("{}", render::ascii_frame(&arcade.views(), &arcade.overlay())),
    )?;
    Ok(())
}
