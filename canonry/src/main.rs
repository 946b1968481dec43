use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use canonry_core::{
    CanonryResult, EngineConfig, OptimizationEngine, Variant, VariantDomain,
};

/// How many recently built records each worker keeps alive, so the weak
/// cache sees a mix of live hits and reclaimed entries
const HELD_RECORDS: usize = 16;

#[derive(Parser)]
#[command(name = "canonry")]
#[command(about = "Memory-optimization engine demo driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a synthetic bulk-loading phase and print the statistics report
    Demo {
        /// Number of parallel worker threads
        #[arg(long, default_value_t = 4)]
        threads: usize,

        /// Total records to construct
        #[arg(long, default_value_t = 100_000)]
        records: usize,

        /// Number of distinct shapes the records are drawn from
        #[arg(long, default_value_t = 64)]
        shapes: usize,

        /// RNG seed for reproducible workloads
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

/// Six-way facing attribute of a geometry record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Facing {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Facing {
    const ALL: [Facing; 6] = [
        Facing::Down,
        Facing::Up,
        Facing::North,
        Facing::South,
        Facing::West,
        Facing::East,
    ];
}

/// facing x shaded x emissive: the 24-point discrete-attribute domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct QuadKey {
    facing: Facing,
    shaded: bool,
    emissive: bool,
}

impl VariantDomain for QuadKey {
    const CARDINALITY: usize = 24;

    fn index(&self) -> Option<usize> {
        Some((self.facing as usize) * 4 + (self.shaded as usize) * 2 + self.emissive as usize)
    }

    fn from_index(index: usize) -> Option<Self> {
        if index >= Self::CARDINALITY {
            return None;
        }
        Some(Self {
            facing: Facing::ALL[index / 4],
            shaded: (index / 2) % 2 == 1,
            emissive: index % 2 == 1,
        })
    }
}

/// A distinct shape the synthetic records are stamped from
struct Shape {
    id: usize,
    name: String,
    key: QuadKey,
    vertices: Vec<i32>,
}

impl Shape {
    fn random(id: usize, rng: &mut StdRng) -> Self {
        let key = QuadKey {
            facing: Facing::ALL[rng.gen_range(0..6)],
            shaded: rng.gen_bool(0.5),
            emissive: rng.gen_bool(0.1),
        };
        // 4 vertices x 8 words, a typical baked-quad layout
        let vertices = (0..32).map(|_| rng.gen_range(-1024..1024)).collect();
        Self {
            id,
            name: format!("minecraft:block/shape_{id}"),
            key,
            vertices,
        }
    }
}

type RecordCache =
    canonry_core::WeakValueCache<(usize, QuadKey), Variant<QuadKey, Arc<[i32]>>>;

fn run_demo(threads: usize, records: usize, shape_count: usize, seed: u64) -> CanonryResult<()> {
    let threads = threads.max(1);
    let engine = OptimizationEngine::new(EngineConfig::default())?;
    let factory = engine.variant_factory::<QuadKey>("quad_factory");
    let cache: Arc<RecordCache> = engine.weak_cache("record_cache");

    let mut rng = StdRng::seed_from_u64(seed);
    let shapes: Vec<Shape> = (0..shape_count.max(1))
        .map(|id| Shape::random(id, &mut rng))
        .collect();

    engine.on_phase_start();
    let started = Instant::now();

    std::thread::scope(|scope| {
        for worker in 0..threads {
            let engine = &engine;
            let factory = &factory;
            let cache = &cache;
            let shapes = &shapes;
            scope.spawn(move || {
                let mut rng =
                    StdRng::seed_from_u64(seed ^ (worker as u64).wrapping_mul(0x9e37_79b9));
                let mut held = Vec::with_capacity(HELD_RECORDS);
                for _ in 0..records / threads {
                    let shape = &shapes[rng.gen_range(0..shapes.len())];
                    // a fresh, structurally redundant instance each time,
                    // the way a host loader would produce them
                    let vertices = engine.canonicalize_vertices(Arc::from(shape.vertices.clone()));
                    let _name = engine.intern(&shape.name);
                    let key = shape.key;
                    let record = cache.get_or_create((shape.id, key), || {
                        factory.create(vertices.clone(), key)
                    });
                    if held.len() == HELD_RECORDS {
                        held.remove(0);
                    }
                    held.push(record);
                }
            });
        }
    });

    let elapsed = started.elapsed();
    let report = engine.on_phase_end();
    info!(?elapsed, records, threads, "synthetic bulk load finished");
    println!("{report}");
    Ok(())
}

fn main() -> CanonryResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo {
            threads,
            records,
            shapes,
            seed,
        } => run_demo(threads, records, shapes, seed),
    }
}
