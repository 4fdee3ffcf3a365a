use crate::error::Result;
use crate::projector::{DEFAULT_ITERATIONS, DEFAULT_PERPLEXITY, DEFAULT_SEED};
use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "Qdrant/all-MiniLM-L6-v2-onnx";
pub const DEFAULT_ANCHOR_FILE: &str = ".anchors";
pub const DEFAULT_CACHE_FILE: &str = ".brws";

/// Values read from `brws_config.*` and `BRWS_*` environment variables.
#[derive(Deserialize, Default)]
pub struct BrwsConfig {
    pub folder: Option<String>,
    pub model: Option<String>,
    pub anchor_file: Option<String>,
    pub cache_file: Option<String>,
    pub model_cache_dir: Option<String>,
    pub perplexity: Option<f64>,
    pub iterations: Option<usize>,
    pub seed: Option<u64>,
    pub verbose: Option<bool>,
}

impl BrwsConfig {
    pub fn try_from(config: &Config) -> Self {
        BrwsConfig {
            folder: config.get("folder").ok(),
            model: config.get("model").ok(),
            anchor_file: config.get("anchor_file").ok(),
            cache_file: config.get("cache_file").ok(),
            model_cache_dir: config.get("model_cache_dir").ok(),
            perplexity: config.get("perplexity").ok(),
            iterations: config.get("iterations").ok(),
            seed: config.get("seed").ok(),
            verbose: config.get("verbose").ok(),
        }
    }
}

/// Command-line values; `None` means "not given", so lower layers apply.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub folder: Option<PathBuf>,
    pub model: Option<String>,
    pub anchor_file: Option<String>,
    pub cache_file: Option<String>,
    pub model_cache_dir: Option<PathBuf>,
    pub perplexity: Option<f64>,
    pub iterations: Option<usize>,
    pub seed: Option<u64>,
    pub verbose: bool,
    pub no_cache: bool,
    pub clear_cache: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub folder: PathBuf,
    pub model: String,
    pub anchor_file: String,
    pub cache_file: String,
    pub model_cache_dir: Option<PathBuf>,
    pub perplexity: f64,
    pub iterations: usize,
    pub seed: u64,
    pub verbose: bool,
    pub use_cache: bool,
    pub clear_cache: bool,
}

impl Settings {
    pub fn new(overrides: &Overrides) -> Result<Self> {
        let config = Config::builder()
            .add_source(ConfigFile::with_name("brws_config").required(false))
            .add_source(Environment::with_prefix("BRWS"))
            .build()?;
        Ok(Self::resolve(&BrwsConfig::try_from(&config), overrides))
    }

    pub fn resolve(file: &BrwsConfig, cli: &Overrides) -> Self {
        let folder = cli
            .folder
            .clone()
            .or_else(|| file.folder.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let model = cli
            .model
            .clone()
            .or_else(|| file.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let anchor_file = cli
            .anchor_file
            .clone()
            .or_else(|| file.anchor_file.clone())
            .unwrap_or_else(|| DEFAULT_ANCHOR_FILE.to_string());

        let cache_file = cli
            .cache_file
            .clone()
            .or_else(|| file.cache_file.clone())
            .unwrap_or_else(|| DEFAULT_CACHE_FILE.to_string());

        let model_cache_dir = cli
            .model_cache_dir
            .clone()
            .or_else(|| file.model_cache_dir.as_ref().map(PathBuf::from));

        Self {
            folder,
            model,
            anchor_file,
            cache_file,
            model_cache_dir,
            perplexity: cli.perplexity.or(file.perplexity).unwrap_or(DEFAULT_PERPLEXITY),
            iterations: cli.iterations.or(file.iterations).unwrap_or(DEFAULT_ITERATIONS),
            seed: cli.seed.or(file.seed).unwrap_or(DEFAULT_SEED),
            verbose: cli.verbose || file.verbose.unwrap_or(false),
            use_cache: !cli.no_cache,
            clear_cache: cli.clear_cache,
        }
    }

    pub fn anchor_path(&self) -> PathBuf {
        self.folder.join(&self.anchor_file)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.folder.join(&self.cache_file)
    }

    pub fn print_config(&self) {
        println!("folder={}", self.folder.display());
        println!("model={}", self.model);
        println!("anchor_file={}", self.anchor_file);
        println!("cache_file={}", self.cache_file);
        match &self.model_cache_dir {
            Some(dir) => println!("model_cache_dir={}", dir.display()),
            None => println!("model_cache_dir=<fastembed default>"),
        }
        println!("perplexity={}", self.perplexity);
        println!("iterations={}", self.iterations);
        println!("seed={}", self.seed);
        println!("verbose={}", self.verbose);
        println!("use_cache={}", self.use_cache);
        println!("clear_cache={}", self.clear_cache);
    }
}

/// `env_logger` on stderr; `RUST_LOG` wins unless `verbose` forces debug.
pub fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        for noisy in ["ort", "wgpu", "eframe", "egui_winit", "winit"] {
            builder.filter_module(noisy, log::LevelFilter::Warn);
        }
    }
    builder.target(env_logger::Target::Stderr).init();
}
