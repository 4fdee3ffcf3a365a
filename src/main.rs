use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use brws::cache::{temp_path, FolderCache, NoCache, VectorCache};
use brws::config::{self, Overrides, Settings};
use brws::embedder::{supported_model_names, FastEmbedder};
use brws::error::BrwsError;
use brws::loader::{list_documents, read_anchors, FormatExtractor, Vectorizer};
use brws::pipeline::embed_all;
use brws::points::PointTable;
use brws::projector::{stack_vectors, Projector};
use brws::viewer::Viewer;

#[derive(Parser)]
#[command(name = "brws")]
#[command(version = "0.1")]
#[command(about = "Browse a folder of documents as a semantic map", long_about = None)]
struct Cli {
    /// Folder to scan (defaults to the current directory)
    #[arg(value_name = "FOLDER")]
    folder: Option<PathBuf>,

    /// Embedding model name
    #[arg(short, long)]
    model: Option<String>,

    /// Anchor file, relative to the folder
    #[arg(short, long = "anchors")]
    anchors: Option<String>,

    /// Embed every file again instead of using the cache
    #[arg(long)]
    no_cache: bool,

    /// Delete the folder's cache before embedding
    #[arg(long)]
    clear_cache: bool,

    /// Cache filename inside the folder
    #[arg(long)]
    cache_file: Option<String>,

    /// Where embedding models are stored
    #[arg(long)]
    model_cache_dir: Option<PathBuf>,

    #[arg(long)]
    perplexity: Option<f64>,

    #[arg(long)]
    iterations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long)]
    verbose: bool,

    /// Print the resolved settings and exit
    #[arg(long)]
    show_config: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            folder: self.folder.clone(),
            model: self.model.clone(),
            anchor_file: self.anchors.clone(),
            cache_file: self.cache_file.clone(),
            model_cache_dir: self.model_cache_dir.clone(),
            perplexity: self.perplexity,
            iterations: self.iterations,
            seed: self.seed,
            verbose: self.verbose,
            no_cache: self.no_cache,
            clear_cache: self.clear_cache,
        }
    }
}

fn load_embedder(settings: &Settings) -> FastEmbedder {
    match FastEmbedder::new(&settings.model, settings.model_cache_dir.clone()) {
        Ok(embedder) => embedder,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!();
            eprintln!("Choose one of the supported models with --model (or BRWS_MODEL):");
            for name in supported_model_names() {
                eprintln!("  {}", name);
            }
            eprintln!();
            eprintln!("Models are downloaded on first use; make sure the network is reachable,");
            eprintln!("or point --model-cache-dir (BRWS_MODEL_CACHE_DIR) at a directory that");
            eprintln!("already holds the model files.");
            process::exit(1);
        }
    }
}

/// Ctrl-C while embedding raises `interrupted` so the cache is written before
/// exiting. A second Ctrl-C, or one at any other time, exits at once.
struct Interrupt {
    interrupted: Arc<AtomicBool>,
    embedding: Arc<AtomicBool>,
}

impl Interrupt {
    fn install() -> Result<Self> {
        let interrupted = Arc::new(AtomicBool::new(false));
        let embedding = Arc::new(AtomicBool::new(false));
        let (flag, guard) = (interrupted.clone(), embedding.clone());
        ctrlc::set_handler(move || {
            if guard.load(Ordering::SeqCst) && !flag.swap(true, Ordering::SeqCst) {
                eprintln!("Interrupted, saving the cache...");
            } else {
                process::exit(130);
            }
        })
        .context("Failed to install the Ctrl-C handler")?;
        Ok(Self {
            interrupted,
            embedding,
        })
    }
}

fn browse(settings: &Settings, interrupt: &Interrupt) -> Result<()> {
    let anchors = read_anchors(&settings.anchor_path())?;
    let embedder = load_embedder(settings);
    log::debug!("Model {} produces {}-d vectors", settings.model, embedder.dimensions());

    let extractor = FormatExtractor;
    let vectorizer = Vectorizer::new(&extractor, &embedder);
    let mut cache: Box<dyn VectorCache + '_> = if settings.use_cache {
        Box::new(FolderCache::open(&settings.folder, &settings.cache_file, vectorizer)?)
    } else {
        Box::new(NoCache::new(vectorizer))
    };
    if settings.clear_cache {
        cache.clear()?;
    }

    let cache_path = settings.cache_path();
    let exclude = [settings.anchor_path(), temp_path(&cache_path), cache_path];
    let documents = list_documents(&settings.folder, &exclude)?;

    interrupt.embedding.store(true, Ordering::SeqCst);
    let embedded = embed_all(
        &anchors,
        documents,
        &embedder,
        cache.as_mut(),
        &interrupt.interrupted,
    );
    let closed = cache.close();
    interrupt.embedding.store(false, Ordering::SeqCst);
    let embedded = embedded?;
    closed.context("Failed to write the embedding cache")?;

    if embedded.documents.is_empty() {
        anyhow::bail!("No documents to plot in {}", settings.folder.display());
    }

    let matrix = stack_vectors(&embedded.vectors)?;
    let projector = Projector::new(settings.perplexity, settings.iterations, settings.seed);
    let coordinates = projector.project(&matrix)?;
    let table = PointTable::assemble(anchors.len(), &embedded.documents, &coordinates)?;

    Viewer::new(table, anchors, settings.folder.clone())?.run()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = Settings::new(&args.overrides())?;
    config::init_logging(settings.verbose);

    if args.show_config {
        settings.print_config();
        return Ok(());
    }

    let interrupt = Interrupt::install()?;
    if let Err(err) = browse(&settings, &interrupt) {
        match err.downcast_ref::<BrwsError>() {
            Some(BrwsError::UnsupportedPlatform(os)) => eprintln!(
                "Opening files is not supported on {}; open them from {} manually.",
                os,
                settings.folder.display()
            ),
            Some(BrwsError::Interrupted) => process::exit(130),
            _ => {}
        }
        return Err(err);
    }
    Ok(())
}
