use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use docgraph_core::{
    ArtifactStore, Config, ConversionMode, DeclaredPrefixes, DescriptorFormat, Dialect, FileArtifactStore,
    MappingDescriptor, Pipeline,
};

#[derive(Parser)]
#[command(name = "docgraph")]
#[command(about = "Schema-driven conversion of exchange documents into property graphs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ./docgraph.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a mapping descriptor from a class model
    Generate {
        /// Class model: CMF XML (.xml, .cmf), JSON or YAML
        model: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format, when not implied by the output extension
        #[arg(long)]
        format: Option<DescriptorFormat>,

        /// Also keep the descriptor in the data directory's mappings folder
        #[arg(long)]
        save: bool,
    },
    /// Convert documents into a property graph
    Convert {
        /// Documents or directories of documents
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Mapping descriptor (JSON or YAML)
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Promote identifier-carrying elements and recognize associations by name
        #[arg(long)]
        dynamic: bool,

        /// Prefix for synthetic identities
        #[arg(long)]
        batch_tag: Option<String>,

        /// Write the merged graph as JSON
        #[arg(long)]
        graph: Option<PathBuf>,

        /// Write graph-store statements
        #[arg(long)]
        emit: Option<PathBuf>,

        /// Statement dialect: cypher or surrealql
        #[arg(long)]
        dialect: Option<Dialect>,

        /// Node property holding the identity in statements
        #[arg(long)]
        id_property: Option<String>,

        /// Reject documents that use undeclared namespace prefixes
        #[arg(long)]
        strict_prefixes: bool,

        /// Keep graph, statements and run record in the data directory
        #[arg(long)]
        save: bool,

        /// Apply statements to the embedded graph database
        #[cfg(feature = "surreal")]
        #[arg(long)]
        apply: bool,
    },
    /// Print the default configuration
    Config,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docgraph_core={0},docgraph_cli={0}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path).wrap_err_with(|| format!("loading {}", path.display()))?,
        None => Config::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            model,
            output,
            format,
            save,
        } => {
            let pipeline = Pipeline::new(load_config(cli.config.as_ref())?);
            let generation = pipeline.generate_descriptor(&model)?;

            let format = match (format, output.as_deref()) {
                (Some(format), _) => format,
                (None, Some(path)) => DescriptorFormat::from_path(path)?,
                (None, None) => DescriptorFormat::Json,
            };
            let rendered = generation.descriptor.render(format)?;

            match output {
                Some(path) => {
                    fs::write(&path, &rendered).wrap_err_with(|| format!("writing {}", path.display()))?;
                    let d = &generation.descriptor;
                    eprintln!(
                        "Wrote {} ({} objects, {} associations, {} references, {} augmentations)",
                        path.display(),
                        d.objects.len(),
                        d.associations.len(),
                        d.references.len(),
                        d.augmentations.len()
                    );
                }
                None => println!("{}", rendered),
            }
            if save {
                let storage = &pipeline.config().storage;
                let artifacts = FileArtifactStore::with_config(storage);
                let stem = model
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("descriptor");
                let extension = match format {
                    DescriptorFormat::Json => "json",
                    DescriptorFormat::Yaml => "yaml",
                };
                let key = format!("{}/{}.{}", storage.mappings_dir, stem, extension);
                artifacts.write(&key, rendered.as_bytes())?;
                eprintln!("Saved descriptor under {}", storage.mappings_path().display());
            }
            if !generation.warnings.is_empty() {
                eprintln!("{} warning(s); run with -v to see them", generation.warnings.len());
            }
        }
        Commands::Convert {
            inputs,
            mapping,
            dynamic,
            batch_tag,
            graph,
            emit,
            dialect,
            id_property,
            strict_prefixes,
            save,
            #[cfg(feature = "surreal")]
            apply,
        } => {
            let started_at = chrono::Utc::now();

            let mut config = load_config(cli.config.as_ref())?;
            if dynamic {
                config.conversion.mode = ConversionMode::Dynamic;
            }
            if let Some(tag) = batch_tag {
                config.conversion.batch_tag = Some(tag);
            }
            if let Some(dialect) = dialect {
                config.emit.dialect = dialect;
            }
            if let Some(property) = id_property {
                config.emit.id_property = property;
            }

            tracing::info!(
                mode = %config.conversion.mode,
                dialect = %config.emit.dialect,
                inputs = inputs.len(),
                "starting conversion"
            );

            let mut pipeline = Pipeline::new(config);
            if strict_prefixes {
                pipeline = pipeline.with_validator(DeclaredPrefixes);
            }

            let descriptor = mapping
                .as_deref()
                .map(MappingDescriptor::load)
                .transpose()?;
            let converter = pipeline.converter(descriptor)?;

            let documents = pipeline.collect_documents(&inputs)?;
            let batch = pipeline.read_inputs(&documents)?;

            let cancel = pipeline.cancellation();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            let bar = ProgressBar::new(batch.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
                    .map_err(|e| eyre!(e))?
                    .progress_chars("=> "),
            );
            let progress = |key: &str| {
                bar.set_message(key.to_string());
                bar.inc(1);
            };
            let outcome = pipeline.convert(&converter, &batch, Some(&progress));
            bar.finish_and_clear();

            for failure in &outcome.failures {
                eprintln!("  failed: {}", failure.error);
            }
            eprint!("{}", outcome.report);

            if let Some(path) = &graph {
                let json = serde_json::to_string_pretty(&outcome.graph)?;
                fs::write(path, json).wrap_err_with(|| format!("writing {}", path.display()))?;
            }

            let statements = pipeline.emit(&outcome.graph);
            if let Some(path) = &emit {
                let script = docgraph_core::render_script(&statements);
                fs::write(path, script).wrap_err_with(|| format!("writing {}", path.display()))?;
                eprintln!("Wrote {} statements to {}", statements.len(), path.display());
            }

            if save {
                let artifacts = FileArtifactStore::with_config(&pipeline.config().storage);
                let record = pipeline.save_run(&artifacts, started_at, &outcome, &statements)?;
                eprintln!(
                    "Saved run {} under {}",
                    record.id,
                    pipeline.config().storage.graphs_path().display()
                );
            }

            #[cfg(feature = "surreal")]
            if apply {
                let path = pipeline.config().storage.database_path();
                let store = docgraph_core::SurrealStore::open(&path).await?;
                let summary = pipeline.apply(&store, &statements).await?;
                eprintln!("Applied {} statements to {}", summary.statements, path.display());
            }

            if !outcome.is_complete() {
                return Err(eyre!(
                    "{} of {} documents failed",
                    outcome.failures.len(),
                    batch.len()
                ));
            }
        }
        Commands::Config => {
            print!("{}", Config::default_config_string());
        }
    }

    Ok(())
}
