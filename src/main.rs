#![cfg(not(tarpaulin_include))]

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use panotour::config::Config;
use panotour::storage::{FsObjectStore, FsRecordStore};
use panotour::{app, bundle, saving, viewer};

#[derive(Parser)]
#[command(name = "panotour")]
#[command(about = "360° virtual tour builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the editor web server
    Serve {
        /// Address to bind, overrides PANOTOUR_ADDR
        #[arg(long)]
        addr: Option<String>,

        /// Data directory, overrides PANOTOUR_DATA_DIR
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Render a saved draft as a standalone HTML bundle
    Export {
        /// Draft file (.bin.gz)
        draft: PathBuf,

        /// Output HTML file
        output: PathBuf,
    },
    /// Turn an HTML bundle back into a draft
    Import {
        /// Bundle produced by `export` or the editor
        input: PathBuf,

        /// Draft file to write
        draft: PathBuf,
    },
    /// Allow link sharing for a published tour
    Unlock {
        tour_id: String,
    },
    /// Print the scenes and hotspots of a published tour
    Show {
        tour_id: String,
    },
}

/// Entry point for the editor server and the maintenance commands.
///
/// Settings come from `PANOTOUR_*` environment variables, see [`Config`].
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Commands::Serve { addr, data_dir } => {
            if let Some(addr) = addr {
                config.addr = addr;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            app::run(config).await
        }
        Commands::Export { draft, output } => {
            let graph = saving::load_draft(&draft)?;
            let objects = FsObjectStore::new(config.storage_dir(), &config.storage_url());
            let bundle = bundle::export(&graph, &objects)?;
            fs::write(&output, bundle.as_bytes())?;
            println!(
                "Exported {} scene(s) to {}",
                bundle.scene_count,
                output.display()
            );
            Ok(())
        }
        Commands::Import { input, draft } => {
            let html = fs::read_to_string(&input)?;
            let graph = bundle::import(&html)?;
            saving::save_draft(&graph, &draft)?;
            println!(
                "Imported {} scene(s), {} hotspot(s) into {}",
                graph.len(),
                graph.hotspot_count(),
                draft.display()
            );
            Ok(())
        }
        Commands::Unlock { tour_id } => {
            FsRecordStore::new(config.records_dir()).set_paid(&tour_id, true)?;
            println!(
                "Sharing enabled: {}",
                viewer::view_link(&config.origin, &tour_id)
            );
            Ok(())
        }
        Commands::Show { tour_id } => {
            let records = FsRecordStore::new(config.records_dir());
            let tour = viewer::load(&records, &tour_id)?;
            println!("{} ({})", tour.project_name, tour.id);
            println!(
                "initial scene: {}",
                tour.graph.initial_scene().unwrap_or("-")
            );
            for scene in tour.graph.scenes() {
                println!("  {} \"{}\"", scene.id, scene.name);
                for hotspot in &scene.hotspots {
                    println!(
                        "    {} -> {} (pitch {:.1}, yaw {:.1})",
                        hotspot.id, hotspot.target, hotspot.position.pitch, hotspot.position.yaw
                    );
                }
            }
            for warning in &tour.warnings {
                println!("  warning: {}", warning);
            }
            Ok(())
        }
    }
}
