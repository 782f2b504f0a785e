//! three-export CLI
//!
//! Export scene description files to three.js JSON.

use clap::{Parser, Subcommand};
use log::info;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use three_export::{load_scene, ExportConfig, Exporter};

#[derive(Parser)]
#[command(name = "three-export")]
#[command(author, version, about = "Export scene descriptions to three.js JSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene description to a three.js JSON document
    Export {
        /// Input scene description (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long, required_unless_present = "stdout")]
        output: Option<PathBuf>,

        /// Export the active object's subtree instead of the whole scene
        #[arg(long)]
        no_scene: bool,

        /// Only export selected objects
        #[arg(long)]
        selected_only: bool,

        /// Skip geometries (and with them materials, textures, images)
        #[arg(long)]
        no_geometries: bool,

        /// Skip materials (and with them textures, images)
        #[arg(long)]
        no_materials: bool,

        /// Skip textures (and with them images)
        #[arg(long)]
        no_textures: bool,

        /// Skip images
        #[arg(long)]
        no_images: bool,

        /// Export actions as animation clips
        #[arg(long)]
        animations: bool,

        /// Embed every image as a data URI
        #[arg(long)]
        embed_images: bool,

        /// Decimal places for floats (0 to 8)
        #[arg(long, default_value = "5", value_parser = clap::value_parser!(u8).range(0..=8))]
        precision: u8,

        /// Write everything on one line
        #[arg(long)]
        compact: bool,

        /// Write the document to standard output
        #[arg(long)]
        stdout: bool,
    },

    /// Show what an export of a scene description would contain
    Info {
        /// Input scene description (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            input,
            output,
            no_scene,
            selected_only,
            no_geometries,
            no_materials,
            no_textures,
            no_images,
            animations,
            embed_images,
            precision,
            compact,
            stdout,
        } => {
            let config = ExportConfig {
                export_scene: !no_scene,
                selected_only,
                export_geometries: !no_geometries,
                export_materials: !no_materials,
                export_textures: !no_textures,
                export_images: !no_images,
                export_animations: animations,
                embed_images,
                float_precision: precision as usize,
                pretty_print: !compact,
            };
            export(&input, output.as_deref(), config, stdout)?;
        }
        Commands::Info { input } => {
            show_info(&input)?;
        }
    }

    Ok(())
}

/// Directory relative image paths are resolved against.
fn asset_root(input: &Path) -> PathBuf {
    input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn export(
    input: &Path,
    output: Option<&Path>,
    config: ExportConfig,
    stdout: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading scene from {:?}...", input);
    let scene = load_scene(input)?;
    let exporter = Exporter::new(&scene, config)?.with_asset_root(asset_root(input));

    if stdout {
        exporter.write_to(BufWriter::new(io::stdout().lock()))?;
        return Ok(());
    }
    if let Some(output) = output {
        let summary = exporter.write_file(output)?;
        info!(
            "Exported {} objects, {} geometries, {} materials to {:?}",
            summary.objects, summary.geometries, summary.materials, output
        );
    }
    Ok(())
}

fn show_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let scene = load_scene(input)?;
    let exporter = Exporter::new(&scene, ExportConfig::default())?;
    let summary = exporter.summary();

    println!("Scene \"{}\":", scene.name);
    println!("  Objects: {} ({} exported)", scene.objects.len(), summary.objects);
    println!("  Meshes: {}", scene.meshes.len());
    println!("  Materials: {}", scene.materials.len());
    println!("  Textures: {}", scene.textures.len());
    println!("  Images: {}", scene.images.len());
    println!("  Armatures: {}", scene.armatures.len());
    println!("  Actions: {}", scene.actions.len());
    println!("\nDefault export:");
    println!("  Geometries: {}", summary.geometries);
    println!("  Materials: {}", summary.materials);
    println!("  Textures: {}", summary.textures);
    println!("  Images: {} ({} embedded)", summary.images, summary.embedded_images);
    println!("  Skeletons: {}", summary.skeletons);

    Ok(())
}
