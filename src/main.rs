//! vistoria-pdf CLI: export inspection reports to PDF

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use vistoria_pdf::inspection::{JsonInspectionSource, StaticAuth, UserProfile};
use vistoria_pdf::rendering::layout::LayoutOptions;
use vistoria_pdf::rendering::raster::SoftwareBackend;
use vistoria_pdf::report::template::{render_report_html, ReportContext, TemplateOptions};
use vistoria_pdf::resources::DefaultLoader;
use vistoria_pdf::{user_message, ExportConfig, RenderedReport, ReportExporter};

#[derive(Parser)]
#[command(name = "vistoria-pdf")]
#[command(version)]
#[command(about = "Export building inspection reports to paginated PDF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a report to PDF
    Export {
        /// Report HTML, or inspection JSON with --inspection
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (.pdf is appended when missing)
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Treat INPUT as an inspection JSON file
        #[arg(long)]
        inspection: bool,

        /// Inspection id to export (defaults to the first record)
        #[arg(long)]
        id: Option<String>,

        /// JSON export configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Directory local image paths are resolved against
        #[arg(long, value_name = "DIR")]
        base_dir: Option<PathBuf>,

        /// Photos per environment page
        #[arg(long, default_value = "6")]
        photos_per_page: usize,

        /// Inspector named when the record's inspector is unknown
        #[arg(long, value_name = "NAME")]
        inspector: Option<String>,
    },

    /// Render an inspection JSON file to report HTML
    RenderHtml {
        #[arg(value_name = "INSPECTION_JSON")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[arg(long)]
        id: Option<String>,

        #[arg(long, default_value = "6")]
        photos_per_page: usize,

        #[arg(long, value_name = "NAME")]
        inspector: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        match e.downcast_ref::<vistoria_pdf::Error>() {
            Some(err) => eprintln!("{}", user_message(err)),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Export {
            input,
            output,
            inspection,
            id,
            config,
            base_dir,
            photos_per_page,
            inspector,
        } => {
            let config = match config {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading config {}", path.display()))?;
                    ExportConfig::from_json(&json)?
                }
                None => ExportConfig::default(),
            };
            let html = if inspection {
                let options = TemplateOptions {
                    photos_per_page,
                    marker_class: config.page_marker_class.clone(),
                    ..Default::default()
                };
                inspection_html(&input, id.as_deref(), inspector, &options)?
            } else {
                std::fs::read_to_string(&input)
                    .with_context(|| format!("reading report {}", input.display()))?
            };
            let base_dir = base_dir
                .or_else(|| input.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."));

            let layout = LayoutOptions::default();
            let report = RenderedReport::from_html(&html, &layout)?;
            let loader = DefaultLoader::new(&base_dir, Duration::from_millis(config.image_timeout_ms))?;
            let exporter = ReportExporter::new(
                config,
                Arc::new(SoftwareBackend::new().with_layout(layout)),
                Arc::new(loader),
            );
            let path = exporter.export_to_file(&report, &output).await?;
            println!("{}", path.display());
        }
        Commands::RenderHtml {
            input,
            output,
            id,
            photos_per_page,
            inspector,
        } => {
            let options = TemplateOptions {
                photos_per_page,
                ..Default::default()
            };
            let html = inspection_html(&input, id.as_deref(), inspector, &options)?;
            match output {
                Some(path) => std::fs::write(&path, html)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{}", html),
            }
        }
    }
    Ok(())
}

fn inspection_html(
    path: &Path,
    id: Option<&str>,
    inspector: Option<String>,
    options: &TemplateOptions,
) -> anyhow::Result<String> {
    let source = JsonInspectionSource::open(path)
        .with_context(|| format!("reading inspections {}", path.display()))?;
    let id = match id {
        Some(id) => id.to_string(),
        None => source
            .first()
            .map(|i| i.id.clone())
            .context("inspection file holds no records")?,
    };
    let auth = StaticAuth(inspector.map(|name| UserProfile {
        name,
        ..Default::default()
    }));
    let ctx = ReportContext::resolve(&source, &auth, &id)?;
    Ok(render_report_html(&ctx, options))
}
