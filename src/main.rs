use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storefront_images::image::mime::content_type_for_extension;
use storefront_images::models::{Category, Config, SizeClass, UploadedImage, VariantSet};
use storefront_images::naming;
use storefront_images::pipeline::ImagePipeline;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "storefront-images")]
#[command(about = "Process and manage storefront image variants")]
struct CliArgs {
    /// Overrides UPLOAD_ROOT.
    #[arg(long, value_name = "DIR")]
    upload_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render and store every size variant of an image file.
    Upload {
        path: PathBuf,
        #[arg(long, default_value = "products")]
        category: Category,
    },
    /// Print the relative URL of a stored variant.
    Url {
        filename: String,
        #[arg(long, default_value = "products")]
        category: Category,
        #[arg(long, default_value = "medium")]
        size: SizeClass,
    },
    /// Remove every size variant of a stored image.
    Delete {
        filename: String,
        #[arg(long, default_value = "products")]
        category: Category,
    },
}

/// Stored filenames keyed by size class, plus the content type to serve them with.
fn upload_report(stored: &VariantSet) -> serde_json::Value {
    let content_type = stored
        .original()
        .and_then(naming::extension)
        .map(|ext| content_type_for_extension(&ext))
        .unwrap_or("application/octet-stream");
    serde_json::json!({
        "content_type": content_type,
        "variants": stored,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_images=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(upload_root) = args.upload_root {
        config.upload_root = upload_root;
    }
    let pipeline = ImagePipeline::new(config);

    match args.command {
        Command::Upload { path, category } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            match pipeline
                .process_upload(&UploadedImage::new(filename, data), category)
                .await
            {
                Ok(Some(stored)) => {
                    println!("{}", serde_json::to_string_pretty(&upload_report(&stored))?);
                }
                Ok(None) => println!("(no file)"),
                Err(e) => {
                    error!("Upload failed: {}", e);
                    eprintln!("{}", e.user_message());
                    std::process::exit(1);
                }
            }
        }
        Command::Url {
            filename,
            category,
            size,
        } => match pipeline.image_url(&filename, category, size) {
            Some(url) => println!("{}", url),
            None => println!("(no image)"),
        },
        Command::Delete { filename, category } => {
            let removed = pipeline.delete_variants(&filename, category).await;
            println!("Removed {} files", removed);
        }
    }

    Ok(())
}
