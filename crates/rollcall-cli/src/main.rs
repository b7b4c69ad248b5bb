//! Thin D-Bus client for rollcalld; never runs detection itself.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[zbus::proxy(
    interface = "org.freedesktop.Rollcall1",
    default_service = "org.freedesktop.Rollcall1",
    default_path = "/org/freedesktop/Rollcall1"
)]
trait Rollcall {
    async fn register_face(&self, name: &str, image: &[u8]) -> zbus::Result<String>;
    async fn mark_attendance(&self, image: &[u8]) -> zbus::Result<String>;
    async fn list_faces(&self) -> zbus::Result<String>;
    async fn list_records(&self) -> zbus::Result<String>;
    async fn export_log(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new person from a captured image
    Register {
        /// Display name for the person
        #[arg(short, long)]
        name: String,
        /// Image file with the face to register
        image: PathBuf,
    },
    /// Mark attendance from a captured image
    Mark {
        /// Image file with the face to match
        image: PathBuf,
    },
    /// List registered people
    List,
    /// Show attendance records
    Log,
    /// Export the attendance log as plain text
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = zbus::Connection::session()
        .await
        .context("connecting to the session bus — is rollcalld running?")?;
    let proxy = RollcallProxy::new(&connection).await?;

    match cli.command {
        Commands::Register { name, image } => {
            let bytes = read_image(&image)?;
            let reply = proxy.register_face(&name, &bytes).await?;
            let summary: serde_json::Value = serde_json::from_str(&reply)?;
            println!(
                "Registered {} (id {})",
                summary["name"].as_str().unwrap_or(&name),
                summary["id"].as_str().unwrap_or("?")
            );
        }
        Commands::Mark { image } => {
            let bytes = read_image(&image)?;
            let reply = proxy.mark_attendance(&bytes).await?;
            let record: serde_json::Value = serde_json::from_str(&reply)?;
            println!(
                "Attendance marked for {} at {}",
                record["name"].as_str().unwrap_or("?"),
                record["timestamp"].as_str().unwrap_or("?")
            );
        }
        Commands::List => {
            let reply = proxy.list_faces().await?;
            let faces: Vec<serde_json::Value> = serde_json::from_str(&reply)?;
            if faces.is_empty() {
                println!("No faces registered");
            }
            for face in faces {
                println!(
                    "{}  registered {}",
                    face["name"].as_str().unwrap_or("?"),
                    face["registeredAt"].as_str().unwrap_or("?")
                );
            }
        }
        Commands::Log => {
            let reply = proxy.list_records().await?;
            let records: Vec<serde_json::Value> = serde_json::from_str(&reply)?;
            if records.is_empty() {
                println!("No attendance records");
            }
            for record in records {
                println!(
                    "{}  {}",
                    record["timestamp"].as_str().unwrap_or("?"),
                    record["name"].as_str().unwrap_or("?")
                );
            }
        }
        Commands::Export { output } => {
            let text = proxy.export_log().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &text)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
                None => print!("{text}"),
            }
        }
        Commands::Status => {
            println!("{}", proxy.status().await?);
        }
    }

    Ok(())
}

/// Decode the image and re-encode it as PNG, so the daemon accepts any
/// format this build of the `image` crate can read.
fn read_image(path: &Path) -> Result<Vec<u8>> {
    let img = image::open(path).with_context(|| format!("reading image {}", path.display()))?;
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .context("encoding image as PNG")?;
    Ok(bytes)
}
