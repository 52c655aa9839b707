use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facewatch_core::{AuditContext, FaceEncoder, FeatureVector, IdentityId, MatchEngine, Screener};
use facewatch_store::{NewIdentity, SqliteStore};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;
mod encoder;

use config::Config;
use encoder::JsonEncoder;

#[derive(Parser)]
#[command(name = "facewatch", about = "Face matching against enrolled records, with audit trail")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new identity from encoder output containing exactly one face
    Enroll {
        #[arg(long)]
        name: String,
        /// Case or offence category
        #[arg(long)]
        case_type: String,
        #[arg(long)]
        alias: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Reference to the enrollment photo
        #[arg(long)]
        image_ref: Option<String>,
        /// Encoder output (JSON array of feature vectors)
        encodings: PathBuf,
    },
    /// Add another reference vector to an enrolled identity
    AddReference {
        id: i64,
        encodings: PathBuf,
    },
    /// Screen a submission against all enrolled identities
    Screen {
        /// Encoder output (JSON array of feature vectors)
        encodings: PathBuf,
        /// Submitted image; its SHA-256 becomes the audit `image_digest`.
        /// Without it the digest covers the encoder output instead.
        #[arg(long)]
        image: Option<PathBuf>,
        /// Reference recorded in the audit trail (defaults to the image's
        /// file name, else the encodings file name)
        #[arg(long)]
        image_ref: Option<String>,
    },
    /// List active enrolled identities
    List,
    /// Deactivate an enrolled identity
    Remove {
        id: i64,
    },
    /// Show recent audit records
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Print JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one audit record in full
    Show {
        id: Uuid,
    },
    /// Show screening statistics
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let engine = MatchEngine::new(config.dimension, config.tolerance)
        .context("invalid matching configuration")?;
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("opening store at {}", config.db_path.display()))?;

    tracing::debug!(
        db = %config.db_path.display(),
        tolerance = engine.tolerance(),
        dimension = engine.dimension(),
        "facewatch starting"
    );

    match cli.command {
        Commands::Enroll {
            name,
            case_type,
            alias,
            description,
            image_ref,
            encodings,
        } => {
            let vector = single_face(&encodings, &engine)?;
            let new = NewIdentity {
                name,
                alias,
                case_type,
                description,
                image_ref,
            };
            let id = store.enroll(&new, &[vector])?;
            println!("Enrolled {} as identity {id}", new.name);
        }
        Commands::AddReference { id, encodings } => {
            let vector = single_face(&encodings, &engine)?;
            store.add_reference(IdentityId(id), &vector)?;
            println!("Added reference vector to identity {id}");
        }
        Commands::Screen {
            encodings,
            image,
            image_ref,
        } => {
            let bytes = std::fs::read(&encodings)
                .with_context(|| format!("reading {}", encodings.display()))?;
            let context = submission_context(&encodings, &bytes, image.as_deref(), image_ref)?;

            let screener = Screener::new(JsonEncoder, &store, &store, engine);
            let report = screener.screen(&bytes, &context)?;

            let faces = report
                .faces
                .iter()
                .enumerate()
                .map(|(index, face)| -> Result<serde_json::Value> {
                    let d = &face.decision;
                    let name = match d.identity_id {
                        Some(id) => store.identity(id)?.map(|i| i.name),
                        None => None,
                    };
                    Ok(serde_json::json!({
                        "face": index,
                        "outcome": d.outcome,
                        "identity_id": d.identity_id,
                        "name": name,
                        "nearest_id": d.nearest_id,
                        "distance": d.distance,
                        "confidence": d.confidence,
                        "tolerance": d.tolerance,
                        "decided_at": d.decided_at,
                        "audit_id": face.audit.as_ref().ok().map(|r| r.id),
                        "audit_error": face.audit.as_ref().err().map(|e| e.to_string()),
                    }))
                })
                .collect::<Result<Vec<_>>>()?;

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "image_ref": context.image_ref,
                    "image_digest": context.image_digest,
                    "faces": faces,
                }))?
            );

            let failures = report.audit_failures().count();
            if failures > 0 {
                eprintln!("warning: {failures} decision(s) could not be written to the audit log");
                std::process::exit(2);
            }
        }
        Commands::List => {
            let identities = store.list_identities()?;
            if identities.is_empty() {
                println!("No identities enrolled");
            }
            for i in identities {
                println!(
                    "{:>6}  {:<24} {:<16} refs={}  enrolled {}",
                    i.id,
                    i.name,
                    i.case_type,
                    i.reference_count,
                    i.enrolled_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Remove { id } => {
            if store.deactivate(IdentityId(id))? {
                println!("Identity {id} removed");
            } else {
                bail!("no active identity with id {id}");
            }
        }
        Commands::History { limit, json } => {
            for record in store.recent_audits(limit)? {
                if json {
                    println!("{}", record.to_json_line()?);
                } else {
                    println!(
                        "{}  {:<16} {:<24} identity={} confidence={}",
                        record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                        record.outcome,
                        record.image_ref,
                        record
                            .identity_id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "-".into()),
                        record
                            .confidence
                            .map(|c| format!("{c:.1}%"))
                            .unwrap_or_else(|| "-".into()),
                    );
                }
            }
        }
        Commands::Show { id } => match store.audit(id)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => bail!("no audit record with id {id}"),
        },
        Commands::Stats => {
            let stats = store.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// Read encoder output that must contain exactly one face of the configured length.
fn single_face(path: &Path, engine: &MatchEngine) -> Result<FeatureVector> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut faces = JsonEncoder.encode(&bytes)?;
    if faces.len() != 1 {
        bail!(
            "expected exactly one face in {}, found {}",
            path.display(),
            faces.len()
        );
    }
    let vector = faces.remove(0);
    engine.check_dimension(&vector)?;
    Ok(vector)
}

/// Audit context for a screening request. The digest covers the image when
/// one is given, otherwise the encoder output that was screened.
fn submission_context(
    encodings: &Path,
    encoded: &[u8],
    image: Option<&Path>,
    image_ref: Option<String>,
) -> Result<AuditContext> {
    let Some(image) = image else {
        let image_ref = image_ref.unwrap_or_else(|| file_label(encodings));
        return Ok(AuditContext::for_image(image_ref, encoded));
    };
    let pixels = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let image_ref = image_ref.unwrap_or_else(|| file_label(image));
    Ok(AuditContext::for_image(image_ref, &pixels))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
