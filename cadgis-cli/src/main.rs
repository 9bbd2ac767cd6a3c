//! cadgis - CLI tool to ingest CAD drawings into a georeferenced feature
//! store and read them back as reports or GeoJSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cadgis_core::{
    drawing_stats, export_geojson, ingest_dxf_file, open_store, reproject_drawing, CancelToken,
    FeatureFilter, FeatureKind, IngestOptions, LinearUnit,
};

/// Ingest CAD drawings (DXF) into a queryable, georeferenced feature store.
#[derive(Parser, Debug)]
#[command(name = "cadgis")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Feature store database path
    #[arg(short, long, default_value = "features.db")]
    store: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a DXF file
    Ingest {
        /// Input DXF file path
        input: PathBuf,

        /// Drawing id (defaults to the file stem)
        #[arg(short, long)]
        drawing: Option<String>,

        /// Project id
        #[arg(short, long, default_value = "default")]
        project: String,

        /// Native CRS of the drawing, as an EPSG code
        #[arg(long)]
        srid: Option<u32>,

        /// Override the drawing's declared unit (m, ft, usft, ...)
        #[arg(long)]
        unit: Option<String>,

        /// Georeferencing anchor as "x,y" in native CRS units
        #[arg(long)]
        anchor: Option<String>,

        /// Print the full ingestion report as JSON
        #[arg(long)]
        report: bool,
    },

    /// Export features as GeoJSON
    Export {
        /// Restrict to one project
        #[arg(short, long)]
        project: Option<String>,

        /// Restrict to one drawing
        #[arg(short, long)]
        drawing: Option<String>,

        /// Restrict to one layer
        #[arg(short, long)]
        layer: Option<String>,

        /// Restrict to one feature kind (point, line, polygon, text)
        #[arg(short, long)]
        kind: Option<String>,

        /// Bounding box filter as "min_lon,min_lat,max_lon,max_lat"
        #[arg(long)]
        bbox: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print per-drawing statistics recomputed from the store
    Stats {
        /// Drawing id
        drawing: String,
    },

    /// Assign a native CRS to a stored drawing and recompute canonical
    /// geometry
    Reproject {
        /// Drawing id
        drawing: String,

        /// Native CRS as an EPSG code
        #[arg(long)]
        srid: u32,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut conn = open_store(&args.store)
        .with_context(|| format!("Failed to open store {}", args.store.display()))?;

    match args.command {
        Command::Ingest {
            input,
            drawing,
            project,
            srid,
            unit,
            anchor,
            report,
        } => {
            let drawing_id = drawing.unwrap_or_else(|| {
                input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "drawing".to_string())
            });

            let mut options = IngestOptions::new(&drawing_id, &project);
            options.srid_override = srid;
            if let Some(name) = &unit {
                options.unit_override = Some(
                    LinearUnit::from_name(name)
                        .with_context(|| format!("Unknown unit '{}'", name))?,
                );
            }
            if let Some(anchor) = &anchor {
                options.anchor = Some(parse_anchor(anchor)?);
            }
            if srid.is_none() {
                warn!("no --srid given, features will carry native geometry only");
            }

            info!("Ingesting: {}", input.display());
            let result = ingest_dxf_file(&mut conn, &input, &options, &CancelToken::new())
                .with_context(|| format!("Failed to ingest {}", input.display()))?;

            info!(
                "Wrote {} feature(s), {} rejected",
                result.features_written,
                result.rejections.len()
            );
            for rejection in &result.rejections {
                warn!("skipped entity {:?}: {}", rejection.source_entity_id, rejection.reason);
            }
            if report {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }

        Command::Export {
            project,
            drawing,
            layer,
            kind,
            bbox,
            output,
        } => {
            let filter = FeatureFilter {
                project_id: project,
                drawing_id: drawing,
                layer,
                kind: match kind.as_deref() {
                    Some(name) => Some(
                        FeatureKind::from_str_tag(name)
                            .with_context(|| format!("Unknown feature kind '{}'", name))?,
                    ),
                    None => None,
                },
                bbox: match bbox.as_deref() {
                    Some(spec) => Some(parse_bbox(spec)?),
                    None => None,
                },
            };

            let collection = export_geojson(&conn, &filter)?;
            info!("Exporting {} feature(s)", collection.features.len());
            let json = serde_json::to_string_pretty(&collection)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote: {}", path.display());
                }
                None => println!("{}", json),
            }
        }

        Command::Stats { drawing } => {
            let report = drawing_stats(&conn, &drawing)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Reproject { drawing, srid } => {
            let outcome = reproject_drawing(&mut conn, &drawing, srid, &CancelToken::new())
                .with_context(|| format!("Failed to reproject {}", drawing))?;
            info!(
                "Recomputed canonical geometry for {} feature(s), {} outside transform domain",
                outcome.updated, outcome.failures
            );
        }
    }

    Ok(())
}

fn parse_anchor(spec: &str) -> Result<[f64; 3]> {
    let parts: Vec<f64> = spec
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid anchor '{}'", spec))?;
    match parts.as_slice() {
        [x, y] => Ok([*x, *y, 0.0]),
        [x, y, z] => Ok([*x, *y, *z]),
        _ => anyhow::bail!("Anchor must be 'x,y' or 'x,y,z', got '{}'", spec),
    }
}

fn parse_bbox(spec: &str) -> Result<(f64, f64, f64, f64)> {
    let parts: Vec<f64> = spec
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid bbox '{}'", spec))?;
    match parts.as_slice() {
        [min_x, min_y, max_x, max_y] => Ok((*min_x, *min_y, *max_x, *max_y)),
        _ => anyhow::bail!("Bbox must be 'min_lon,min_lat,max_lon,max_lat', got '{}'", spec),
    }
}
