//! UV polygon ingest.
//!
//! Reads a GeoJSON FeatureCollection of territorial units, validates each
//! feature with the same decoder the server uses, and loads the rows into
//! the MySQL polygon table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use uvgeo::uv::geometry::units_from_feature_collection;
use uvgeo::uv::{to_geojson, MySqlUvStore};
use uvgeo::TerritorialUnit;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Load UV polygons from GeoJSON into MySQL")]
struct Args {
    /// GeoJSON FeatureCollection with `id_uv` and `nombre` properties
    #[arg(short, long)]
    file: PathBuf,

    /// MySQL URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Target table
    #[arg(long, default_value = "juntas_vecinos")]
    table: String,

    /// SRID assigned to the stored geometries
    #[arg(long, default_value = "0")]
    srid: u32,

    /// Create the table if it does not exist
    #[arg(long)]
    create_table: bool,

    /// Delete existing rows before loading
    #[arg(long)]
    truncate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("uvgeo UV ingest");
    info!("File: {}", args.file.display());

    let units = read_units(&args.file)?;
    if units.is_empty() {
        anyhow::bail!("No valid territorial units in {}", args.file.display());
    }

    let store = MySqlUvStore::connect_lazy(&args.database_url, &args.table, 1)?;
    let pool = store.pool();

    if args.create_table {
        sqlx::query(&create_table_sql(&args.table, args.srid))
            .execute(pool)
            .await
            .context("Failed to create table")?;
        info!("Table '{}' ready", args.table);
    }

    let mut tx = pool.begin().await.context("Failed to connect to MySQL")?;

    if args.truncate {
        let deleted = sqlx::query(&format!("DELETE FROM {}", args.table))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        info!("Deleted {} existing rows", deleted);
    }

    let pb = ProgressBar::new(units.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let sql = insert_sql(&args.table);
    for unit in &units {
        sqlx::query(&sql)
            .bind(unit.id)
            .bind(&unit.name)
            .bind(to_geojson(&unit.geometry).to_string())
            .bind(args.srid)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert UV {}", unit.id))?;
        pb.inc(1);
    }

    tx.commit().await.context("Failed to commit")?;
    pb.finish_with_message("Load complete");

    info!("Loaded {} territorial units into '{}'", units.len(), args.table);
    Ok(())
}

/// Decode the file, logging and dropping features that fail validation
fn read_units(path: &Path) -> Result<Vec<TerritorialUnit>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text).context("Invalid JSON")?;
    let (units, rejected) = units_from_feature_collection(&value)?;

    for (index, reason) in &rejected {
        warn!("Skipping feature #{}: {}", index, reason);
    }
    info!(
        "{} valid features, {} rejected",
        units.len(),
        rejected.len()
    );

    Ok(units)
}

/// Upsert keyed on `id_uv`; higher dimensions are already stripped
fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (id_uv, nombre, geom) \
         VALUES (?, ?, ST_GeomFromGeoJSON(?, 1, ?)) \
         ON DUPLICATE KEY UPDATE nombre = VALUES(nombre), geom = VALUES(geom)"
    )
}

fn create_table_sql(table: &str, srid: u32) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         id_uv INT NOT NULL PRIMARY KEY, \
         nombre VARCHAR(255) NOT NULL, \
         geom GEOMETRY NOT NULL SRID {srid}, \
         SPATIAL INDEX (geom))"
    )
}
