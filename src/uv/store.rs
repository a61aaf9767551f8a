//! Read access to the territorial-unit polygon store.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::geometry::{decode_geojson, GeometryError};
use crate::models::TerritorialUnit;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("polygon store unavailable: {0}")]
    Unavailable(String),

    #[error("polygon query failed: {0}")]
    Query(String),

    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("failed to read polygon file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Unit identity without geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitRef {
    #[serde(rename = "id_uv")]
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[async_trait]
pub trait UvStore: Send + Sync {
    /// First unit whose geometry strictly contains the point
    async fn find_containing(&self, lat: f64, lon: f64) -> Result<Option<UnitRef>, StoreError>;

    /// Every unit with its decoded geometry
    async fn load_units(&self) -> Result<Vec<TerritorialUnit>, StoreError>;

    async fn list_units(&self) -> Result<Vec<UnitRef>, StoreError>;
}

/// MySQL table with an `id_uv`, `nombre` and spatial `geom` column.
pub struct MySqlUvStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlUvStore {
    /// Create a store without connecting; the first query opens the pool.
    pub fn connect_lazy(url: &str, table: &str, max_connections: u32) -> Result<Self, StoreError> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StoreError::Config(format!("invalid table name '{table}'")));
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(url)
            .map_err(|e| StoreError::Config(e.to_string()))?;

        info!("Using MySQL polygon store (table {})", table);
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

/// WKT point in x=lon, y=lat order
pub fn point_wkt(lat: f64, lon: f64) -> String {
    format!("POINT({} {})", lon, lat)
}

#[async_trait]
impl UvStore for MySqlUvStore {
    async fn find_containing(&self, lat: f64, lon: f64) -> Result<Option<UnitRef>, StoreError> {
        // The point is built in the geometry column's own SRID
        let sql = format!(
            "SELECT CAST(id_uv AS SIGNED), nombre FROM {} \
             WHERE ST_Contains(geom, ST_GeomFromText(?, ST_SRID(geom))) LIMIT 1",
            self.table
        );
        let row: Option<(i64, Option<String>)> = sqlx::query_as(&sql)
            .bind(point_wkt(lat, lon))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, name)| UnitRef {
            id,
            name: name.unwrap_or_default(),
        }))
    }

    async fn load_units(&self) -> Result<Vec<TerritorialUnit>, StoreError> {
        let sql = format!(
            "SELECT CAST(id_uv AS SIGNED), nombre, CAST(ST_AsGeoJSON(geom) AS CHAR) FROM {}",
            self.table
        );
        let rows: Vec<(i64, Option<String>, Option<String>)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let mut units = Vec::with_capacity(rows.len());
        for (id, name, geojson) in rows {
            let Some(geojson) = geojson else {
                warn!("UV {} has no geometry, skipping", id);
                continue;
            };
            match decode_geojson(&geojson) {
                Ok(geometry) => units.push(TerritorialUnit {
                    id,
                    name: name.unwrap_or_default(),
                    geometry,
                }),
                Err(e) => warn!("UV {} has undecodable geometry, skipping: {}", id, e),
            }
        }

        debug!("Loaded {} UV geometries", units.len());
        Ok(units)
    }

    async fn list_units(&self) -> Result<Vec<UnitRef>, StoreError> {
        let sql = format!(
            "SELECT CAST(id_uv AS SIGNED), nombre FROM {} ORDER BY id_uv",
            self.table
        );
        let rows: Vec<(i64, Option<String>)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| UnitRef {
                id,
                name: name.unwrap_or_default(),
            })
            .collect())
    }
}
