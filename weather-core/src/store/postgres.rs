use async_trait::async_trait;
use sqlx::{Connection, PgConnection, postgres::PgConnectOptions};
use tracing::{debug, info};

use crate::{config::DatabaseConfig, error::LoadError, model::ValidatedObservation};

use super::{LoadSummary, WeatherStore, distinct_cities};

const CREATE_CITIES: &str = "
    CREATE TABLE IF NOT EXISTS cities (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) UNIQUE
    )";

const CREATE_WEATHER_DATA: &str = "
    CREATE TABLE IF NOT EXISTS weather_data (
        id SERIAL PRIMARY KEY,
        city_id INTEGER REFERENCES cities(id),
        timestamp TIMESTAMP,
        temperature FLOAT,
        humidity FLOAT,
        wind_speed FLOAT,
        weather_condition VARCHAR(255)
    )";

const UPSERT_CITY: &str = "INSERT INTO cities (name) VALUES ($1) ON CONFLICT (name) DO NOTHING";

const INSERT_RECORD: &str = "
    INSERT INTO weather_data
        (city_id, timestamp, temperature, humidity, wind_speed, weather_condition)
    VALUES ((SELECT id FROM cities WHERE name = $1), $2, $3, $4, $5, $6)";

/// PostgreSQL store over a single connection.
#[derive(Debug)]
pub struct PgStore {
    conn: PgConnection,
}

impl PgStore {
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, LoadError> {
        let options = PgConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .database(&cfg.database)
            .username(&cfg.user)
            .password(&cfg.password);

        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|source| LoadError::Connect {
                host: cfg.host.clone(),
                port: cfg.port,
                database: cfg.database.clone(),
                source,
            })?;

        info!(host = %cfg.host, database = %cfg.database, "Connected to PostgreSQL");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: PgConnection) -> Self {
        Self { conn }
    }
}

async fn upsert_cities(conn: &mut PgConnection, names: &[String]) -> Result<u64, LoadError> {
    let mut inserted = 0;
    for name in names {
        let res = sqlx::query(UPSERT_CITY)
            .bind(name)
            .execute(&mut *conn)
            .await
            .map_err(|source| LoadError::UpsertCity {
                name: name.clone(),
                source,
            })?;
        inserted += res.rows_affected();
    }
    Ok(inserted)
}

async fn insert_records(
    conn: &mut PgConnection,
    batch: &[ValidatedObservation],
) -> Result<u64, LoadError> {
    let mut inserted = 0;
    for obs in batch {
        let res = sqlx::query(INSERT_RECORD)
            .bind(&obs.city)
            .bind(obs.timestamp)
            .bind(obs.temperature)
            .bind(obs.humidity)
            .bind(obs.wind_speed)
            .bind(&obs.condition)
            .execute(&mut *conn)
            .await
            .map_err(|source| LoadError::InsertRecord {
                city: obs.city.clone(),
                source,
            })?;
        inserted += res.rows_affected();
    }
    Ok(inserted)
}

#[async_trait]
impl WeatherStore for PgStore {
    async fn ensure_schema(&mut self) -> Result<(), LoadError> {
        for ddl in [CREATE_CITIES, CREATE_WEATHER_DATA] {
            sqlx::query(ddl)
                .execute(&mut self.conn)
                .await
                .map_err(LoadError::Schema)?;
        }
        debug!("Schema ready");
        Ok(())
    }

    async fn upsert_cities(&mut self, names: &[String]) -> Result<u64, LoadError> {
        upsert_cities(&mut self.conn, names).await
    }

    async fn insert_records(&mut self, batch: &[ValidatedObservation]) -> Result<u64, LoadError> {
        insert_records(&mut self.conn, batch).await
    }

    async fn load(&mut self, batch: &[ValidatedObservation]) -> Result<LoadSummary, LoadError> {
        let mut tx = self.conn.begin().await.map_err(LoadError::Transaction)?;

        // Dropping `tx` on an early return rolls the whole batch back.
        let cities_inserted = upsert_cities(&mut tx, &distinct_cities(batch)).await?;
        let records_inserted = insert_records(&mut tx, batch).await?;

        tx.commit().await.map_err(LoadError::Transaction)?;

        Ok(LoadSummary {
            cities_inserted,
            records_inserted,
        })
    }
}
