//! Attribute values stored in `DuckDB`.
//!
//! Values are keyed by `(attribute, generation, unit_code)`. Upserts are a
//! delete followed by an insert, so repeated writes of the same key leave a
//! single row. The file lives at `data/statistics.duckdb` by default.

use std::path::Path;

use areashift_database_models::{Attribute, AttributeSummary, UnitType};
use areashift_geography_models::{GeographyGeneration, GeographyUnit};
use duckdb::Connection;

use crate::DbError;
use crate::store::StatisticsStore;

/// A [`StatisticsStore`] backed by a `DuckDB` connection.
pub struct DuckDbStore {
    conn: Connection,
    in_transaction: bool,
}

impl DuckDbStore {
    /// Opens (or creates) the store at `path` and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens the store at [`crate::paths::statistics_db_path`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_default() -> Result<Self, DbError> {
        Self::open(&crate::paths::statistics_db_path())
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self {
            conn,
            in_transaction: false,
        })
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS attributes (
            name TEXT NOT NULL,
            generation TEXT NOT NULL,
            unit_type TEXT NOT NULL,
            description TEXT,
            PRIMARY KEY (name, generation)
        );

        CREATE TABLE IF NOT EXISTS attribute_values (
            attribute TEXT NOT NULL,
            generation TEXT NOT NULL,
            unit_code TEXT NOT NULL,
            value DOUBLE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS attribute_summaries (
            attribute TEXT NOT NULL,
            generation TEXT NOT NULL,
            average DOUBLE NOT NULL,
            minimum DOUBLE NOT NULL,
            maximum DOUBLE NOT NULL,
            value_count BIGINT NOT NULL
        );",
    )?;

    Ok(())
}

fn parse_generation(value: &str) -> Result<GeographyGeneration, DbError> {
    GeographyGeneration::from_code(value).map_err(|e| DbError::Conversion {
        message: e.to_string(),
    })
}

fn parse_unit_type(value: &str) -> Result<UnitType, DbError> {
    value.parse().map_err(|_| DbError::Conversion {
        message: format!("Unknown unit type: {value}"),
    })
}

impl StatisticsStore for DuckDbStore {
    fn attribute(
        &self,
        name: &str,
        generation: GeographyGeneration,
    ) -> Result<Option<Attribute>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT unit_type, description FROM attributes
             WHERE name = ? AND generation = ?",
        )?;
        let result = stmt.query_row(duckdb::params![name, generation.code()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        });

        match result {
            Ok((unit_type, description)) => Ok(Some(Attribute {
                name: name.to_string(),
                generation,
                unit_type: parse_unit_type(&unit_type)?,
                description,
            })),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::DuckDb(e)),
        }
    }

    fn attributes(&self, generation: GeographyGeneration) -> Result<Vec<Attribute>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, unit_type, description FROM attributes
             WHERE generation = ?
             ORDER BY name",
        )?;
        stmt.raw_bind_parameter(1, generation.code())?;
        stmt.raw_execute()?;

        let mut attributes = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let unit_type: String = row.get(1)?;
            let description: Option<String> = row.get(2)?;
            attributes.push(Attribute {
                name,
                generation,
                unit_type: parse_unit_type(&unit_type)?,
                description,
            });
        }

        Ok(attributes)
    }

    fn ensure_attribute(&mut self, attribute: &Attribute) -> Result<bool, DbError> {
        if self.attribute(&attribute.name, attribute.generation)?.is_some() {
            return Ok(false);
        }

        self.conn.execute(
            "INSERT INTO attributes (name, generation, unit_type, description)
             VALUES (?, ?, ?, ?)",
            duckdb::params![
                attribute.name,
                attribute.generation.code(),
                attribute.unit_type.as_ref(),
                attribute.description.as_deref(),
            ],
        )?;

        log::debug!(
            "Declared attribute {} for {}",
            attribute.name,
            attribute.generation
        );
        Ok(true)
    }

    fn get_values(
        &self,
        attribute: &str,
        generation: GeographyGeneration,
    ) -> Result<Vec<(String, f64)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT unit_code, value FROM attribute_values
             WHERE attribute = ? AND generation = ?
             ORDER BY unit_code",
        )?;
        stmt.raw_bind_parameter(1, attribute)?;
        stmt.raw_bind_parameter(2, generation.code())?;
        stmt.raw_execute()?;

        let mut values = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            values.push((row.get(0)?, row.get(1)?));
        }

        Ok(values)
    }

    fn upsert_value(
        &mut self,
        unit: &GeographyUnit,
        attribute: &str,
        value: f64,
    ) -> Result<(), DbError> {
        if !value.is_finite() {
            return Err(DbError::Rejected {
                message: format!("{attribute} for {} is not finite: {value}", unit.code),
            });
        }
        if self.attribute(attribute, unit.generation)?.is_none() {
            return Err(DbError::Rejected {
                message: format!("{attribute} is not declared for {}", unit.generation),
            });
        }

        self.conn.execute(
            "DELETE FROM attribute_values
             WHERE attribute = ? AND generation = ? AND unit_code = ?",
            duckdb::params![attribute, unit.generation.code(), unit.code],
        )?;
        self.conn.execute(
            "INSERT INTO attribute_values (attribute, generation, unit_code, value)
             VALUES (?, ?, ?, ?)",
            duckdb::params![attribute, unit.generation.code(), unit.code, value],
        )?;

        Ok(())
    }

    fn delete_values(
        &mut self,
        attribute: &str,
        generation: GeographyGeneration,
    ) -> Result<u64, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM attribute_values WHERE attribute = ? AND generation = ?",
            duckdb::params![attribute, generation.code()],
        )?;
        Ok(deleted as u64)
    }

    fn recompute_summary(
        &mut self,
        attribute: &str,
        generation: GeographyGeneration,
    ) -> Result<Option<AttributeSummary>, DbError> {
        let (average, minimum, maximum, count): (Option<f64>, Option<f64>, Option<f64>, i64) =
            self.conn
                .prepare(
                    "SELECT AVG(value), MIN(value), MAX(value), COUNT(*)
                     FROM attribute_values
                     WHERE attribute = ? AND generation = ?",
                )?
                .query_row(duckdb::params![attribute, generation.code()], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?;

        self.conn.execute(
            "DELETE FROM attribute_summaries WHERE attribute = ? AND generation = ?",
            duckdb::params![attribute, generation.code()],
        )?;

        let (Some(average), Some(minimum), Some(maximum)) = (average, minimum, maximum) else {
            return Ok(None);
        };

        self.conn.execute(
            "INSERT INTO attribute_summaries
                 (attribute, generation, average, minimum, maximum, value_count)
             VALUES (?, ?, ?, ?, ?, ?)",
            duckdb::params![attribute, generation.code(), average, minimum, maximum, count],
        )?;

        Ok(Some(AttributeSummary {
            attribute: attribute.to_string(),
            generation,
            average,
            minimum,
            maximum,
            count: u64::try_from(count).unwrap_or_default(),
        }))
    }

    fn summary(
        &self,
        attribute: &str,
        generation: GeographyGeneration,
    ) -> Result<Option<AttributeSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT generation, average, minimum, maximum, value_count
             FROM attribute_summaries
             WHERE attribute = ? AND generation = ?",
        )?;
        let result = stmt.query_row(duckdb::params![attribute, generation.code()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        });

        match result {
            Ok((stored_generation, average, minimum, maximum, count)) => Ok(Some(AttributeSummary {
                attribute: attribute.to_string(),
                generation: parse_generation(&stored_generation)?,
                average,
                minimum,
                maximum,
                count: u64::try_from(count).unwrap_or_default(),
            })),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::DuckDb(e)),
        }
    }

    fn begin(&mut self) -> Result<(), DbError> {
        if self.in_transaction {
            return Err(DbError::Transaction {
                message: "a transaction is already open".to_string(),
            });
        }
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Err(DbError::Transaction {
                message: "commit without an open transaction".to_string(),
            });
        }
        self.in_transaction = false;
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Err(DbError::Transaction {
                message: "rollback without an open transaction".to_string(),
            });
        }
        self.in_transaction = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
