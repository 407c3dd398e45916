//! The statistics store interface.

use areashift_database_models::{Attribute, AttributeSummary};
use areashift_geography_models::{GeographyGeneration, GeographyUnit};

use crate::DbError;

/// Where attribute values live.
///
/// Writes made between [`begin`](Self::begin) and [`commit`](Self::commit)
/// become visible together; [`rollback`](Self::rollback) discards all of
/// them. Writes outside a transaction apply immediately.
pub trait StatisticsStore {
    /// Looks up an attribute declared for `generation`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the lookup fails.
    fn attribute(
        &self,
        name: &str,
        generation: GeographyGeneration,
    ) -> Result<Option<Attribute>, DbError>;

    /// All attributes declared for `generation`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the lookup fails.
    fn attributes(&self, generation: GeographyGeneration) -> Result<Vec<Attribute>, DbError>;

    /// Declares `attribute` if it does not exist yet.
    ///
    /// Returns `true` if it was created.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    fn ensure_attribute(&mut self, attribute: &Attribute) -> Result<bool, DbError>;

    /// All `(unit_code, value)` pairs of an attribute in one generation,
    /// sorted by unit code.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn get_values(
        &self,
        attribute: &str,
        generation: GeographyGeneration,
    ) -> Result<Vec<(String, f64)>, DbError>;

    /// Inserts or replaces the value of `attribute` for `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Rejected`] if the attribute is not declared for
    /// the unit's generation or the value is not finite.
    fn upsert_value(
        &mut self,
        unit: &GeographyUnit,
        attribute: &str,
        value: f64,
    ) -> Result<(), DbError>;

    /// Deletes every value of an attribute in one generation.
    ///
    /// Returns the number of values deleted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    fn delete_values(
        &mut self,
        attribute: &str,
        generation: GeographyGeneration,
    ) -> Result<u64, DbError>;

    /// Recomputes and caches the summary of an attribute in one generation.
    ///
    /// Returns `None` (and drops any cached summary) when there are no
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query or write fails.
    fn recompute_summary(
        &mut self,
        attribute: &str,
        generation: GeographyGeneration,
    ) -> Result<Option<AttributeSummary>, DbError>;

    /// The cached summary, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn summary(
        &self,
        attribute: &str,
        generation: GeographyGeneration,
    ) -> Result<Option<AttributeSummary>, DbError>;

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Transaction`] if one is already open.
    fn begin(&mut self) -> Result<(), DbError>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Transaction`] if none is open.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Discards the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Transaction`] if none is open.
    fn rollback(&mut self) -> Result<(), DbError>;
}
