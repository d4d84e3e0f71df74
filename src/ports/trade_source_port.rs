//! Trade source port trait.

use crate::domain::error::LoadError;
use crate::domain::loader::RawTradeRow;

/// Yields the raw rows of a trade source, one per data row, in source order.
///
/// Implementations own the file format. Rows they cannot decode are returned
/// as [`RawTradeRow::malformed`] so the loader can report them; only a source
/// that cannot be read at all is an error.
pub trait TradeSourcePort {
    fn read_rows(&self) -> Result<Vec<RawTradeRow>, LoadError>;

    /// Human-readable identifier used in diagnostics.
    fn describe(&self) -> String;
}
