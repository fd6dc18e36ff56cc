//! Row mapping traits

use crate::error::{ConnError, ConnResult};
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

/// Trait for types that can be constructed from a database row.
///
/// ```ignore
/// struct User { id: i64, username: String }
///
/// impl FromRow for User {
///     fn from_row(row: &Row) -> ConnResult<Self> {
///         Ok(User {
///             id: row.try_get_column("id")?,
///             username: row.try_get_column("username")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> ConnResult<Self>;
}

/// Extension trait for convenient row access
pub trait RowExt {
    /// Get a column value by name, mapping failures to [`ConnError::Decode`].
    fn try_get_column<T>(&self, column: &str) -> ConnResult<T>
    where
        T: for<'a> FromSql<'a>;

    /// Get a column value by position, mapping failures to [`ConnError::Decode`].
    fn try_get_index<T>(&self, index: usize) -> ConnResult<T>
    where
        T: for<'a> FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> ConnResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| ConnError::decode(column, e.to_string()))
    }

    fn try_get_index<T>(&self, index: usize) -> ConnResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(index)
            .map_err(|e| ConnError::decode(index.to_string(), e.to_string()))
    }
}

macro_rules! impl_from_row_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: for<'a> FromSql<'a>),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> ConnResult<Self> {
                Ok(($(row.try_get_index::<$name>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(A: 0);
impl_from_row_tuple!(A: 0, B: 1);
impl_from_row_tuple!(A: 0, B: 1, C: 2);
impl_from_row_tuple!(A: 0, B: 1, C: 2, D: 3);
