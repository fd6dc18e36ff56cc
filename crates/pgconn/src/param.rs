//! Bound parameters.
//!
//! Every method that takes parameters takes one `impl IntoParams` argument, so
//! a call site can pass nothing, one value, or a list:
//!
//! ```ignore
//! conn.count("users", "active = ?", true).await?;
//! conn.count("users", "age BETWEEN ? AND ?", (18, 65)).await?;
//! conn.count("users", (), ()).await?;
//! conn.delete("users", "id = ANY(?)", Param::new(vec![1_i64, 2, 3])).await?;
//! ```

use crate::value::Value;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A clone-friendly parameter wrapper using Arc.
#[derive(Clone)]
pub struct Param(Arc<dyn ToSql + Send + Sync>);

impl Param {
    /// Create a new parameter from any ToSql value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// Borrow as the trait object tokio-postgres expects.
    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Param").field(&self.0).finish()
    }
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Param::new(v)
    }
}

/// An ordered list of parameters.
#[derive(Clone, Debug, Default)]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter and return its 1-based index.
    pub fn push<T: ToSql + Send + Sync + 'static>(&mut self, value: T) -> usize {
        self.push_param(Param::new(value))
    }

    /// Add a pre-wrapped Param and return its 1-based index.
    pub fn push_param(&mut self, param: Param) -> usize {
        self.params.push(param);
        self.params.len()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// All parameters as references for tokio-postgres.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(Param::as_sql).collect()
    }

    /// Append another list's parameters.
    pub fn extend(&mut self, other: &ParamList) {
        self.params.extend(other.params.iter().cloned());
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }
}

impl FromIterator<Param> for ParamList {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

/// Anything that can stand in the "parameters" argument position.
///
/// `()` and `None` mean no parameters. A scalar is one parameter. Tuples,
/// arrays, slices and [`ParamList`]s are one parameter per element. A `Vec<T>`
/// is one parameter per element too; wrap it in [`Param::new`] to bind it as a
/// single Postgres array instead.
pub trait IntoParams {
    fn into_params(self) -> ParamList;
}

impl IntoParams for () {
    fn into_params(self) -> ParamList {
        ParamList::new()
    }
}

impl IntoParams for ParamList {
    fn into_params(self) -> ParamList {
        self
    }
}

impl IntoParams for &ParamList {
    fn into_params(self) -> ParamList {
        self.clone()
    }
}

impl IntoParams for Param {
    fn into_params(self) -> ParamList {
        let mut list = ParamList::new();
        list.push_param(self);
        list
    }
}

impl<P: IntoParams> IntoParams for Option<P> {
    fn into_params(self) -> ParamList {
        self.map(IntoParams::into_params).unwrap_or_default()
    }
}

impl<T: ToSql + Send + Sync + 'static> IntoParams for Vec<T> {
    fn into_params(self) -> ParamList {
        self.into_iter().map(Param::new).collect()
    }
}

impl<T: ToSql + Send + Sync + Clone + 'static> IntoParams for &[T] {
    fn into_params(self) -> ParamList {
        self.iter().cloned().map(Param::new).collect()
    }
}

impl<T: ToSql + Send + Sync + 'static, const N: usize> IntoParams for [T; N] {
    fn into_params(self) -> ParamList {
        self.into_iter().map(Param::new).collect()
    }
}

// Scalars bind through `Value`, so an `i32` still binds against a BIGINT
// column and a borrowed `&str` needs no `'static` lifetime.
macro_rules! impl_into_params_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoParams for $t {
                fn into_params(self) -> ParamList {
                    Param::from(Value::from(self)).into_params()
                }
            }
        )*
    };
}

impl_into_params_scalar!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u32,
    f32,
    f64,
    &str,
    &String,
    String,
    uuid::Uuid,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
    serde_json::Value,
);

impl IntoParams for Value {
    fn into_params(self) -> ParamList {
        Param::from(self).into_params()
    }
}

macro_rules! impl_into_params_tuple {
    ($($name:ident),+) => {
        impl<$($name: ToSql + Send + Sync + 'static),+> IntoParams for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_params(self) -> ParamList {
                let ($($name,)+) = self;
                let mut list = ParamList::new();
                $(list.push($name);)+
                list
            }
        }
    };
}

impl_into_params_tuple!(A);
impl_into_params_tuple!(A, B);
impl_into_params_tuple!(A, B, C);
impl_into_params_tuple!(A, B, C, D);
impl_into_params_tuple!(A, B, C, D, E);
impl_into_params_tuple!(A, B, C, D, E, F);
impl_into_params_tuple!(A, B, C, D, E, F, G);
impl_into_params_tuple!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_and_none_are_empty() {
        assert!(().into_params().is_empty());
        assert!(None::<i32>.into_params().is_empty());
    }

    #[test]
    fn scalar_is_one_param() {
        assert_eq!(5_i64.into_params().len(), 1);
        assert_eq!("x".into_params().len(), 1);
        assert_eq!(Some(true).into_params().len(), 1);
    }

    #[test]
    fn lists_are_one_param_per_element() {
        assert_eq!((1, "a", 2.5).into_params().len(), 3);
        assert_eq!(vec![1, 2, 3, 4].into_params().len(), 4);
        assert_eq!([1_i64, 2].into_params().len(), 2);
        assert_eq!((&["a".to_string(), "b".to_string()][..]).into_params().len(), 2);
    }

    #[test]
    fn scalars_bind_as_values() {
        let owned = String::from("borrowed");
        let list = owned.as_str().into_params();
        assert_eq!(format!("{:?}", list), r#"ParamList { params: [Param(Text("borrowed"))] }"#);
        assert_eq!(format!("{:?}", (&owned).into_params()), format!("{:?}", list));
        assert_eq!(
            format!("{:?}", 7_i32.into_params()),
            "ParamList { params: [Param(Int(7))] }"
        );
        assert_eq!(
            format!("{:?}", 1.5_f32.into_params()),
            "ParamList { params: [Param(Float(1.5))] }"
        );
    }

    #[test]
    fn wrapped_vec_binds_as_single_array() {
        assert_eq!(Param::new(vec![1_i64, 2, 3]).into_params().len(), 1);
    }

    #[test]
    fn push_returns_one_based_index() {
        let mut list = ParamList::new();
        assert_eq!(list.push(1), 1);
        assert_eq!(list.push("b"), 2);
        let mut other = ParamList::new();
        other.extend(&list);
        assert_eq!(other.as_refs().len(), 2);
    }
}
