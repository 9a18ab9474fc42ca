//! SQL fragments: static text with bound arguments in between
//!
//! Every piece of SQL text in a fragment is `&'static str` from a fixed mapping
//! table in this crate. Caller-supplied values only ever travel as bind
//! arguments, so nothing the caller sends is interpolated into SQL.

use sqlx::{Postgres, QueryBuilder};

/// A bound argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Text(String),
    Float(f64),
    Bool(bool),
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Static SQL text interleaved with bound arguments.
///
/// Invariant: `pieces.len() == args.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pieces: Vec<&'static str>,
    args: Vec<Arg>,
}

impl Fragment {
    /// Start a fragment with leading SQL text.
    pub fn new(sql: &'static str) -> Self {
        Self {
            pieces: vec![sql],
            args: Vec::new(),
        }
    }

    /// Append a bound argument followed by more SQL text.
    ///
    /// ```
    /// use blogfolio_db::query::Fragment;
    ///
    /// let f = Fragment::new("p.slug = ").bind("hello", "");
    /// assert_eq!(f.arg_count(), 1);
    /// ```
    pub fn bind(mut self, arg: impl Into<Arg>, then: &'static str) -> Self {
        self.args.push(arg.into());
        self.pieces.push(then);
        self
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Push this fragment onto a query builder.
    pub fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, piece) in self.pieces.iter().enumerate() {
            qb.push(*piece);
            if let Some(arg) = self.args.get(i) {
                push_arg(qb, arg);
            }
        }
    }

    /// Render with `$n` placeholders, for logging and tests.
    pub fn to_sql(&self) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("");
        self.push_to(&mut qb);
        qb.into_sql()
    }
}

fn push_arg(qb: &mut QueryBuilder<'_, Postgres>, arg: &Arg) {
    match arg {
        Arg::Text(v) => qb.push_bind(v.clone()),
        Arg::Float(v) => qb.push_bind(*v),
        Arg::Bool(v) => qb.push_bind(*v),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_fragment_has_no_binds() {
        let f = Fragment::new("p.visible");
        assert_eq!(f.to_sql(), "p.visible");
        assert_eq!(f.arg_count(), 0);
    }

    #[test]
    fn binds_become_placeholders() {
        let f = Fragment::new("(similarity(p.title, ")
            .bind("rust", ") > ")
            .bind(0.1, ")");
        assert_eq!(f.to_sql(), "(similarity(p.title, $1) > $2)");
    }

    #[test]
    fn caller_text_never_reaches_sql() {
        let f = Fragment::new("p.slug = ").bind("x'; DROP TABLE posts; --", "");
        assert_eq!(f.to_sql(), "p.slug = $1");
    }
}
