//! Discriminated result for collaborator queries

/// Outcome of a point lookup against a collaborator.
///
/// Collaborators never signal "not found" with a sentinel value; a record
/// that exists but carries a zero value is still `Found`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Absent,
}

impl<T> Lookup<T> {
    /// Convert into a `Result`, producing `err` when absent
    pub fn found_or_else<E>(self, err: impl FnOnce() -> E) -> Result<T, E> {
        match self {
            Lookup::Found(value) => Ok(value),
            Lookup::Absent => Err(err()),
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_or_else() {
        let found: Lookup<u32> = Lookup::Found(7);
        assert_eq!(found.found_or_else(|| "missing"), Ok(7));

        let absent: Lookup<u32> = Lookup::Absent;
        assert_eq!(absent.found_or_else(|| "missing"), Err("missing"));
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Lookup::from(Some("a")), Lookup::Found("a"));
        assert_eq!(Lookup::<&str>::from(None), Lookup::Absent);
    }
}
