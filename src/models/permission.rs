// Permission codes granted to a user

use serde::Serialize;

pub const MOVIES_READ: &str = "movies:read";
pub const MOVIES_WRITE: &str = "movies:write";

/// The set of permission codes a user holds. Order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Permissions(Vec<String>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(&self, code: &str) -> bool {
        self.0.iter().any(|held| held == code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<String>> for Permissions {
    fn from(mut codes: Vec<String>) -> Self {
        codes.sort();
        codes.dedup();
        Self(codes)
    }
}

impl<'a> FromIterator<&'a str> for Permissions {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(String::from).collect::<Vec<_>>().into()
    }
}
