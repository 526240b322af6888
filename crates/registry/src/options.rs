/// How the registry assigns identifiers to newly opened archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentifierPolicy {
    /// Use the archive's declared identifier when it is well-formed, and
    /// derive one from the location otherwise.
    #[default]
    Declared,
    /// Always derive the identifier from the location.
    Location,
}

/// Tuning for content resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Redirect chains of this many hops or more fail to resolve.
    pub redirect_limit: usize,
    /// Reader samples drawn for a random page before enumerating entries.
    pub random_attempts: usize,
}

impl ResolverOptions {
    pub const DEFAULT_REDIRECT_LIMIT: usize = 16;
    pub const DEFAULT_RANDOM_ATTEMPTS: usize = 32;
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { redirect_limit: Self::DEFAULT_REDIRECT_LIMIT, random_attempts: Self::DEFAULT_RANDOM_ATTEMPTS }
    }
}
