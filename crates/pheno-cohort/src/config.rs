//! Configuration types for the cohort engine.

/// How ICD codes without an OMOP mapping are handled during resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmappedCodePolicy {
    /// Omit the code and record it as an annotation on the result.
    #[default]
    Skip,
    /// Fail the phenotype with [`CohortError::UnmappedCode`](crate::CohortError::UnmappedCode).
    Abort,
}

/// Configuration for concept resolution and matrix building.
///
/// # Example
///
/// ```rust
/// use pheno_cohort::{CacheConfig, EngineConfig, UnmappedCodePolicy};
///
/// let config = EngineConfig::builder()
///     .with_parallel(true)
///     .with_unmapped_codes(UnmappedCodePolicy::Abort)
///     .with_cache(CacheConfig { max_entries: 50_000 })
///     .build();
///
/// assert!(config.parallel);
/// assert!(config.expand_descendants);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Classify phenotypes concurrently (requires `parallel` feature).
    pub parallel: bool,
    /// Handling of unmapped ICD codes.
    pub unmapped_codes: UnmappedCodePolicy,
    /// Close declared concept sets under descendants when a hierarchy is available.
    pub expand_descendants: bool,
    /// Descendant closure cache (None = caching disabled).
    pub cache: Option<CacheConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            unmapped_codes: UnmappedCodePolicy::Skip,
            expand_descendants: true,
            cache: Some(CacheConfig::default()),
        }
    }
}

impl EngineConfig {
    /// Creates a new builder for EngineConfig.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for EngineConfig.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Enables or disables parallel classification.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Sets the unmapped ICD code policy.
    pub fn with_unmapped_codes(mut self, policy: UnmappedCodePolicy) -> Self {
        self.config.unmapped_codes = policy;
        self
    }

    /// Enables or disables descendant expansion.
    pub fn with_descendant_expansion(mut self, expand: bool) -> Self {
        self.config.expand_descendants = expand;
        self
    }

    /// Enables the closure cache with the given configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = Some(cache);
        self
    }

    /// Disables the closure cache.
    pub fn without_cache(mut self) -> Self {
        self.config.cache = None;
        self
    }

    /// Builds the EngineConfig.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Configuration for the descendant closure cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached closures.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert!(!config.parallel);
        assert_eq!(config.unmapped_codes, UnmappedCodePolicy::Skip);
        assert!(config.expand_descendants);
        assert_eq!(config.cache, Some(CacheConfig::default()));
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::builder()
            .with_parallel(true)
            .with_unmapped_codes(UnmappedCodePolicy::Abort)
            .with_descendant_expansion(false)
            .without_cache()
            .build();

        assert!(config.parallel);
        assert_eq!(config.unmapped_codes, UnmappedCodePolicy::Abort);
        assert!(!config.expand_descendants);
        assert!(config.cache.is_none());
    }

    #[test]
    fn test_cache_config_default() {
        assert_eq!(CacheConfig::default().max_entries, 10_000);
    }
}
