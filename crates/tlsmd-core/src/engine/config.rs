use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for {parameter}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
}

/// Parameters of the sliding-window segment search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Chains to search; `None` searches every chain.
    pub chain_ids: Option<Vec<char>>,
    /// Keep side-chain atoms; otherwise only N, CA, C and O are fitted.
    pub use_side_chains: bool,
    pub include_hydrogens: bool,
    /// Keep atoms with occupancy below 1.
    pub include_frac_occupancy: bool,
    /// Keep atoms with at most one covalent bond.
    pub include_single_bond: bool,
    /// Number of consecutive residues per window.
    pub residue_window_width: usize,
    /// Windows whose mean DP2 exceeds this are rejected.
    pub dp2_reject_threshold: f64,
    /// Reject windows whose reduced T has a negative eigenvalue.
    pub reject_invalid_reduced_t: bool,
    /// When set, every fit is repeated about `centroid + shift` and disagreements are logged.
    pub verify_origin_shift: Option<[f64; 3]>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            chain_ids: None,
            use_side_chains: true,
            include_hydrogens: false,
            include_frac_occupancy: false,
            include_single_bond: true,
            residue_window_width: 6,
            dp2_reject_threshold: 0.1,
            reject_invalid_reduced_t: false,
            verify_origin_shift: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.residue_window_width == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "residue_window_width",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.dp2_reject_threshold.is_finite() || self.dp2_reject_threshold < 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "dp2_reject_threshold",
                reason: format!(
                    "must be a finite non-negative number, got {}",
                    self.dp2_reject_threshold
                ),
            });
        }
        if let Some(shift) = self.verify_origin_shift {
            if shift.iter().any(|v| !v.is_finite()) {
                return Err(ConfigError::InvalidParameter {
                    parameter: "verify_origin_shift",
                    reason: "components must be finite".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn searches_chain(&self, chain_id: char) -> bool {
        self.chain_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(&chain_id))
    }
}

/// Builds a [`SearchConfig`]; unset fields take their default values.
#[derive(Default)]
pub struct SearchConfigBuilder {
    chain_ids: Option<Vec<char>>,
    use_side_chains: Option<bool>,
    include_hydrogens: Option<bool>,
    include_frac_occupancy: Option<bool>,
    include_single_bond: Option<bool>,
    residue_window_width: Option<usize>,
    dp2_reject_threshold: Option<f64>,
    reject_invalid_reduced_t: Option<bool>,
    verify_origin_shift: Option<[f64; 3]>,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain_ids(mut self, ids: Vec<char>) -> Self {
        self.chain_ids = Some(ids);
        self
    }
    pub fn use_side_chains(mut self, value: bool) -> Self {
        self.use_side_chains = Some(value);
        self
    }
    pub fn include_hydrogens(mut self, value: bool) -> Self {
        self.include_hydrogens = Some(value);
        self
    }
    pub fn include_frac_occupancy(mut self, value: bool) -> Self {
        self.include_frac_occupancy = Some(value);
        self
    }
    pub fn include_single_bond(mut self, value: bool) -> Self {
        self.include_single_bond = Some(value);
        self
    }
    pub fn residue_window_width(mut self, width: usize) -> Self {
        self.residue_window_width = Some(width);
        self
    }
    pub fn dp2_reject_threshold(mut self, threshold: f64) -> Self {
        self.dp2_reject_threshold = Some(threshold);
        self
    }
    pub fn reject_invalid_reduced_t(mut self, value: bool) -> Self {
        self.reject_invalid_reduced_t = Some(value);
        self
    }
    pub fn verify_origin_shift(mut self, shift: [f64; 3]) -> Self {
        self.verify_origin_shift = Some(shift);
        self
    }

    pub fn build(self) -> Result<SearchConfig, ConfigError> {
        let defaults = SearchConfig::default();
        let config = SearchConfig {
            chain_ids: self.chain_ids.or(defaults.chain_ids),
            use_side_chains: self.use_side_chains.unwrap_or(defaults.use_side_chains),
            include_hydrogens: self.include_hydrogens.unwrap_or(defaults.include_hydrogens),
            include_frac_occupancy: self
                .include_frac_occupancy
                .unwrap_or(defaults.include_frac_occupancy),
            include_single_bond: self
                .include_single_bond
                .unwrap_or(defaults.include_single_bond),
            residue_window_width: self
                .residue_window_width
                .unwrap_or(defaults.residue_window_width),
            dp2_reject_threshold: self
                .dp2_reject_threshold
                .unwrap_or(defaults.dp2_reject_threshold),
            reject_invalid_reduced_t: self
                .reject_invalid_reduced_t
                .unwrap_or(defaults.reject_invalid_reduced_t),
            verify_origin_shift: self.verify_origin_shift.or(defaults.verify_origin_shift),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default_config() {
        let config = SearchConfigBuilder::new().build().unwrap();
        assert_eq!(config, SearchConfig::default());
        assert_eq!(config.residue_window_width, 6);
        assert_eq!(config.dp2_reject_threshold, 0.1);
        assert!(config.use_side_chains && config.include_single_bond);
        assert!(!config.include_hydrogens && !config.include_frac_occupancy);
    }

    #[test]
    fn builder_overrides_are_applied() {
        let config = SearchConfigBuilder::new()
            .chain_ids(vec!['B'])
            .residue_window_width(10)
            .use_side_chains(false)
            .verify_origin_shift([1.0, 0.0, 0.0])
            .build()
            .unwrap();
        assert_eq!(config.residue_window_width, 10);
        assert!(!config.use_side_chains);
        assert!(config.searches_chain('B'));
        assert!(!config.searches_chain('A'));
        assert!(SearchConfig::default().searches_chain('Z'));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = SearchConfigBuilder::new()
            .residue_window_width(0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                parameter: "residue_window_width",
                ..
            }
        ));

        for threshold in [-0.1, f64::NAN, f64::INFINITY] {
            let err = SearchConfigBuilder::new()
                .dp2_reject_threshold(threshold)
                .build()
                .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidParameter {
                    parameter: "dp2_reject_threshold",
                    ..
                }
            ));
        }
    }
}
