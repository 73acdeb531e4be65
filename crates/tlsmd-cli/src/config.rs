use crate::cli::SearchArgs;
use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use tlsmd::engine::config as core_config;
use tracing::debug;

/// Tolerance (Å) added to the sum of covalent radii when inferring bonds.
pub const DEFAULT_BOND_TOLERANCE: f64 = 0.45;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialSearchConfig {
    chains: Option<Vec<char>>,
    #[serde(rename = "window-width")]
    window_width: Option<usize>,
    #[serde(rename = "dp2-threshold")]
    dp2_threshold: Option<f64>,
    #[serde(rename = "use-side-chains")]
    use_side_chains: Option<bool>,
    #[serde(rename = "include-hydrogens")]
    include_hydrogens: Option<bool>,
    #[serde(rename = "include-frac-occupancy")]
    include_frac_occupancy: Option<bool>,
    #[serde(rename = "include-single-bond")]
    include_single_bond: Option<bool>,
    #[serde(rename = "reject-invalid-reduced-t")]
    reject_invalid_reduced_t: Option<bool>,
    #[serde(rename = "verify-origin-shift")]
    verify_origin_shift: Option<[f64; 3]>,
    #[serde(rename = "bond-tolerance")]
    bond_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialTlsmdConfig {
    search: Option<PartialSearchConfig>,
}

/// The search configuration together with the CLI-only bond inference setting.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub config: core_config::SearchConfig,
    pub bond_tolerance: f64,
}

impl PartialTlsmdConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Layers CLI arguments over file values over library defaults.
    pub fn merge_with_cli(mut self, args: &SearchArgs) -> Result<SearchSettings> {
        self.apply_set_values(&args.set_values)?;
        let file = self.search.take().unwrap_or_default();

        let mut builder = core_config::SearchConfigBuilder::new();

        let chains = if args.chains.is_empty() {
            file.chains
        } else {
            Some(args.chains.clone())
        };
        if let Some(ids) = chains {
            builder = builder.chain_ids(ids);
        }
        if let Some(width) = args.window_width.or(file.window_width) {
            builder = builder.residue_window_width(width);
        }
        if let Some(threshold) = args.dp2_threshold.or(file.dp2_threshold) {
            builder = builder.dp2_reject_threshold(threshold);
        }

        builder = builder
            .use_side_chains(Self::merge_flag(
                args.main_chain_only.then_some(false),
                file.use_side_chains,
                true,
            ))
            .include_hydrogens(Self::merge_flag(
                args.include_hydrogens.then_some(true),
                file.include_hydrogens,
                false,
            ))
            .include_frac_occupancy(Self::merge_flag(
                args.include_frac_occupancy.then_some(true),
                file.include_frac_occupancy,
                false,
            ))
            .include_single_bond(Self::merge_flag(
                args.exclude_single_bond.then_some(false),
                file.include_single_bond,
                true,
            ))
            .reject_invalid_reduced_t(Self::merge_flag(
                args.reject_invalid_reduced_t.then_some(true),
                file.reject_invalid_reduced_t,
                false,
            ));

        let shift = match &args.verify_origin_shift {
            Some(values) => Some(Self::parse_shift(values)?),
            None => file.verify_origin_shift,
        };
        if let Some(shift) = shift {
            builder = builder.verify_origin_shift(shift);
        }

        let bond_tolerance = args
            .bond_tolerance
            .or(file.bond_tolerance)
            .unwrap_or(DEFAULT_BOND_TOLERANCE);
        if !bond_tolerance.is_finite() || bond_tolerance < 0.0 {
            return Err(CliError::Config(format!(
                "`search.bond-tolerance` must be a non-negative number, got {}",
                bond_tolerance
            )));
        }

        let config = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(SearchSettings {
            config,
            bond_tolerance,
        })
    }

    /// A CLI switch only ever moves a setting away from its default.
    fn merge_flag(cli_val: Option<bool>, file_val: Option<bool>, default: bool) -> bool {
        cli_val.or(file_val).unwrap_or(default)
    }

    fn parse_shift(values: &[f64]) -> Result<[f64; 3]> {
        <[f64; 3]>::try_from(values).map_err(|_| {
            CliError::Argument(format!(
                "--verify-origin-shift expects three values X,Y,Z, got {}",
                values.len()
            ))
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let search = self.search.get_or_insert_with(Default::default);
            let invalid = |kind: &str| {
                CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value_str))
            };

            match key {
                "search.window-width" => {
                    search.window_width = Some(value_str.parse().map_err(|_| invalid("integer"))?);
                }
                "search.dp2-threshold" => {
                    search.dp2_threshold = Some(value_str.parse().map_err(|_| invalid("float"))?);
                }
                "search.bond-tolerance" => {
                    search.bond_tolerance = Some(value_str.parse().map_err(|_| invalid("float"))?);
                }
                "search.use-side-chains" => {
                    search.use_side_chains = Some(value_str.parse().map_err(|_| invalid("boolean"))?);
                }
                "search.include-hydrogens" => {
                    search.include_hydrogens =
                        Some(value_str.parse().map_err(|_| invalid("boolean"))?);
                }
                "search.include-frac-occupancy" => {
                    search.include_frac_occupancy =
                        Some(value_str.parse().map_err(|_| invalid("boolean"))?);
                }
                "search.include-single-bond" => {
                    search.include_single_bond =
                        Some(value_str.parse().map_err(|_| invalid("boolean"))?);
                }
                "search.reject-invalid-reduced-t" => {
                    search.reject_invalid_reduced_t =
                        Some(value_str.parse().map_err(|_| invalid("boolean"))?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_config_file(dir: &TempDir, content: &str) -> PathBuf {
        let file_path = dir.path().join("tlsmd.toml");
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn search_args(extra: &[&str]) -> SearchArgs {
        let mut argv = vec!["tlsmd", "search", "-i", "model.pdb"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Search(args) => args,
            _ => panic!("Expected 'search' subcommand"),
        }
    }

    #[test]
    fn empty_config_yields_library_defaults() {
        let settings = PartialTlsmdConfig::default()
            .merge_with_cli(&search_args(&[]))
            .unwrap();
        assert_eq!(settings.config, core_config::SearchConfig::default());
        assert_eq!(settings.bond_tolerance, DEFAULT_BOND_TOLERANCE);
    }

    #[test]
    fn file_values_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
        [search]
        chains = ["A", "C"]
        window-width = 10
        dp2-threshold = 0.05
        use-side-chains = false
        include-single-bond = false
        verify-origin-shift = [1.0, 0.0, -1.0]
        bond-tolerance = 0.3
        "#,
        );
        let settings = PartialTlsmdConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&search_args(&[]))
            .unwrap();

        assert_eq!(settings.config.chain_ids, Some(vec!['A', 'C']));
        assert_eq!(settings.config.residue_window_width, 10);
        assert_eq!(settings.config.dp2_reject_threshold, 0.05);
        assert!(!settings.config.use_side_chains);
        assert!(!settings.config.include_single_bond);
        assert_eq!(settings.config.verify_origin_shift, Some([1.0, 0.0, -1.0]));
        assert_eq!(settings.bond_tolerance, 0.3);
    }

    #[test]
    fn cli_args_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
        [search]
        chains = ["A"]
        window-width = 10
        include-hydrogens = false
        "#,
        );
        let args = search_args(&["--chains", "B", "-w", "7", "--include-hydrogens", "-S", "search.dp2-threshold=0.2"]);
        let settings = PartialTlsmdConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(settings.config.chain_ids, Some(vec!['B']));
        assert_eq!(settings.config.residue_window_width, 7);
        assert!(settings.config.include_hydrogens);
        assert_eq!(settings.config.dp2_reject_threshold, 0.2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(&dir, "[search]\nwindow-size = 6\n");
        assert!(matches!(
            PartialTlsmdConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));

        let args = search_args(&["-S", "search.window-size=6"]);
        assert!(matches!(
            PartialTlsmdConfig::default().merge_with_cli(&args),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn invalid_values_are_reported() {
        let args = search_args(&["-w", "0"]);
        assert!(matches!(
            PartialTlsmdConfig::default().merge_with_cli(&args),
            Err(CliError::Config(_))
        ));

        let args = search_args(&["--verify-origin-shift", "1.0,2.0"]);
        assert!(matches!(
            PartialTlsmdConfig::default().merge_with_cli(&args),
            Err(CliError::Argument(_))
        ));

        let args = search_args(&["-S", "search.include-hydrogens=maybe"]);
        assert!(matches!(
            PartialTlsmdConfig::default().merge_with_cli(&args),
            Err(CliError::Config(_))
        ));
    }
}
