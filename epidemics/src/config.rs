//! Command-line configuration.
//!
//! The `epidemics` binary is configured entirely through environment
//! variables.
//!
//! # Environment Variables
//!
//! - `EPIDEMICS_EDGE_LIST`: Path to a `source target [weight]` edge list (required)
//! - `EPIDEMICS_DIRECTED`: Treat edges as directed (default: `false`)
//! - `EPIDEMICS_MODEL`: `sis` or `sir` (default: `sir`)
//! - `EPIDEMICS_ALGORITHM`: `fast` or `gillespie` (default: `fast`)
//! - `EPIDEMICS_TAU`: Transmission rate per edge (required)
//! - `EPIDEMICS_GAMMA`: Recovery rate per node (required)
//! - `EPIDEMICS_TRANSMISSION_WEIGHT`: Edge attribute scaling `tau` (optional)
//! - `EPIDEMICS_RECOVERY_WEIGHT`: Node attribute scaling `gamma` (optional)
//! - `EPIDEMICS_INITIAL_INFECTED`: Comma separated node labels from the edge
//!   list (optional)
//! - `EPIDEMICS_RHO`: Fraction of nodes initially infected (optional, cannot
//!   be combined with `EPIDEMICS_INITIAL_INFECTED`)
//!
//! Without either of the last two, one node chosen at random starts
//! infected.
//! - `EPIDEMICS_SEED`: Random seed (default: `0`)
//! - `EPIDEMICS_TMAX`: Time horizon (default: unbounded)
//!
//! # Invariants
//!
//! - `tau`, `gamma`, `rho` and `tmax` are parsed numbers; their ranges are
//!   checked later by the simulation itself.

use std::path::PathBuf;

use crate::error::EpidemicError;
use crate::network::Graph;
use crate::rates::RateConfig;
use crate::simulation::{InitialInfected, Model, SimulationOptions};

/// Which simulation algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Fast,
    Gillespie,
}

/// How the initially infected nodes are picked.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialSeeds {
    /// The nodes with these edge-list labels.
    Labels(Vec<String>),
    /// A fraction of all nodes, chosen at random.
    Fraction(f64),
    /// This many nodes, chosen at random.
    Count(usize),
}

/// Configuration of one command-line run.
///
/// # Pre-conditions
///
/// When constructed via `from_env()`:
/// - `EPIDEMICS_EDGE_LIST`, `EPIDEMICS_TAU` and `EPIDEMICS_GAMMA` must be set
/// - At most one of `EPIDEMICS_INITIAL_INFECTED` and `EPIDEMICS_RHO` is set
///
/// # Post-conditions
///
/// - `initial_infected` never selects zero nodes by default
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Edge list file describing the contact network.
    pub edge_list: PathBuf,
    /// Whether the edge list is directed.
    pub directed: bool,
    pub model: Model,
    pub algorithm: Algorithm,
    pub rates: RateConfig,
    pub initial_infected: InitialSeeds,
    pub seed: u64,
    pub tmax: f64,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is missing.
    MissingEnvVar(String),
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnvVar(name) => {
                write!(f, "missing required environment variable: {name}")
            }
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl CliConfig {
    /// Number of random nodes infected when no seeds are configured.
    pub const DEFAULT_INITIAL_COUNT: usize = 1;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `EPIDEMICS_EDGE_LIST`, `EPIDEMICS_TAU` or `EPIDEMICS_GAMMA` is not set
    /// - any variable that is set cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let edge_list = lookup("EPIDEMICS_EDGE_LIST")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("EPIDEMICS_EDGE_LIST".to_string()))?;

        let directed = match lookup("EPIDEMICS_DIRECTED") {
            Some(value) => parse_bool("EPIDEMICS_DIRECTED", &value)?,
            None => false,
        };

        let model = match lookup("EPIDEMICS_MODEL").as_deref() {
            None | Some("sir") => Model::Sir,
            Some("sis") => Model::Sis,
            Some(other) => {
                return Err(invalid(
                    "EPIDEMICS_MODEL",
                    format!("'{other}' is not one of sis, sir"),
                ));
            }
        };

        let algorithm = match lookup("EPIDEMICS_ALGORITHM").as_deref() {
            None | Some("fast") => Algorithm::Fast,
            Some("gillespie") => Algorithm::Gillespie,
            Some(other) => {
                return Err(invalid(
                    "EPIDEMICS_ALGORITHM",
                    format!("'{other}' is not one of fast, gillespie"),
                ));
            }
        };

        let mut rates = RateConfig::new(
            required_number(&lookup, "EPIDEMICS_TAU")?,
            required_number(&lookup, "EPIDEMICS_GAMMA")?,
        );
        rates.transmission_weight = lookup("EPIDEMICS_TRANSMISSION_WEIGHT");
        rates.recovery_weight = lookup("EPIDEMICS_RECOVERY_WEIGHT");

        let labels = lookup("EPIDEMICS_INITIAL_INFECTED");
        let rho = optional_number(&lookup, "EPIDEMICS_RHO")?;
        let initial_infected = match (labels, rho) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "EPIDEMICS_RHO",
                    "cannot be combined with EPIDEMICS_INITIAL_INFECTED".to_string(),
                ));
            }
            (Some(value), None) => {
                InitialSeeds::Labels(parse_label_list("EPIDEMICS_INITIAL_INFECTED", &value)?)
            }
            (None, Some(rho)) => InitialSeeds::Fraction(rho),
            (None, None) => InitialSeeds::Count(Self::DEFAULT_INITIAL_COUNT),
        };

        let seed = match lookup("EPIDEMICS_SEED") {
            Some(value) => value.parse::<u64>().map_err(|_| {
                invalid(
                    "EPIDEMICS_SEED",
                    format!("'{value}' is not an unsigned integer"),
                )
            })?,
            None => 0,
        };

        let tmax = optional_number(&lookup, "EPIDEMICS_TMAX")?.unwrap_or(f64::INFINITY);

        Ok(Self {
            edge_list,
            directed,
            model,
            algorithm,
            rates,
            initial_infected,
            seed,
            tmax,
        })
    }

    /// Simulation options for `graph`, with seed labels resolved to nodes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a seed label is not in `graph`.
    pub fn options(&self, graph: &Graph) -> Result<SimulationOptions, EpidemicError> {
        let initial_infected = match &self.initial_infected {
            InitialSeeds::Labels(labels) => InitialInfected::Nodes(
                labels
                    .iter()
                    .map(|label| {
                        graph.node(label).ok_or_else(|| {
                            EpidemicError::configuration(
                                "initial_infected",
                                format!("no node labelled '{label}'"),
                            )
                        })
                    })
                    .collect::<Result<_, _>>()?,
            ),
            InitialSeeds::Fraction(rho) => InitialInfected::Fraction(*rho),
            InitialSeeds::Count(count) => InitialInfected::Count(*count),
        };
        Ok(SimulationOptions::new(initial_infected)
            .with_seed(self.seed)
            .with_tmax(self.tmax))
    }
}

fn invalid(name: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message,
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(invalid(name, format!("'{other}' is not a boolean"))),
    }
}

fn optional_number(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<f64>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .parse::<f64>()
                .map_err(|_| invalid(name, format!("'{value}' is not a number")))
        })
        .transpose()
}

fn required_number(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<f64, ConfigError> {
    optional_number(lookup, name)?.ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_label_list(name: &str, value: &str) -> Result<Vec<String>, ConfigError> {
    let labels: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(invalid(name, "no node labels given".to_string()));
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CliConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CliConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("EPIDEMICS_EDGE_LIST", "graph.txt"),
        ("EPIDEMICS_TAU", "0.5"),
        ("EPIDEMICS_GAMMA", "1"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.edge_list, PathBuf::from("graph.txt"));
        assert!(!config.directed);
        assert_eq!(config.model, Model::Sir);
        assert_eq!(config.algorithm, Algorithm::Fast);
        assert_eq!(config.rates, RateConfig::new(0.5, 1.0));
        assert_eq!(
            config.initial_infected,
            InitialSeeds::Count(CliConfig::DEFAULT_INITIAL_COUNT)
        );
        assert_eq!(config.seed, 0);
        assert!(config.tmax.is_infinite());
    }

    #[test]
    fn test_all_values() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("EPIDEMICS_DIRECTED", "true"),
            ("EPIDEMICS_MODEL", "sis"),
            ("EPIDEMICS_ALGORITHM", "gillespie"),
            ("EPIDEMICS_TRANSMISSION_WEIGHT", "weight"),
            ("EPIDEMICS_RECOVERY_WEIGHT", "frailty"),
            ("EPIDEMICS_INITIAL_INFECTED", "3, b,8"),
            ("EPIDEMICS_SEED", "42"),
            ("EPIDEMICS_TMAX", "12.5"),
        ]);
        let config = load(&vars).unwrap();

        assert!(config.directed);
        assert_eq!(config.model, Model::Sis);
        assert_eq!(config.algorithm, Algorithm::Gillespie);
        assert_eq!(
            config.rates,
            RateConfig::new(0.5, 1.0)
                .with_transmission_weight("weight")
                .with_recovery_weight("frailty")
        );
        assert_eq!(
            config.initial_infected,
            InitialSeeds::Labels(vec!["3".to_string(), "b".to_string(), "8".to_string()])
        );

        let graph = Graph::parse_edge_list("3 b\nb 8\n", true).unwrap();
        let options = config.options(&graph).unwrap();
        assert_eq!(options.seed, 42);
        assert_eq!(options.tmax, 12.5);
        assert_eq!(options.initial_infected, InitialInfected::Nodes(vec![0, 1, 2]));
    }

    #[test]
    fn test_rho_selects_fraction() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("EPIDEMICS_RHO", "0.25"));
        let config = load(&vars).unwrap();

        assert_eq!(config.initial_infected, InitialSeeds::Fraction(0.25));
        let options = config.options(&Graph::undirected(4)).unwrap();
        assert_eq!(options.initial_infected, InitialInfected::Fraction(0.25));
    }

    #[test]
    fn test_rho_conflicts_with_initial_infected() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("EPIDEMICS_RHO", "0.5"), ("EPIDEMICS_INITIAL_INFECTED", "1")]);

        let error = load(&vars).unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid value for EPIDEMICS_RHO: cannot be combined with EPIDEMICS_INITIAL_INFECTED"
        );
    }

    #[test]
    fn test_unknown_seed_label() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("EPIDEMICS_INITIAL_INFECTED", "zed"));
        let config = load(&vars).unwrap();

        let error = config.options(&Graph::undirected(3)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid configuration for initial_infected: no node labelled 'zed'"
        );
    }

    #[test]
    fn test_missing_required() {
        let error = load(&REQUIRED[..2]).unwrap_err();
        assert_eq!(error, ConfigError::MissingEnvVar("EPIDEMICS_GAMMA".to_string()));

        let error = load(&REQUIRED[1..]).unwrap_err();
        assert_eq!(
            error.to_string(),
            "missing required environment variable: EPIDEMICS_EDGE_LIST"
        );
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [
            ("EPIDEMICS_MODEL", "seir"),
            ("EPIDEMICS_ALGORITHM", "tau-leap"),
            ("EPIDEMICS_DIRECTED", "maybe"),
            ("EPIDEMICS_RHO", "lots"),
            ("EPIDEMICS_SEED", "-1"),
            ("EPIDEMICS_INITIAL_INFECTED", " , "),
            ("EPIDEMICS_TMAX", "later"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((name, value));
            let error = load(&vars).unwrap_err();
            assert!(
                matches!(&error, ConfigError::InvalidValue { name: n, .. } if n == name),
                "{name}={value} gave {error}"
            );
        }
    }

    #[test]
    fn test_config_error_display_invalid() {
        let error = ConfigError::InvalidValue {
            name: "EPIDEMICS_TAU".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for EPIDEMICS_TAU: bad value");
    }
}
