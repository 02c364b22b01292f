//! Compiler configuration.

/// Configuration recognized by the compiler.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Identifier of the dialect implementation.
    pub dialect: String,
    /// Overrides the dialect's join ceiling when set.
    pub max_joins_per_statement: Option<usize>,
    /// Minimum membership-list size that triggers scratch-table
    /// materialization.
    pub temp_table_threshold: usize,
    /// When true, label-keyed filters do not narrow table enumeration at
    /// resolution time.
    pub ignore_label_optimization: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialect: "postgres".to_string(),
            max_joins_per_statement: None,
            temp_table_threshold: 1000,
            ignore_label_optimization: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.dialect, "postgres");
        assert_eq!(config.max_joins_per_statement, None);
        assert_eq!(config.temp_table_threshold, 1000);
        assert!(!config.ignore_label_optimization);
    }

    #[test]
    fn partial_json() {
        let config: CompilerConfig =
            serde_json::from_str(r#"{"temp_table_threshold": 2}"#).expect("valid config");
        assert_eq!(config.temp_table_threshold, 2);
        assert_eq!(config.dialect, "postgres");
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(serde_json::from_str::<CompilerConfig>(r#"{"nope": 1}"#).is_err());
    }
}
