//! Facet types for `.config/pgmerge.styx`.
//!
//! ```styx
//! database_url "postgres://app@localhost/app"
//! source_schema staging
//! destination_schema public
//! ```
//!
//! Every field is optional. Command-line flags override the file.

use facet::Facet;

/// Project-level defaults for the `pgmerge` command.
#[derive(Facet, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Connection string, used when neither `--database-url` nor
    /// `DATABASE_URL` is set.
    #[facet(default)]
    pub database_url: Option<String>,

    /// Schema for unqualified source table names.
    #[facet(default)]
    pub source_schema: Option<String>,

    /// Schema for unqualified destination table names.
    #[facet(default)]
    pub destination_schema: Option<String>,

    /// Roll back instead of committing.
    #[facet(default)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = facet_styx::from_str(
            r#"
database_url "postgres://app@localhost/app"
source_schema staging
destination_schema public
dry_run true
"#,
        )
        .unwrap();

        assert_eq!(
            config,
            Config {
                database_url: Some("postgres://app@localhost/app".into()),
                source_schema: Some("staging".into()),
                destination_schema: Some("public".into()),
                dry_run: true,
            }
        );
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = facet_styx::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }
}
