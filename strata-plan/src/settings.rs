/// Environment variable read by [`MutationSettings::from_env`].
pub const OPTIMIZER_FK_CHECKS_ENV: &str = "STRATA_OPTIMIZER_FK_CHECKS";

/// Runtime switches consulted when a statement builder is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutationSettings {
    /// Generate foreign key check plans. When off, statements touching foreign keys set the
    /// fallback flag and leave enforcement to the executor.
    pub optimizer_fk_checks: bool,
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            optimizer_fk_checks: true,
        }
    }
}

impl MutationSettings {
    pub fn with_optimizer_fk_checks(mut self, enabled: bool) -> Self {
        self.optimizer_fk_checks = enabled;
        self
    }

    /// Defaults, overridden by `STRATA_OPTIMIZER_FK_CHECKS` (`0`, `false` or `off` disable).
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(value) = std::env::var(OPTIMIZER_FK_CHECKS_ENV) {
            settings.optimizer_fk_checks = parse_flag(&value);
            tracing::debug!(
                optimizer_fk_checks = settings.optimizer_fk_checks,
                "{OPTIMIZER_FK_CHECKS_ENV} override"
            );
        }
        settings
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag(" off "));
        assert!(!parse_flag("0"));
        assert!(MutationSettings::default().optimizer_fk_checks);
        assert!(
            !MutationSettings::default()
                .with_optimizer_fk_checks(false)
                .optimizer_fk_checks
        );
    }
}
