use crate::model::generate_short_id;

/// Run-scoped names so concurrent or repeated runs never collide
#[derive(Debug, Clone)]
pub struct UniqueNames {
    prefix: String,
    suffix: String,
}

impl UniqueNames {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: generate_short_id()[..8].to_string(),
        }
    }

    pub fn name(&self, base: &str) -> String {
        format!("{}_{}_{}", self.prefix, base, self.suffix)
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_share_run_suffix() {
        let names = UniqueNames::new("sql");
        let table = names.name("orders");
        assert!(table.starts_with("sql_orders_"));
        assert!(table.ends_with(names.suffix()));
        assert_ne!(UniqueNames::new("sql").suffix(), names.suffix());
    }
}
