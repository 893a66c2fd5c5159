use crate::domain_port::*;
use std::env::VarError;

/// Reads secrets from environment variables named `{prefix}{NAME}`, with the
/// name upper-cased and `-`, `.` and `/` turned into `_`.
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        EnvSecretStore {
            prefix: prefix.into(),
        }
    }

    pub fn var_name(&self, name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| match c {
                '-' | '.' | '/' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("{}{}", self.prefix, suffix)
    }
}

#[async_trait::async_trait]
impl SecretStore for EnvSecretStore {
    async fn fetch_secret(&self, name: &str) -> Result<String, SecretError> {
        let var = self.var_name(name);
        match std::env::var(&var) {
            Ok(value) => Ok(value),
            Err(VarError::NotPresent) => Err(SecretError::NotFound(name.to_string())),
            Err(VarError::NotUnicode(_)) => {
                Err(SecretError::NotFound(format!("{name} (not valid unicode)")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_secret_names_to_variable_names() {
        let store = EnvSecretStore::new("FINTRACK_SECRET_");
        assert_eq!(store.var_name("fintrack/jwt-kid"), "FINTRACK_SECRET_FINTRACK_JWT_KID");
        assert_eq!(store.var_name("a.b"), "FINTRACK_SECRET_A_B");
    }

    #[tokio::test]
    async fn reads_present_variables_only() {
        let store = EnvSecretStore::new("ENV_SECRET_STORE_TEST_");
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("ENV_SECRET_STORE_TEST_PRESENT", "value") };

        assert_eq!(store.fetch_secret("present").await.unwrap(), "value");
        assert!(matches!(
            store.fetch_secret("absent").await,
            Err(SecretError::NotFound(_))
        ));
    }
}
