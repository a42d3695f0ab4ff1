use crate::provide_credential::{ConfigCredentialProvider, EnvCredentialProvider};
use crate::{Config, Credential};
use async_trait::async_trait;
use log::debug;
use s3sign_core::{Context, ProvideCredential, Result};
use std::sync::Arc;

/// DefaultCredentialProvider tries the known sources in order.
///
/// Resolution order:
///
/// 1. The key pair set on [`Config`]
/// 2. Environment variables
#[derive(Debug)]
pub struct DefaultCredentialProvider {
    config_provider: ConfigCredentialProvider,
    env_provider: EnvCredentialProvider,
}

impl Default for DefaultCredentialProvider {
    fn default() -> Self {
        Self::new(Arc::new(Config::default()))
    }
}

impl DefaultCredentialProvider {
    /// Create a new `DefaultCredentialProvider` instance.
    pub fn new(cfg: Arc<Config>) -> Self {
        Self {
            config_provider: ConfigCredentialProvider::new(cfg),
            env_provider: EnvCredentialProvider::new(),
        }
    }
}

#[async_trait]
impl ProvideCredential for DefaultCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        if let Some(cred) = self.config_provider.provide_credential(ctx).await? {
            debug!("load credential via config");
            return Ok(Some(cred));
        }

        if let Some(cred) = self.env_provider.provide_credential(ctx).await? {
            debug!("load credential via env");
            return Ok(Some(cred));
        }

        debug!("no credential found in config or env");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY};
    use s3sign_core::StaticEnv;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_default_provider_prefers_config() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let ctx = Context::new().with_env(StaticEnv {
            envs: HashMap::from([
                (AWS_ACCESS_KEY_ID.to_string(), "env_ak".to_string()),
                (AWS_SECRET_ACCESS_KEY.to_string(), "env_sk".to_string()),
            ]),
        });

        let provider = DefaultCredentialProvider::new(Arc::new(Config {
            access_key_id: Some("cfg_ak".to_string()),
            secret_access_key: Some("cfg_sk".to_string()),
            ..Default::default()
        }));
        let cred = provider.provide_credential(&ctx).await?.expect("must exist");
        assert_eq!(cred.access_key_id, "cfg_ak");

        let cred = DefaultCredentialProvider::default()
            .provide_credential(&ctx)
            .await?
            .expect("must exist");
        assert_eq!(cred.access_key_id, "env_ak");

        Ok(())
    }

    #[tokio::test]
    async fn test_default_provider_without_sources() -> Result<()> {
        let cred = DefaultCredentialProvider::default()
            .provide_credential(&Context::new())
            .await?;
        assert!(cred.is_none());
        Ok(())
    }
}
