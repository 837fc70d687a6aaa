//! Credential Selector (spec §4.4, component C4): pick the auth
//! mechanism for a resource given CLI flags, environment variables, and
//! a trusted-host safety gate for OAuth-token forwarding.

use cloudxfer_core::{Error, Location, Result};

/// The set of credential mechanisms the engine can hand a backend.
/// Distinct from any one SDK's own credential-provider type: this is
/// the cooked, already-decided choice C4 produces.
#[derive(Debug, Clone)]
pub enum Credential {
    Anonymous,
    SharedKey { account: String, key: String },
    SasToken { sas: String },
    OAuthToken { token: String },
    /// Token reused for the destination leg of an S2S transfer after
    /// the source leg already minted one.
    ForwardedOAuthToken { token: String },
    /// Token minted after an anonymous probe against an `md-`-prefixed
    /// host came back challenged for auth (spec §4.4 step 6).
    MDOAuthToken { token: String },
    S3AccessKey { access_key_id: String, secret_access_key: String, session_token: Option<String> },
    S3PublicBucket,
    GoogleApplicationCredentials { path: String },
}

/// Raw inputs the CLI layer gathers before C4 makes a decision. Mirrors
/// the env vars and flags enumerated in spec §3/§4.4.
#[derive(Debug, Clone, Default)]
pub struct CredentialInputs {
    pub cred_type_override: Option<String>,
    pub sas_token: Option<String>,
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub oauth_token: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,
    pub s3_public_bucket: bool,
    pub google_application_credentials: Option<String>,
}

impl CredentialInputs {
    /// Reads the subset of spec §3 env vars relevant to credential
    /// selection. CLI flags (threaded in separately by the caller)
    /// always take precedence over these when both are present.
    pub fn from_env() -> Self {
        Self {
            cred_type_override: std::env::var("CLOUDXFER_CRED_TYPE").ok(),
            sas_token: None,
            account_name: std::env::var("AZCOPY_ACCOUNT_NAME").ok(),
            account_key: std::env::var("AZCOPY_ACCOUNT_KEY").ok(),
            oauth_token: None,
            aws_access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
            aws_session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            s3_public_bucket: std::env::var("CLOUDXFER_S3_IS_PUBLIC")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            google_application_credentials: std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
        }
    }
}

/// Hosts an OAuth token minted for one cloud is allowed to be forwarded
/// to, without the user explicitly opting back in. Forwarding a token
/// to an untrusted host would leak it to a third party the user never
/// named.
const TRUSTED_OAUTH_SUFFIXES: &[&str] = &[
    ".core.windows.net",
    ".core.chinacloudapi.cn",
    ".core.cloudapi.de",
    ".core.usgovcloudapi.net",
];

/// True if `host` is one cloudxfer will forward an already-minted OAuth
/// token to without requiring an explicit `--trusted-suffix` override.
pub fn is_trusted_oauth_host(host: &str, extra_trusted_suffixes: &[String]) -> bool {
    TRUSTED_OAUTH_SUFFIXES
        .iter()
        .any(|suffix| host.ends_with(suffix))
        || extra_trusted_suffixes.iter().any(|s| host.ends_with(s.as_str()))
}

/// Forces a specific credential mechanism from `CLOUDXFER_CRED_TYPE`
/// (spec §4.4 step 2), bypassing the rest of the cascade. Recognizes
/// `anonymous`, `sharedkey`, `sastoken`, `oauthtoken` (case-insensitive);
/// any other value is an input error rather than a silent fallthrough.
fn apply_cred_type_override(
    override_value: &str,
    host: &str,
    inputs: &CredentialInputs,
    extra_trusted_suffixes: &[String],
) -> Result<Credential> {
    match override_value.to_ascii_lowercase().as_str() {
        "anonymous" => Ok(Credential::Anonymous),
        "sastoken" => inputs
            .sas_token
            .clone()
            .map(|sas| Credential::SasToken { sas })
            .ok_or_else(|| Error::AuthMissing("CLOUDXFER_CRED_TYPE=SasToken but no SAS token was provided".to_string())),
        "sharedkey" => {
            if !is_trusted_oauth_host(host, extra_trusted_suffixes) {
                return Err(Error::AuthUnsafe { host: host.to_string() });
            }
            match (&inputs.account_name, &inputs.account_key) {
                (Some(account), Some(key)) => Ok(Credential::SharedKey {
                    account: account.clone(),
                    key: key.clone(),
                }),
                _ => Err(Error::AuthMissing(
                    "CLOUDXFER_CRED_TYPE=SharedKey but AZCOPY_ACCOUNT_NAME/AZCOPY_ACCOUNT_KEY are not both set".to_string(),
                )),
            }
        }
        "oauthtoken" => {
            if !is_trusted_oauth_host(host, extra_trusted_suffixes) {
                return Err(Error::AuthUnsafe { host: host.to_string() });
            }
            inputs
                .oauth_token
                .clone()
                .map(|token| Credential::OAuthToken { token })
                .ok_or_else(|| Error::AuthMissing("CLOUDXFER_CRED_TYPE=OAuthToken but no token is cached; run `cloudxfer login`".to_string()))
        }
        other => Err(Error::invalid_input(format!(
            "unrecognized CLOUDXFER_CRED_TYPE {other:?}"
        ))),
    }
}

/// Probes `resource_url` with an anonymous HEAD request. `Ok(true)`
/// means the request went through without needing auth (public
/// access); `Ok(false)` means the server challenged it (401/403).
/// Network failures are folded into `Ok(false)` so a probe failure
/// falls through to the ordinary "no credentials found" error rather
/// than aborting the whole selection.
async fn anonymous_head_probe(resource_url: &str) -> bool {
    match reqwest::Client::new().head(resource_url).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

/// `true` if an anonymous HEAD against `resource_url` came back
/// challenged for auth (401/403, optionally with `WWW-Authenticate`).
async fn head_probe_requires_auth(resource_url: &str) -> bool {
    match reqwest::Client::new().head(resource_url).send().await {
        Ok(response) => {
            matches!(response.status().as_u16(), 401 | 403)
        }
        Err(_) => false,
    }
}

/// Resolves the credential to use for one endpoint, given its inferred
/// `Location` and the gathered `CredentialInputs`. `host` is the
/// resource's network host (empty for local paths); `resource_url` is
/// the full URL used for the anonymous/`md-`-host HEAD probes (spec
/// §4.4 steps 5-6); `forwarded_token` is `Some` when the engine is
/// considering reusing the source leg's OAuth token for an S2S
/// destination.
pub async fn select_credential(
    location: Location,
    host: &str,
    resource_url: &str,
    inputs: &CredentialInputs,
    forwarded_token: Option<&str>,
    extra_trusted_suffixes: &[String],
) -> Result<Credential> {
    if !location.is_remote() {
        return Ok(Credential::Anonymous);
    }

    if let Some(token) = forwarded_token {
        if !location.can_forward_oauth_tokens() {
            return Err(Error::invalid_input(format!(
                "cannot forward an OAuth token to a {location} destination"
            )));
        }
        if !is_trusted_oauth_host(host, extra_trusted_suffixes) {
            return Err(Error::AuthUnsafe {
                host: host.to_string(),
            });
        }
        return Ok(Credential::ForwardedOAuthToken {
            token: token.to_string(),
        });
    }

    if let Some(override_value) = &inputs.cred_type_override {
        return apply_cred_type_override(override_value, host, inputs, extra_trusted_suffixes);
    }

    match location {
        Location::S3 => {
            if let (Some(id), Some(secret)) =
                (&inputs.aws_access_key_id, &inputs.aws_secret_access_key)
            {
                return Ok(Credential::S3AccessKey {
                    access_key_id: id.clone(),
                    secret_access_key: secret.clone(),
                    session_token: inputs.aws_session_token.clone(),
                });
            }
            if inputs.s3_public_bucket {
                return Ok(Credential::S3PublicBucket);
            }
            Err(Error::AuthMissing(
                "no AWS credentials found: set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY, \
                 use an AWS credential profile, or pass --s3-public-bucket"
                    .to_string(),
            ))
        }
        Location::GCP => {
            if let Some(path) = &inputs.google_application_credentials {
                return Ok(Credential::GoogleApplicationCredentials { path: path.clone() });
            }
            Err(Error::AuthMissing(
                "no Google credentials found: set GOOGLE_APPLICATION_CREDENTIALS".to_string(),
            ))
        }
        Location::Blob | Location::BlobFS | Location::File | Location::FileNFS => {
            if let Some(sas) = &inputs.sas_token {
                return Ok(Credential::SasToken { sas: sas.clone() });
            }
            if let (Some(account), Some(key)) = (&inputs.account_name, &inputs.account_key) {
                if !is_trusted_oauth_host(host, extra_trusted_suffixes) {
                    return Err(Error::AuthUnsafe {
                        host: host.to_string(),
                    });
                }
                return Ok(Credential::SharedKey {
                    account: account.clone(),
                    key: key.clone(),
                });
            }
            if let Some(token) = &inputs.oauth_token {
                if !is_trusted_oauth_host(host, extra_trusted_suffixes) {
                    return Err(Error::AuthUnsafe {
                        host: host.to_string(),
                    });
                }
                return Ok(Credential::OAuthToken {
                    token: token.clone(),
                });
            }

            if host.starts_with("md-") {
                if head_probe_requires_auth(resource_url).await {
                    if let Some(token) = &inputs.oauth_token {
                        return Ok(Credential::MDOAuthToken {
                            token: token.clone(),
                        });
                    }
                    return Err(Error::AuthMissing(format!(
                        "{host} challenged for auth but no token is cached; run `cloudxfer login`"
                    )));
                }
                return Ok(Credential::Anonymous);
            }

            if location == Location::Blob && anonymous_head_probe(resource_url).await {
                return Ok(Credential::Anonymous);
            }

            Err(Error::AuthMissing(format!(
                "no credentials found for {location}: provide a SAS token, an account \
                 key, or run `cloudxfer login`"
            )))
        }
        _ => Ok(Credential::Anonymous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_is_always_anonymous() {
        let inputs = CredentialInputs::default();
        let cred = select_credential(Location::Local, "", "", &inputs, None, &[]).await.unwrap();
        assert!(matches!(cred, Credential::Anonymous));
    }

    #[tokio::test]
    async fn s3_without_keys_or_public_flag_is_auth_missing() {
        let inputs = CredentialInputs::default();
        let err = select_credential(
            Location::S3,
            "bucket.s3.amazonaws.com",
            "https://bucket.s3.amazonaws.com",
            &inputs,
            None,
            &[],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AuthMissing(_)));
    }

    #[tokio::test]
    async fn forwarding_token_to_untrusted_host_is_rejected() {
        let inputs = CredentialInputs::default();
        let err = select_credential(
            Location::Blob,
            "evil.example.com",
            "https://evil.example.com",
            &inputs,
            Some("token"),
            &[],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AuthUnsafe { .. }));
    }

    #[tokio::test]
    async fn forwarding_token_to_trusted_host_succeeds() {
        let inputs = CredentialInputs::default();
        let cred = select_credential(
            Location::Blob,
            "account.blob.core.windows.net",
            "https://account.blob.core.windows.net",
            &inputs,
            Some("token"),
            &[],
        )
        .await
        .unwrap();
        assert!(matches!(cred, Credential::ForwardedOAuthToken { .. }));
    }

    #[tokio::test]
    async fn extra_trusted_suffix_is_honored() {
        let inputs = CredentialInputs::default();
        let cred = select_credential(
            Location::Blob,
            "account.blob.mycloud.internal",
            "https://account.blob.mycloud.internal",
            &inputs,
            Some("token"),
            &["mycloud.internal".to_string()],
        )
        .await
        .unwrap();
        assert!(matches!(cred, Credential::ForwardedOAuthToken { .. }));
    }

    #[tokio::test]
    async fn cred_type_override_forces_anonymous_even_with_keys_present() {
        let mut inputs = CredentialInputs::default();
        inputs.cred_type_override = Some("Anonymous".to_string());
        inputs.account_name = Some("acct".to_string());
        inputs.account_key = Some("key".to_string());
        let cred = select_credential(
            Location::Blob,
            "account.blob.core.windows.net",
            "https://account.blob.core.windows.net",
            &inputs,
            None,
            &[],
        )
        .await
        .unwrap();
        assert!(matches!(cred, Credential::Anonymous));
    }

    #[tokio::test]
    async fn shared_key_selection_is_rejected_for_an_untrusted_host() {
        let mut inputs = CredentialInputs::default();
        inputs.account_name = Some("acct".to_string());
        inputs.account_key = Some("key".to_string());
        let err = select_credential(
            Location::Blob,
            "account.blob.evil.example.com",
            "https://account.blob.evil.example.com",
            &inputs,
            None,
            &[],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AuthUnsafe { .. }));
    }
}
