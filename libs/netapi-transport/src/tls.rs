//! TLS client configuration.
//!
//! Native root certificates are loaded once per process and cached. The
//! per-connection knobs are certificate validation and a cipher suite
//! allow-list.

use std::sync::{Arc, OnceLock};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

use crate::error::TransportError;

static NATIVE_ROOTS_CACHE: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static LOAD_COUNT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_certs_inner() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    LOAD_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }

    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }

    result.certs
}

/// Cached native root certificates (may be empty).
pub fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS_CACHE
        .get_or_init(load_native_certs_inner)
        .as_slice()
}

/// The process-wide default provider if one is installed, aws-lc-rs otherwise.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Canonical form for cipher suite names: upper case, `-` read as `_`.
fn normalize_suite_name(name: &str) -> String {
    name.trim().to_ascii_uppercase().replace('-', "_")
}

fn suite_name(suite: rustls::SupportedCipherSuite) -> &'static str {
    suite.suite().as_str().unwrap_or("UNKNOWN")
}

/// Restrict `provider` to the named cipher suites.
///
/// Names are rustls suite names such as `TLS13_AES_256_GCM_SHA384` or
/// `TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256`, compared case-insensitively.
/// Unknown names are logged and skipped.
///
/// # Errors
///
/// Returns [`TransportError::Tls`] if no named suite is supported.
pub fn restrict_cipher_suites(
    provider: &CryptoProvider,
    ciphers: &[String],
) -> Result<CryptoProvider, TransportError> {
    let wanted: Vec<String> = ciphers
        .iter()
        .map(|c| normalize_suite_name(c))
        .filter(|c| !c.is_empty())
        .collect();

    let mut restricted = provider.clone();
    restricted
        .cipher_suites
        .retain(|suite| wanted.iter().any(|name| name == suite_name(*suite)));

    if restricted.cipher_suites.len() < wanted.len() {
        let known: Vec<&str> = restricted
            .cipher_suites
            .iter()
            .map(|suite| suite_name(*suite))
            .collect();
        for name in wanted.iter().filter(|name| !known.contains(&name.as_str())) {
            tracing::warn!(cipher = %name, "ignoring unsupported TLS cipher suite");
        }
    }

    if restricted.cipher_suites.is_empty() {
        return Err(TransportError::Tls(format!(
            "none of the requested cipher suites are supported: {}",
            ciphers.join(":")
        )));
    }
    Ok(restricted)
}

/// Build a rustls `ClientConfig` for one connection.
///
/// With `validate_certs` the server chain is checked against the cached
/// native roots; without it any certificate is accepted (handshake
/// signatures are still verified).
///
/// # Errors
///
/// Returns [`TransportError::Tls`] if certificate validation is requested
/// but no usable root certificate exists, if the cipher allow-list matches
/// nothing, or if rustls rejects the protocol configuration.
pub fn client_config(
    validate_certs: bool,
    ciphers: Option<&[String]>,
) -> Result<rustls::ClientConfig, TransportError> {
    let mut provider = crypto_provider();
    if let Some(ciphers) = ciphers.filter(|c| !c.is_empty()) {
        provider = Arc::new(restrict_cipher_suites(&provider, ciphers)?);
    }

    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Tls(format!("failed to set TLS protocol versions: {e}")))?;

    if !validate_certs {
        tracing::debug!("TLS certificate validation disabled");
        return Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_no_client_auth());
    }

    let certs = native_root_certs();
    if certs.is_empty() {
        return Err(TransportError::Tls(
            "no native root CA certificates found in OS certificate store".to_owned(),
        ));
    }

    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }
    if added == 0 {
        return Err(TransportError::Tls(format!(
            "no valid native root CA certificates parsed (found {}, all failed to parse)",
            certs.len()
        )));
    }

    Ok(builder
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

/// Verifier used when certificate validation is turned off.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn native_roots_loaded_at_most_once() {
        let initial = LOAD_COUNT.load(Ordering::SeqCst);
        let first = native_root_certs();
        let second = native_root_certs();

        assert!(LOAD_COUNT.load(Ordering::SeqCst) <= initial + 1);
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn unvalidated_config_builds_without_roots() {
        assert!(client_config(false, None).is_ok());
    }

    #[test]
    fn cipher_names_are_case_and_dash_insensitive() {
        let provider = rustls::crypto::aws_lc_rs::default_provider();
        let restricted = restrict_cipher_suites(
            &provider,
            &["tls13-aes-256-gcm-sha384".to_owned(), "NOT_A_SUITE".to_owned()],
        )
        .unwrap();

        assert_eq!(restricted.cipher_suites.len(), 1);
        assert_eq!(
            suite_name(restricted.cipher_suites[0]),
            "TLS13_AES_256_GCM_SHA384"
        );
    }

    #[test]
    fn unknown_ciphers_only_is_an_error() {
        let provider = rustls::crypto::aws_lc_rs::default_provider();
        let err = restrict_cipher_suites(&provider, &["RC4-MD5".to_owned()]).unwrap_err();
        assert!(matches!(err, TransportError::Tls(msg) if msg.contains("RC4-MD5")));
    }

    #[test]
    fn restricted_config_builds() {
        let ciphers = vec!["TLS13_AES_128_GCM_SHA256".to_owned()];
        assert!(client_config(false, Some(&ciphers)).is_ok());
    }
}
