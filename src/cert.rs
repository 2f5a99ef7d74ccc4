//! Certificate chain inspection.

use x509_cert::{der::Decode as _, Certificate};

use crate::error::{Error, Result};

/// True when any certificate in the PEM chain was issued by a CA whose
/// common name is `issuer_cn`.
///
/// Used to pick between the default and alternate chains of an issued
/// certificate.
pub(crate) fn chain_matches_issuer(pem_chain: &str, issuer_cn: &str) -> Result<bool> {
    let mut reader = pem_chain.as_bytes();

    for der in rustls_pemfile::certs(&mut reader) {
        let der = der.map_err(|_| Error::UnexpectedResponse("malformed certificate chain"))?;

        let certificate = Certificate::from_der(&der)
            .map_err(|_| Error::UnexpectedResponse("malformed certificate in chain"))?;

        if name_has_cn(&certificate.tbs_certificate.issuer.to_string(), issuer_cn) {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Matches a CN attribute inside an RFC 4514 distinguished name string.
fn name_has_cn(name: &str, cn: &str) -> bool {
    name.split(',')
        .filter_map(|component| component.trim().strip_prefix("CN="))
        .any(|value| value == cn)
}
