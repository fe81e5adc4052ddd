use super::{
    claims::{IdentityClaims, TokenFooter},
    paserk::PaserkKey,
    Error,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use pasetors::errors::Error as PasetorsError;
use pasetors::footer::Footer;
use pasetors::token::UntrustedToken;
use pasetors::version4::{PublicToken, V4};
use pasetors::Public;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const HEADER: &str = "v4.public.";

pub(crate) struct SigningInput {
    pub pre_auth: Vec<u8>,
    pub payload: Vec<u8>,
    pub footer: Vec<u8>,
}

/// Encode the payload/footer and return the PASETO v4.public signing input.
pub(crate) fn encode_signing_input(
    claims: &IdentityClaims,
    footer: &TokenFooter,
) -> Result<SigningInput, Error> {
    let payload = serde_json::to_vec(claims)?;
    let footer_bytes = serde_json::to_vec(footer)?;
    let pre_auth = pae(&[
        HEADER.as_bytes(),
        payload.as_slice(),
        footer_bytes.as_slice(),
        b"",
    ])?;
    Ok(SigningInput {
        pre_auth,
        payload,
        footer: footer_bytes,
    })
}

/// Build a v4.public token from payload, footer, and Ed25519 signature.
pub(crate) fn build_token(payload: &[u8], footer: &[u8], signature: &[u8; 64]) -> String {
    let mut message = Vec::with_capacity(payload.len() + signature.len());
    message.extend_from_slice(payload);
    message.extend_from_slice(signature);
    let body_b64 = Base64UrlUnpadded::encode_string(&message);
    let footer_b64 = Base64UrlUnpadded::encode_string(footer);
    format!("{HEADER}{body_b64}.{footer_b64}")
}

/// Verify a v4.public token against `key` and return its decoded claims.
///
/// Checks, in order: structure, `kid`, signature, issuer, timestamps and the
/// presence of a non-empty subject and display name.
pub(crate) fn verify_v4_public(
    token: &str,
    key: &PaserkKey,
    expected_issuer: &str,
    now_unix_seconds: i64,
) -> Result<IdentityClaims, Error> {
    let untrusted =
        UntrustedToken::<Public, V4>::try_from(token).map_err(|err| map_paseto_error(&err))?;
    let footer_bytes = untrusted.untrusted_footer();
    if footer_bytes.is_empty() {
        return Err(Error::MissingFooter);
    }

    let kid = footer_kid(footer_bytes)?;
    if kid != key.kid {
        return Err(Error::UnknownKid(kid));
    }
    let public_key = key.to_public_key()?;

    let trusted = PublicToken::verify(&public_key, &untrusted, None, None)
        .map_err(|err| map_paseto_error(&err))?;
    let claims: IdentityClaims = serde_json::from_str(trusted.payload())?;
    validate_claims(&claims, expected_issuer, now_unix_seconds)?;
    Ok(claims)
}

pub(crate) fn rfc3339_from_unix(unix_seconds: i64) -> Result<String, Error> {
    let dt = OffsetDateTime::from_unix_timestamp(unix_seconds).map_err(|_| Error::TimeFormat)?;
    dt.format(&Rfc3339).map_err(|_| Error::TimeFormat)
}

pub(crate) fn unix_from_rfc3339(value: &str) -> Result<i64, Error> {
    let dt = OffsetDateTime::parse(value, &Rfc3339).map_err(|_| Error::TimeParse)?;
    Ok(dt.unix_timestamp())
}

fn validate_claims(
    claims: &IdentityClaims,
    expected_issuer: &str,
    now_unix_seconds: i64,
) -> Result<(), Error> {
    if claims.iss != expected_issuer {
        return Err(Error::InvalidIssuer);
    }
    if claims.sub.trim().is_empty() {
        return Err(Error::MissingClaim("sub"));
    }
    if claims.name.trim().is_empty() {
        return Err(Error::MissingClaim("name"));
    }

    let iat = unix_from_rfc3339(&claims.iat).map_err(|_| Error::InvalidIat)?;
    let exp = unix_from_rfc3339(&claims.exp).map_err(|_| Error::InvalidExp)?;

    if exp <= iat {
        return Err(Error::InvalidExp);
    }
    if exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(())
}

fn footer_kid(footer_bytes: &[u8]) -> Result<String, Error> {
    let mut footer = Footer::new();
    footer
        .parse_bytes(footer_bytes)
        .map_err(|_| Error::InvalidFooter)?;
    let kid = footer
        .get_claim("kid")
        .and_then(|value| value.as_str())
        .ok_or(Error::InvalidFooter)?;
    Ok(kid.to_string())
}

fn pae(pieces: &[&[u8]]) -> Result<Vec<u8>, Error> {
    let count = u64::try_from(pieces.len()).map_err(|_| Error::InvalidLength)?;
    let mut out = Vec::new();
    out.extend_from_slice(&le64(count));
    for piece in pieces {
        let len = u64::try_from(piece.len()).map_err(|_| Error::InvalidLength)?;
        out.extend_from_slice(&le64(len));
        out.extend_from_slice(piece);
    }
    Ok(out)
}

fn le64(mut value: u64) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, byte) in out.iter_mut().enumerate() {
        // PAE clears the most significant bit of the length.
        if i == 7 {
            value &= 0x7f;
        }
        *byte = (value & 0xff) as u8;
        value >>= 8;
    }
    out
}

fn map_paseto_error(err: &PasetorsError) -> Error {
    match err {
        PasetorsError::Base64 => Error::Base64,
        PasetorsError::TokenValidation => Error::InvalidSignature,
        PasetorsError::FooterParsing => Error::InvalidFooter,
        PasetorsError::LossyConversion => Error::InvalidLength,
        _ => Error::TokenFormat,
    }
}
