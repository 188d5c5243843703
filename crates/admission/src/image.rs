//! Container image reference grammar (`[domain/]path[:tag][@algo:hex]`).

use once_cell::sync::Lazy;
use regex::Regex;

const NAME_TOTAL_LENGTH_MAX: usize = 255;

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    let domain_component = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";
    let domain = format!(r"{dc}(?:\.{dc})*(?::[0-9]+)?", dc = domain_component);
    let path_component = r"[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*";
    let name = format!(r"(?:{domain}/)?{pc}(?:/{pc})*", pc = path_component);
    let tag = r"[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}";
    let digest = r"[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9A-Fa-f]{32,}";
    let pattern = format!(r"^(?P<name>{name})(?::(?P<tag>{tag}))?(?:@(?P<digest>{digest}))?$");
    Regex::new(&pattern).expect("image reference grammar")
});

/// Why an image reference was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("repository name must have at least one component")]
    Empty,
    #[error("invalid reference format")]
    Format,
    #[error("repository name must not be more than {NAME_TOTAL_LENGTH_MAX} characters")]
    NameTooLong,
    #[error("unsupported digest algorithm {0}")]
    UnsupportedDigest(String),
    #[error("invalid checksum digest length")]
    DigestLength,
}

fn digest_hex_len(algorithm: &str) -> Option<usize> {
    match algorithm {
        "sha256" => Some(64),
        "sha384" => Some(96),
        "sha512" => Some(128),
        _ => None,
    }
}

/// Parse `image` against the reference grammar.
pub fn parse_reference(image: &str) -> Result<(), ReferenceError> {
    if image.is_empty() {
        return Err(ReferenceError::Empty);
    }
    let caps = REFERENCE.captures(image).ok_or(ReferenceError::Format)?;
    if caps.name("name").map(|m| m.as_str().len()).unwrap_or(0) > NAME_TOTAL_LENGTH_MAX {
        return Err(ReferenceError::NameTooLong);
    }
    if let Some(d) = caps.name("digest") {
        let (algorithm, hex) = d.as_str().split_once(':').ok_or(ReferenceError::Format)?;
        let want = digest_hex_len(algorithm).ok_or_else(|| ReferenceError::UnsupportedDigest(algorithm.to_string()))?;
        if hex.len() != want {
            return Err(ReferenceError::DigestLength);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_tags_and_digests() {
        for ok in [
            "test/coherence:1.0",
            "ghcr.io@sha256:f8a592ee6d31c02feea037c269a87564ae666f91480d1d6be24ff9dd1675c7d0",
            "registry.local:5000/team/app",
            "busybox",
        ] {
            assert_eq!(parse_reference(ok), Ok(()), "{ok}");
        }
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse_reference("test/bad image name:1.0"), Err(ReferenceError::Format));
        assert_eq!(parse_reference("test/coherence:1.0 "), Err(ReferenceError::Format));
        assert_eq!(parse_reference("UPPER:1.0"), Err(ReferenceError::Format));
        assert_eq!(parse_reference(""), Err(ReferenceError::Empty));
        assert!(parse_reference("test@sha256:1234").is_err());
        let short = format!("test@sha256:{}", "a".repeat(40));
        assert_eq!(parse_reference(&short), Err(ReferenceError::DigestLength));
        let odd = format!("test@md5:{}", "a".repeat(32));
        assert_eq!(parse_reference(&odd), Err(ReferenceError::UnsupportedDigest("md5".into())));
    }
}
