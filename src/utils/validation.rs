use crate::utils::error::{CtdError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(CtdError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(CtdError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(CtdError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(CtdError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(CtdError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// A table location is either a local path or an http(s) URL.
pub fn validate_location(field_name: &str, location: &str) -> Result<()> {
    if is_remote(location) {
        validate_url(field_name, location)
    } else {
        validate_path(field_name, location)
    }
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(CtdError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CtdError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Reference designators look like `CP02PMUO-WFP01-03-CTDPFK000`.
pub fn validate_refdes(field_name: &str, refdes: &str) -> Result<()> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[A-Z0-9]+-[A-Z0-9]+-[A-Z0-9]+-[A-Z0-9]+$").expect("valid refdes regex")
    });
    if !re.is_match(refdes) {
        return Err(CtdError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: refdes.to_string(),
            reason: "Expected SITE-NODE-PORT-INSTRUMENT".to_string(),
        });
    }
    Ok(())
}

/// Deployments are `D` (deployment cast) or `R` (recovery cast) plus five digits.
pub fn validate_deployment(field_name: &str, deployment: &str) -> Result<()> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[DR]\d{5}$").expect("valid deployment regex"));
    if !re.is_match(deployment) {
        return Err(CtdError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: deployment.to_string(),
            reason: "Expected D or R followed by five digits, e.g. D00009".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("api.base_url", "https://example.com").is_ok());
        assert!(validate_url("api.base_url", "http://example.com").is_ok());
        assert!(validate_url("api.base_url", "").is_err());
        assert!(validate_url("api.base_url", "invalid-url").is_err());
        assert!(validate_url("api.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_location() {
        assert!(validate_location("sources.cast_table", "https://host/cruise_CTDs.csv").is_ok());
        assert!(validate_location("sources.cast_table", "./cruise_CTDs.csv").is_ok());
        assert!(validate_location("sources.cast_table", "").is_err());
    }

    #[test]
    fn test_validate_refdes() {
        assert!(validate_refdes("refdes", "CP02PMUO-WFP01-03-CTDPFK000").is_ok());
        assert!(validate_refdes("refdes", "CP02PMUO-WFP01-03").is_err());
        assert!(validate_refdes("refdes", "").is_err());
    }

    #[test]
    fn test_validate_deployment() {
        assert!(validate_deployment("deployment", "D00009").is_ok());
        assert!(validate_deployment("deployment", "R00012").is_ok());
        assert!(validate_deployment("deployment", "X00009").is_err());
        assert!(validate_deployment("deployment", "D9").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("api.limit", 5, 1).is_ok());
        assert!(validate_positive_number("api.limit", 0, 1).is_err());
    }
}
