//! Interface name and index utilities.

use std::ffi::CString;

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Error type for interface operations.
#[derive(Debug, thiserror::Error)]
pub enum IfError {
    #[error("interface not found: {0}")]
    NotFound(String),

    #[error("invalid interface name: {0}")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, IfError>;

/// Validate an interface name.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(IfError::InvalidName("empty name".to_string()));
    }

    if name.len() >= IFNAMSIZ {
        return Err(IfError::InvalidName(format!(
            "{} is too long (max {} chars)",
            name,
            IFNAMSIZ - 1
        )));
    }

    if name.contains('/') || name.contains('\0') {
        return Err(IfError::InvalidName(format!(
            "{} contains invalid characters",
            name.escape_default()
        )));
    }

    if name.chars().any(|c| c.is_whitespace()) {
        return Err(IfError::InvalidName(format!("{:?} contains whitespace", name)));
    }

    Ok(())
}

/// Convert an interface name to index.
pub fn name_to_index(name: &str) -> Result<u32> {
    validate(name)?;

    let cname = CString::new(name).map_err(|_| IfError::InvalidName(name.to_string()))?;
    // SAFETY: cname is a valid NUL-terminated string for the duration of the call.
    let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if index == 0 {
        return Err(IfError::NotFound(name.to_string()));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(validate("tun0").is_ok());
        assert!(validate("ad_tun0").is_ok());
        assert!(validate("fifteen_chars_x").is_ok());

        assert!(validate("").is_err());
        assert!(validate("sixteen_chars_xx").is_err());
        assert!(validate("tun/0").is_err());
        assert!(validate("tun 0").is_err());
    }

    #[test]
    fn test_loopback_index() {
        assert!(name_to_index("lo").unwrap() > 0);
    }

    #[test]
    fn test_missing_interface() {
        assert!(matches!(
            name_to_index("nosuchif0"),
            Err(IfError::NotFound(_))
        ));
    }
}
