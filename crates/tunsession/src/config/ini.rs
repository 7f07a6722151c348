//! INI configuration loader.
//!
//! ```ini
//! [tun]
//! name = tun0
//! ipv4 = 10.8.0.1/24
//! ipv6 = fd00::1/64
//! mtu = 1400
//! persist = 0
//! ```
//!
//! Only the `[tun]` section is read, `[ad_tun]` being accepted as an alias.
//! `ifname` is accepted as an alias of `name`. Comments start with `;` or `#`, inline comments with ` ;` or ` #`.

use std::path::Path;

use tracing::{debug, info, warn};
use winnow::combinator::{alt, delimited};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{one_of, rest, take_till};

use super::{TunConfig, clamp_mtu};
use crate::error::{Error, Result};

/// Section holding the device parameters.
pub const SECTION: &str = "tun";

/// Older name of [`SECTION`], still read.
pub const SECTION_ALIAS: &str = "ad_tun";

fn is_device_section(name: &str) -> bool {
    name.eq_ignore_ascii_case(SECTION) || name.eq_ignore_ascii_case(SECTION_ALIAS)
}

/// Result type for winnow parsers.
type PResult<T> = core::result::Result<T, winnow::error::ErrMode<ContextError>>;

/// One meaningful line of an INI file.
#[derive(Debug, PartialEq, Eq)]
enum Line<'s> {
    Section(&'s str),
    Entry(&'s str, &'s str),
}

/// Parse `[name]`.
fn section<'s>(input: &mut &'s str) -> PResult<&'s str> {
    delimited('[', take_till(1.., ']'), ']')
        .map(str::trim)
        .parse_next(input)
}

/// Parse `key = value` or `key: value`.
fn entry<'s>(input: &mut &'s str) -> PResult<(&'s str, &'s str)> {
    let key = take_till(1.., ['=', ':']).parse_next(input)?;
    one_of(['=', ':']).parse_next(input)?;
    let value = rest.parse_next(input)?;
    Ok((key.trim(), value.trim()))
}

fn line<'s>(input: &mut &'s str) -> PResult<Line<'s>> {
    alt((
        section.map(Line::Section),
        entry.map(|(key, value)| Line::Entry(key, value)),
    ))
    .parse_next(input)
}

/// Drop an inline comment (` ;` or ` #`).
fn strip_inline_comment(line: &str) -> &str {
    [" ;", " #", "\t;", "\t#"]
        .iter()
        .filter_map(|marker| line.find(marker))
        .min()
        .map_or(line, |pos| &line[..pos])
}

/// Raw values collected from the `[tun]` section.
#[derive(Debug, Default)]
struct RawConfig {
    name: Option<String>,
    ipv4: Option<String>,
    ipv6: Option<String>,
    mtu: Option<String>,
    persist: Option<String>,
}

impl RawConfig {
    fn set(&mut self, key: &str, value: &str) {
        let slot = match key {
            "name" | "ifname" => &mut self.name,
            "ipv4" => &mut self.ipv4,
            "ipv6" => &mut self.ipv6,
            "mtu" => &mut self.mtu,
            "persist" => &mut self.persist,
            _ => {
                warn!(key, "unknown config key ignored");
                return;
            }
        };
        debug!(key, value, "config key");
        *slot = Some(value.to_string());
    }

    fn into_config(self) -> Result<TunConfig> {
        let name = required(self.name, "name")?;
        let ipv4 = required(self.ipv4, "ipv4")?;

        let mut config = TunConfig::new(name, ipv4);

        match self.ipv6.filter(|v| !v.is_empty()) {
            Some(ipv6) => config = config.ipv6(ipv6),
            None => warn!("ipv6 is missing or empty, IPv6 disabled"),
        }

        if let Some(raw) = self.mtu {
            let mtu = raw.parse::<i64>().unwrap_or_else(|_| {
                warn!(value = %raw, "mtu is not a number");
                0
            });
            config = config.mtu(clamp_mtu(mtu));
        }

        if let Some(raw) = self.persist {
            config = config.persist(parse_bool(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "persist should be 0 or 1, using 0");
                false
            }));
        }

        config.validate()?;
        Ok(config)
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidConfig(format!("'{}' is missing or empty", key)))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a configuration from INI text.
pub fn parse(text: &str) -> Result<TunConfig> {
    let mut raw = RawConfig::default();
    let mut current: Option<&str> = None;

    for (idx, source) in text.lines().enumerate() {
        let trimmed = source.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }
        let trimmed = strip_inline_comment(trimmed).trim_end();

        let parsed = line.parse(trimmed).map_err(|_| {
            Error::InvalidConfig(format!("line {}: cannot parse {:?}", idx + 1, trimmed))
        })?;

        match parsed {
            Line::Section(name) => {
                if !is_device_section(name) {
                    debug!(section = name, "ignoring section");
                }
                current = Some(name);
            }
            Line::Entry(key, value) => match current {
                Some(section) if is_device_section(section) => raw.set(key, value),
                _ => {}
            },
        }
    }

    raw.into_config()
}

/// Load a configuration from an INI file.
pub fn load(path: &Path) -> Result<TunConfig> {
    info!(path = %path.display(), "loading config file");
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
    let config = parse(&text)?;
    debug!(?config, "config loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MTU;
    use crate::error::ErrorKind;

    #[test]
    fn test_line_parsers() {
        assert_eq!(line.parse("[tun]").unwrap(), Line::Section("tun"));
        assert_eq!(line.parse("[ other ]").unwrap(), Line::Section("other"));
        assert_eq!(
            line.parse("ipv6 = fd00::1/64").unwrap(),
            Line::Entry("ipv6", "fd00::1/64")
        );
        assert_eq!(line.parse("mtu: 1400").unwrap(), Line::Entry("mtu", "1400"));
        assert_eq!(line.parse("name =").unwrap(), Line::Entry("name", ""));
        assert!(line.parse("just words").is_err());
        assert!(line.parse("[]").is_err());
    }

    #[test]
    fn test_strip_inline_comment() {
        assert_eq!(strip_inline_comment("mtu = 1400 ; jumbo"), "mtu = 1400");
        assert_eq!(strip_inline_comment("name = tun0 # main"), "name = tun0");
        assert_eq!(strip_inline_comment("name = tun#0"), "name = tun#0");
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            "; tunnel settings\n\
             [tun]\n\
             name = tun0\n\
             ipv4 = 10.8.0.1/24\n\
             ipv6 = fd00::1/64\n\
             mtu = 1400\n\
             persist = 1\n",
        )
        .unwrap();

        assert_eq!(config.name(), "tun0");
        assert_eq!(config.ipv4_cidr(), "10.8.0.1/24");
        assert_eq!(config.ipv6_cidr(), Some("fd00::1/64"));
        assert_eq!(config.mtu_value(), 1400);
        assert!(config.is_persistent());
    }

    #[test]
    fn test_ifname_alias_and_last_wins() {
        let config = parse("[tun]\nifname = tun1\nipv4 = 10.0.0.1/8\nipv4 = 10.0.0.2/8\n").unwrap();
        assert_eq!(config.name(), "tun1");
        assert_eq!(config.ipv4_cidr(), "10.0.0.2/8");
    }

    #[test]
    fn test_ad_tun_section_layout() {
        let config = parse(
            "[ad_tun]\n\
             ifname = ad_tun0\n\
             ipv4 = 10.10.1.2/24\n\
             ipv6 = fea0:1234:5678::9/64\n\
             mtu = 2400\n\
             persist = 0\n",
        )
        .unwrap();

        assert_eq!(config.name(), "ad_tun0");
        assert_eq!(config.ipv4_cidr(), "10.10.1.2/24");
        assert_eq!(config.ipv6_cidr(), Some("fea0:1234:5678::9/64"));
        assert_eq!(config.mtu_value(), 2400);
        assert!(!config.is_persistent());
    }

    #[test]
    fn test_other_sections_ignored() {
        let config = parse(
            "name = outside\n\
             [log]\n\
             name = ignored\n\
             [tun]\n\
             name = tun0\n\
             ipv4 = 10.8.0.1/24\n\
             colour = blue\n",
        )
        .unwrap();
        assert_eq!(config.name(), "tun0");
    }

    #[test]
    fn test_missing_required() {
        let err = parse("[tun]\nipv4 = 10.8.0.1/24\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("name"));

        let err = parse("[tun]\nname = tun0\nipv4 =\n").unwrap_err();
        assert!(err.to_string().contains("ipv4"));
    }

    #[test]
    fn test_defaults_for_bad_values() {
        let config = parse("[tun]\nname = tun0\nipv4 = 10.8.0.1/24\nipv6 =\nmtu = 70000\npersist = 2\n")
            .unwrap();
        assert_eq!(config.ipv6_cidr(), None);
        assert_eq!(config.mtu_value(), DEFAULT_MTU);
        assert!(!config.is_persistent());

        let config = parse("[tun]\nname = tun0\nipv4 = 10.8.0.1/24\nmtu = big\n").unwrap();
        assert_eq!(config.mtu_value(), DEFAULT_MTU);

        let config = parse("[tun]\nname = tun0\nipv4 = 10.8.0.1/24\nmtu = -5\n").unwrap();
        assert_eq!(config.mtu_value(), DEFAULT_MTU);
    }

    #[test]
    fn test_syntax_error_names_line() {
        let err = parse("[tun]\nname = tun0\nthis is not ini\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("line 3"));

        let err = parse("[tun]\n  = tun0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_invalid_name() {
        let err = parse("[tun]\nname = tun with spaces\nipv4 = 10.8.0.1/24\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/tunsession.ini")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("/nonexistent/tunsession.ini"));
    }
}
