//! Store URI dispatch
//!
//! | Input | Backend |
//! |-------|---------|
//! | `""`, `file:` | default local store |
//! | `/srv/data`, `data/x` | local, that directory |
//! | `file:/srv/data`, `file:///srv/data` | local, that directory |
//! | `dfs://namenode:9870/core` | distributed |
//! | `dfs:/core`, `dfs:core`, `dfs:///core` | distributed, configured namenode |
//! | anything else with a scheme | configuration error |
//!
//! Parsing is a pure function of the input string and the configured
//! default namenode.

use std::fmt;
use std::path::PathBuf;

use crate::error::{StoreError, StoreResult};

/// Default WebHDFS port when a `dfs:` URI omits one.
pub const DEFAULT_DFS_PORT: u16 = 9870;

/// Which backend a URI resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreScheme {
    Local,
    Distributed,
}

impl fmt::Display for StoreScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "file"),
            Self::Distributed => write!(f, "dfs"),
        }
    }
}

/// A parsed store location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreUri {
    /// The configured default local store.
    Default,
    Local { path: PathBuf },
    Distributed { host: String, port: u16, path: String },
}

impl StoreUri {
    /// Parse with no default namenode: a `dfs:` URI must name its host.
    pub fn parse(uri: &str) -> StoreResult<Self> {
        Self::parse_with_namenode(uri, None)
    }

    /// Parse, resolving a `dfs:` URI without an authority against
    /// `namenode` (`host[:port]`).
    pub fn parse_with_namenode(uri: &str, namenode: Option<&str>) -> StoreResult<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Ok(Self::Default);
        }

        let Some(scheme) = scheme_of(trimmed) else {
            return Ok(Self::Local {
                path: PathBuf::from(trimmed),
            });
        };
        let rest = &trimmed[scheme.len() + 1..];

        match scheme.to_ascii_lowercase().as_str() {
            "file" => {
                let path = rest.strip_prefix("//").unwrap_or(rest);
                if path.is_empty() {
                    return Ok(Self::Default);
                }
                Ok(Self::Local {
                    path: PathBuf::from(path),
                })
            }
            "dfs" => parse_dfs(uri, rest, namenode),
            other => Err(invalid(uri, format!("unsupported scheme '{other}'"))),
        }
    }

    pub fn scheme(&self) -> StoreScheme {
        match self {
            Self::Default | Self::Local { .. } => StoreScheme::Local,
            Self::Distributed { .. } => StoreScheme::Distributed,
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, ""),
            Self::Local { path } => write!(f, "file:{}", path.display()),
            Self::Distributed { host, port, path } => write!(f, "dfs://{host}:{port}{path}"),
        }
    }
}

/// A URI scheme is two or more leading ASCII letters, digits, `+`, `-` or
/// `.` followed by `:`. A single letter is a Windows drive, not a scheme.
fn scheme_of(uri: &str) -> Option<&str> {
    let colon = uri.find(':')?;
    let candidate = &uri[..colon];
    let valid = candidate.len() >= 2
        && candidate.starts_with(|c: char| c.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(candidate)
}

fn parse_dfs(uri: &str, rest: &str, namenode: Option<&str>) -> StoreResult<StoreUri> {
    let (authority, path) = match rest.strip_prefix("//") {
        Some(authority_and_path) => match authority_and_path.find('/') {
            Some(idx) => authority_and_path.split_at(idx),
            None => (authority_and_path, "/"),
        },
        None => ("", rest),
    };
    let authority = if authority.is_empty() {
        namenode
            .map(str::trim)
            .filter(|nn| !nn.is_empty())
            .ok_or_else(|| {
                invalid(uri, "missing namenode host and no store.dfs_namenode configured")
            })?
    } else {
        authority
    };
    let (host, port) = split_authority(uri, authority)?;

    let path = path.trim_end_matches('/');
    let path = if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    Ok(StoreUri::Distributed {
        host: host.to_string(),
        port,
        path,
    })
}

/// `host[:port]`, defaulting the port to [`DEFAULT_DFS_PORT`]. `uri` is
/// only used for error context.
pub fn split_authority<'a>(uri: &str, authority: &'a str) -> StoreResult<(&'a str, u16)> {
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| invalid(uri, format!("invalid port '{port}'")))?;
            (host, port)
        }
        None => (authority, DEFAULT_DFS_PORT),
    };
    if host.is_empty() {
        return Err(invalid(uri, "missing namenode host"));
    }
    Ok((host, port))
}

fn invalid(uri: &str, message: impl Into<String>) -> StoreError {
    StoreError::InvalidUri {
        uri: uri.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_local_forms() {
        assert_eq!(StoreUri::parse("").unwrap(), StoreUri::Default);
        assert_eq!(
            StoreUri::parse("/srv/data").unwrap(),
            StoreUri::Local {
                path: PathBuf::from("/srv/data")
            }
        );
        assert_eq!(
            StoreUri::parse("file:///srv/data").unwrap(),
            StoreUri::Local {
                path: PathBuf::from("/srv/data")
            }
        );
        assert_eq!(
            StoreUri::parse("C:\\data").unwrap().scheme(),
            StoreScheme::Local
        );
    }

    #[test]
    fn test_bare_file_scheme_is_default() {
        assert_eq!(StoreUri::parse("file:").unwrap(), StoreUri::Default);
        assert_eq!(StoreUri::parse("file://").unwrap(), StoreUri::Default);
        assert_eq!(StoreUri::parse(" FILE: ").unwrap(), StoreUri::Default);
    }

    #[test]
    fn test_dfs_forms() {
        assert_eq!(
            StoreUri::parse("dfs://nn.example:9000/cores/").unwrap(),
            StoreUri::Distributed {
                host: "nn.example".into(),
                port: 9000,
                path: "/cores".into()
            }
        );
        match StoreUri::parse("dfs://nn").unwrap() {
            StoreUri::Distributed { port, path, .. } => {
                assert_eq!(port, DEFAULT_DFS_PORT);
                assert_eq!(path, "");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(StoreUri::parse("dfs://nn:notaport/x").is_err());
        assert!(StoreUri::parse("dfs://:9000/x").is_err());
    }

    #[test]
    fn test_dfs_without_authority_uses_configured_namenode() {
        let expected = StoreUri::Distributed {
            host: "nn.example".into(),
            port: 9000,
            path: "/cores".into(),
        };
        for uri in ["dfs:/cores", "dfs:cores", "dfs:///cores/", "DFS:/cores"] {
            assert_eq!(
                StoreUri::parse_with_namenode(uri, Some("nn.example:9000")).unwrap(),
                expected,
                "{uri}"
            );
        }
        match StoreUri::parse_with_namenode("dfs:/", Some("nn")).unwrap() {
            StoreUri::Distributed { host, port, path } => {
                assert_eq!(host, "nn");
                assert_eq!(port, DEFAULT_DFS_PORT);
                assert_eq!(path, "");
            }
            other => panic!("unexpected {other:?}"),
        }
        // An explicit authority wins over the configured one.
        match StoreUri::parse_with_namenode("dfs://other:1/x", Some("nn")).unwrap() {
            StoreUri::Distributed { host, .. } => assert_eq!(host, "other"),
            other => panic!("unexpected {other:?}"),
        }

        let err = StoreUri::parse("dfs:/cores").unwrap_err();
        assert!(err.to_string().contains("store.dfs_namenode"));
        assert!(StoreUri::parse_with_namenode("dfs:/cores", Some(":9000")).is_err());
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let err = StoreUri::parse("s3://bucket/key").unwrap_err();
        assert!(matches!(err, StoreError::InvalidUri { .. }));
    }

    proptest! {
        #[test]
        fn prop_dispatch_is_pure(
            path in "[a-z/]{0,24}",
            scheme in "[a-z]{2,6}",
            sep in prop::sample::select(vec!["", "/", "//", "///"]),
        ) {
            let nn = Some("nn:1234");
            let local = StoreUri::parse(&path).map(|u| u.scheme());
            let file = StoreUri::parse(&format!("file:{sep}{path}")).map(|u| u.scheme());
            let dfs_uri = format!("dfs:{sep}{path}");
            let dfs = StoreUri::parse_with_namenode(&dfs_uri, nn);
            let named = StoreUri::parse(&format!("dfs://host:1234/{path}")).map(|u| u.scheme());
            let other = StoreUri::parse(&format!("{scheme}:{sep}{path}"));

            prop_assert_eq!(local.ok(), Some(StoreScheme::Local));
            prop_assert_eq!(file.ok(), Some(StoreScheme::Local));
            prop_assert_eq!(named.ok(), Some(StoreScheme::Distributed));
            prop_assert_eq!(
                dfs.as_ref().ok().map(StoreUri::scheme),
                Some(StoreScheme::Distributed)
            );
            if scheme != "file" && scheme != "dfs" {
                prop_assert!(other.is_err());
            }

            // Same input, same answer.
            prop_assert_eq!(StoreUri::parse(&path).ok(), StoreUri::parse(&path).ok());
            prop_assert_eq!(dfs.ok(), StoreUri::parse_with_namenode(&dfs_uri, nn).ok());
        }
    }
}
