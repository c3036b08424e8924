use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Application version as published in release manifests: three numeric
/// components, no pre-release or build metadata.
///
/// Release tags sometimes carry a leading `v`; parsing tolerates it, but
/// `Display` always renders the bare `major.minor.patch` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl AppVersion {
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Ord for AppVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
    }
}

impl PartialOrd for AppVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComponent {
    Major,
    Minor,
    Patch,
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("expected X.Y.Z format, got: {input}")]
    InvalidFormat { input: String },
    #[error("invalid {component} component: {value}")]
    InvalidComponent {
        component: VersionComponent,
        value: String,
    },
}

impl FromStr for AppVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let core = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let invalid = || VersionParseError::InvalidFormat {
            input: trimmed.to_string(),
        };

        let mut segments = core.split('.');
        let major = segments.next().ok_or_else(invalid)?;
        let minor = segments.next().ok_or_else(invalid)?;
        let patch = segments.next().ok_or_else(invalid)?;
        if segments.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            major: parse_component(major, VersionComponent::Major)?,
            minor: parse_component(minor, VersionComponent::Minor)?,
            patch: parse_component(patch, VersionComponent::Patch)?,
        })
    }
}

fn parse_component(value: &str, component: VersionComponent) -> Result<u32, VersionParseError> {
    // `u32::from_str` tolerates a leading `+`, which the manifest format
    // does not allow.
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionParseError::InvalidComponent {
            component,
            value: value.to_string(),
        });
    }

    value
        .parse()
        .map_err(|_| VersionParseError::InvalidComponent {
            component,
            value: value.to_string(),
        })
}
