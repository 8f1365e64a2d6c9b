//! core::types
//!
//! Strong types for BOM tree identities.
//!
//! # Types
//!
//! - [`Project`], [`Variant`], [`Libtype`] - Validated location components
//! - [`ConfigName`], [`LibraryName`] - Validated node names with immutability rules
//! - [`ChangeRef`] - Change reference pinning a library leaf
//! - [`VariantKey`], [`ConfigKey`], [`LibtypeKey`], [`LibraryKey`] - Parsed full names
//! - [`Fingerprint`] - Tree shape hash for change detection
//!
//! # Validation
//!
//! These types enforce validity at construction time. Components exclude the
//! `/`, `:`, and `@` delimiters, which is what keeps the full-name grammar
//! unambiguous:
//!
//! - `project/variant` - a variant location
//! - `project/variant@config` - a composite config
//! - `project/variant:libtype` - a libtype location
//! - `project/variant:libtype@library` - a library leaf
//!
//! # Examples
//!
//! ```
//! use espalier::core::types::{ConfigKey, ConfigName, LibraryKey};
//!
//! // Valid constructions
//! let name = ConfigName::new("REL3.0FM8revA0").unwrap();
//! assert!(name.is_immutable());
//!
//! let key = ConfigKey::parse("i10socfm/liotest1@dev").unwrap();
//! assert_eq!(key.to_string(), "i10socfm/liotest1@dev");
//!
//! // Invalid constructions fail at creation time
//! assert!(ConfigName::new("has@delimiter").is_err());
//! assert!(LibraryKey::parse("i10socfm/liotest1@dev").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Name prefixes that denote frozen, publish-once identities.
pub const IMMUTABLE_PREFIXES: [&str; 3] = ["REL", "PREL", "snap-"];

/// The reserved development config name.
pub const RESERVED_CONFIG: &str = "dev";

/// Check whether a name carries an immutable naming prefix.
///
/// The check is case-sensitive and anchored at the start of the name.
///
/// # Example
///
/// ```
/// use espalier::core::types::is_immutable_name;
///
/// assert!(is_immutable_name("REL3.0FM8revA0"));
/// assert!(is_immutable_name("snap-17ww22a"));
/// assert!(!is_immutable_name("dev"));
/// assert!(!is_immutable_name("rel3.0"));
/// ```
pub fn is_immutable_name(name: &str) -> bool {
    IMMUTABLE_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Errors from identity validation and full-name parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid {kind} '{value}': {reason}")]
    InvalidComponent {
        kind: &'static str,
        value: String,
        reason: String,
    },

    #[error("{value} is not in a valid {expected} format")]
    InvalidFullName {
        value: String,
        expected: &'static str,
    },
}

/// Validate a single identity component: non-empty, `[A-Za-z0-9._-]` only.
fn validate_component(kind: &'static str, value: &str) -> Result<(), TypeError> {
    if value.is_empty() {
        return Err(TypeError::InvalidComponent {
            kind,
            value: value.to_string(),
            reason: "cannot be empty".into(),
        });
    }
    if let Some(ch) = value
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '_' | '-'))
    {
        return Err(TypeError::InvalidComponent {
            kind,
            value: value.to_string(),
            reason: format!("cannot contain '{ch}'"),
        });
    }
    Ok(())
}

macro_rules! identity_newtype {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new validated instance.
            ///
            /// # Errors
            ///
            /// Returns `TypeError::InvalidComponent` if the value is empty or
            /// contains a character outside `[A-Za-z0-9._-]`.
            pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
                let value = value.into();
                validate_component($kind, &value)?;
                Ok(Self(value))
            }

            /// Get the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

identity_newtype!(
    /// An IC project identifier.
    Project,
    "project"
);

identity_newtype!(
    /// An IP variant identifier within a project.
    Variant,
    "variant"
);

identity_newtype!(
    /// A deliverable category (rtl, oa, timemod, ...) within a variant.
    Libtype,
    "libtype"
);

identity_newtype!(
    /// A composite config name.
    ///
    /// Names starting with `REL`, `PREL`, or `snap-` denote immutable
    /// configs; `dev` is the reserved development config.
    ConfigName,
    "config name"
);

identity_newtype!(
    /// A library or release name attached to a libtype leaf.
    ///
    /// Immutability follows the same prefix convention as config names.
    LibraryName,
    "library name"
);

identity_newtype!(
    /// A change reference pinning a library leaf to a point in its history.
    ChangeRef,
    "change reference"
);

impl ConfigName {
    /// Check whether this name denotes a frozen config.
    pub fn is_immutable(&self) -> bool {
        is_immutable_name(&self.0)
    }

    /// Check whether this is the reserved development config.
    pub fn is_reserved(&self) -> bool {
        self.0 == RESERVED_CONFIG
    }
}

impl LibraryName {
    /// Check whether this name denotes a frozen release.
    pub fn is_immutable(&self) -> bool {
        is_immutable_name(&self.0)
    }
}

/// A `project/variant` location.
///
/// Serializes as its full-name string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantKey {
    pub project: Project,
    pub variant: Variant,
}

impl VariantKey {
    pub fn new(project: Project, variant: Variant) -> Self {
        Self { project, variant }
    }

    /// Parse a `project/variant` full name.
    ///
    /// # Example
    ///
    /// ```
    /// use espalier::core::types::VariantKey;
    ///
    /// let key = VariantKey::parse("i10socfm/liotest1").unwrap();
    /// assert_eq!(key.project.as_str(), "i10socfm");
    /// assert_eq!(key.variant.as_str(), "liotest1");
    ///
    /// assert!(VariantKey::parse("i10socfm").is_err());
    /// assert!(VariantKey::parse("i10socfm/liotest1@dev").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let malformed = || TypeError::InvalidFullName {
            value: value.to_string(),
            expected: "project/variant",
        };
        if value.contains(['@', ':']) {
            return Err(malformed());
        }
        let (project, variant) = value.split_once('/').ok_or_else(malformed)?;
        if variant.contains('/') {
            return Err(malformed());
        }
        Ok(Self {
            project: Project::new(project)?,
            variant: Variant::new(variant)?,
        })
    }
}

impl TryFrom<String> for VariantKey {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VariantKey> for String {
    fn from(key: VariantKey) -> Self {
        key.to_string()
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.variant)
    }
}

/// A `project/variant@config` composite identity.
///
/// Serializes as its full-name string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigKey {
    pub project: Project,
    pub variant: Variant,
    pub config: ConfigName,
}

impl ConfigKey {
    pub fn new(project: Project, variant: Variant, config: ConfigName) -> Self {
        Self {
            project,
            variant,
            config,
        }
    }

    /// Parse a `project/variant@config` full name.
    ///
    /// # Example
    ///
    /// ```
    /// use espalier::core::types::ConfigKey;
    ///
    /// let key = ConfigKey::parse("i10socfm/liotest1@REL3.0").unwrap();
    /// assert!(key.config.is_immutable());
    ///
    /// assert!(ConfigKey::parse("i10socfm/liotest1").is_err());
    /// assert!(ConfigKey::parse("i10socfm/liotest1:rtl@dev").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let malformed = || TypeError::InvalidFullName {
            value: value.to_string(),
            expected: "project/variant@config",
        };
        if value.contains(':') {
            return Err(malformed());
        }
        let (location, config) = value.split_once('@').ok_or_else(malformed)?;
        if config.contains(['/', '@']) {
            return Err(malformed());
        }
        let location = VariantKey::parse(location).map_err(|_| malformed())?;
        Ok(Self {
            project: location.project,
            variant: location.variant,
            config: ConfigName::new(config)?,
        })
    }

    /// The `project/variant` location of this config.
    pub fn location(&self) -> VariantKey {
        VariantKey::new(self.project.clone(), self.variant.clone())
    }
}

impl TryFrom<String> for ConfigKey {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ConfigKey> for String {
    fn from(key: ConfigKey) -> Self {
        key.to_string()
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.project, self.variant, self.config)
    }
}

/// A `project/variant:libtype` location.
///
/// Serializes as its full-name string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LibtypeKey {
    pub project: Project,
    pub variant: Variant,
    pub libtype: Libtype,
}

impl LibtypeKey {
    pub fn new(project: Project, variant: Variant, libtype: Libtype) -> Self {
        Self {
            project,
            variant,
            libtype,
        }
    }

    /// Parse a `project/variant:libtype` full name.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let malformed = || TypeError::InvalidFullName {
            value: value.to_string(),
            expected: "project/variant:libtype",
        };
        if value.contains('@') {
            return Err(malformed());
        }
        let (location, libtype) = value.split_once(':').ok_or_else(malformed)?;
        if libtype.contains(['/', ':']) {
            return Err(malformed());
        }
        let location = VariantKey::parse(location).map_err(|_| malformed())?;
        Ok(Self {
            project: location.project,
            variant: location.variant,
            libtype: Libtype::new(libtype)?,
        })
    }

    /// The `project/variant` location of this libtype.
    pub fn location(&self) -> VariantKey {
        VariantKey::new(self.project.clone(), self.variant.clone())
    }
}

impl TryFrom<String> for LibtypeKey {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<LibtypeKey> for String {
    fn from(key: LibtypeKey) -> Self {
        key.to_string()
    }
}

impl std::fmt::Display for LibtypeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.project, self.variant, self.libtype)
    }
}

/// A `project/variant:libtype@library` leaf identity.
///
/// Serializes as its full-name string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LibraryKey {
    pub project: Project,
    pub variant: Variant,
    pub libtype: Libtype,
    pub library: LibraryName,
}

impl LibraryKey {
    pub fn new(project: Project, variant: Variant, libtype: Libtype, library: LibraryName) -> Self {
        Self {
            project,
            variant,
            libtype,
            library,
        }
    }

    /// Parse a `project/variant:libtype@library` full name.
    ///
    /// # Example
    ///
    /// ```
    /// use espalier::core::types::LibraryKey;
    ///
    /// let key = LibraryKey::parse("i10socfm/liotest1:rtl@dev").unwrap();
    /// assert_eq!(key.libtype.as_str(), "rtl");
    /// assert_eq!(key.library.as_str(), "dev");
    /// ```
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let malformed = || TypeError::InvalidFullName {
            value: value.to_string(),
            expected: "project/variant:libtype@library",
        };
        let (location, library) = value.split_once('@').ok_or_else(malformed)?;
        if library.contains(['/', ':', '@']) {
            return Err(malformed());
        }
        let location = LibtypeKey::parse(location).map_err(|_| malformed())?;
        Ok(Self {
            project: location.project,
            variant: location.variant,
            libtype: location.libtype,
            library: LibraryName::new(library)?,
        })
    }

    /// The `project/variant:libtype` location of this leaf.
    pub fn location(&self) -> LibtypeKey {
        LibtypeKey::new(
            self.project.clone(),
            self.variant.clone(),
            self.libtype.clone(),
        )
    }
}

impl TryFrom<String> for LibraryKey {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<LibraryKey> for String {
    fn from(key: LibraryKey) -> Self {
        key.to_string()
    }
}

impl std::fmt::Display for LibraryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}:{}@{}",
            self.project, self.variant, self.libtype, self.library
        )
    }
}

/// A parsed `project/variant[:libtype]@name` full name.
///
/// The presence of the libtype segment decides which kind of node the name
/// denotes: with it the name is a library leaf, without it a composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullName {
    Config(ConfigKey),
    Library(LibraryKey),
}

impl FullName {
    /// Parse either full-name form.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        if value.contains(':') {
            Ok(FullName::Library(LibraryKey::parse(value)?))
        } else {
            Ok(FullName::Config(ConfigKey::parse(value)?))
        }
    }
}

impl std::fmt::Display for FullName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FullName::Config(key) => write!(f, "{key}"),
            FullName::Library(key) => write!(f, "{key}"),
        }
    }
}

/// A stable hash over a tree's nodes and edges.
///
/// The fingerprint is computed over a sorted set of description lines, so
/// two trees with the same nodes and links hash identically regardless of
/// traversal order. Used by the store to detect out-of-band changes and by
/// reports to summarize a tree in one token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint from a set of description lines.
    ///
    /// The lines are sorted before hashing to ensure determinism regardless
    /// of input order.
    pub fn compute(entries: &[String]) -> Self {
        let mut sorted: Vec<&str> = entries.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        for entry in sorted {
            hasher.update(entry.as_bytes());
            hasher.update(b"\n");
        }

        let result = hasher.finalize();
        Self(hex::encode(result))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get an abbreviated form of the fingerprint.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod components {
        use super::*;

        #[test]
        fn valid_names() {
            assert!(Project::new("i10socfm").is_ok());
            assert!(Variant::new("liotest1").is_ok());
            assert!(Libtype::new("rtl").is_ok());
            assert!(ConfigName::new("REL3.0FM8revA0__15ww032a").is_ok());
            assert!(LibraryName::new("dev").is_ok());
            assert!(ChangeRef::new("12345").is_ok());
        }

        #[test]
        fn empty_rejected() {
            let err = Project::new("").unwrap_err();
            assert!(err.to_string().contains("cannot be empty"));
        }

        #[test]
        fn delimiters_rejected() {
            assert!(Project::new("a/b").is_err());
            assert!(ConfigName::new("a@b").is_err());
            assert!(Libtype::new("a:b").is_err());
            assert!(Variant::new("has space").is_err());
        }

        #[test]
        fn error_names_offending_char() {
            let err = ConfigName::new("a@b").unwrap_err();
            assert_eq!(
                err.to_string(),
                "invalid config name 'a@b': cannot contain '@'"
            );
        }

        #[test]
        fn serde_roundtrip() {
            let name = ConfigName::new("snap-17ww22a").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, "\"snap-17ww22a\"");
            let parsed: ConfigName = serde_json::from_str(&json).unwrap();
            assert_eq!(name, parsed);
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<ConfigName, _> = serde_json::from_str("\"a@b\"");
            assert!(result.is_err());
        }
    }

    mod immutability {
        use super::*;

        #[test]
        fn rel_prel_snap_are_immutable() {
            assert!(is_immutable_name("REL3.0FM8revA0"));
            assert!(is_immutable_name("PREL2.0"));
            assert!(is_immutable_name("snap-17ww22a"));
        }

        #[test]
        fn development_names_are_mutable() {
            assert!(!is_immutable_name("dev"));
            assert!(!is_immutable_name("my_config"));
            assert!(!is_immutable_name("rel3.0"));
            assert!(!is_immutable_name("foo-REL"));
        }

        #[test]
        fn config_name_predicates() {
            assert!(ConfigName::new("REL1.0").unwrap().is_immutable());
            assert!(!ConfigName::new("dev").unwrap().is_immutable());
            assert!(ConfigName::new("dev").unwrap().is_reserved());
            assert!(!ConfigName::new("devel").unwrap().is_reserved());
        }

        #[test]
        fn library_name_predicates() {
            assert!(LibraryName::new("snap-1").unwrap().is_immutable());
            assert!(!LibraryName::new("dev").unwrap().is_immutable());
        }
    }

    mod full_names {
        use super::*;

        #[test]
        fn variant_key_roundtrip() {
            let key = VariantKey::parse("abc/def").unwrap();
            assert_eq!(key.to_string(), "abc/def");
        }

        #[test]
        fn variant_key_wrong_shape_rejected() {
            assert!(VariantKey::parse("abc").is_err());
            assert!(VariantKey::parse("abc/def/ghi").is_err());
            assert!(VariantKey::parse("abc/def@cfg").is_err());
            assert!(VariantKey::parse("abc/def:rtl").is_err());
        }

        #[test]
        fn variant_key_error_message() {
            let err = VariantKey::parse("abc").unwrap_err();
            assert_eq!(
                err.to_string(),
                "abc is not in a valid project/variant format"
            );
        }

        #[test]
        fn config_key_roundtrip() {
            let key = ConfigKey::parse("abc/def@dev").unwrap();
            assert_eq!(key.config.as_str(), "dev");
            assert_eq!(key.to_string(), "abc/def@dev");
        }

        #[test]
        fn config_key_wrong_shape_rejected() {
            assert!(ConfigKey::parse("abc/def").is_err());
            assert!(ConfigKey::parse("abc/def@a@b").is_err());
            assert!(ConfigKey::parse("abc/def:rtl@dev").is_err());
            assert!(ConfigKey::parse("abc@dev").is_err());
        }

        #[test]
        fn libtype_key_roundtrip() {
            let key = LibtypeKey::parse("abc/def:ghi").unwrap();
            assert_eq!(key.libtype.as_str(), "ghi");
            assert_eq!(key.to_string(), "abc/def:ghi");
        }

        #[test]
        fn library_key_roundtrip() {
            let key = LibraryKey::parse("abc/def:ghi@jkl").unwrap();
            assert_eq!(key.library.as_str(), "jkl");
            assert_eq!(key.to_string(), "abc/def:ghi@jkl");
        }

        #[test]
        fn library_key_wrong_shape_rejected() {
            assert!(LibraryKey::parse("abc/def@jkl").is_err());
            assert!(LibraryKey::parse("abc/def:ghi").is_err());
            assert!(LibraryKey::parse("abc/def:ghi@j@k").is_err());
        }

        #[test]
        fn full_name_split_on_libtype_segment() {
            assert!(matches!(
                FullName::parse("abc/def@dev"),
                Ok(FullName::Config(_))
            ));
            assert!(matches!(
                FullName::parse("abc/def:rtl@dev"),
                Ok(FullName::Library(_))
            ));
            assert!(FullName::parse("abc/def").is_err());
        }

        #[test]
        fn keys_sort_lexicographically() {
            let a = ConfigKey::parse("a/x@dev").unwrap();
            let b = ConfigKey::parse("b/x@dev").unwrap();
            assert!(a < b);
        }

        #[test]
        fn keys_serialize_as_full_names() {
            let key = LibraryKey::parse("abc/def:rtl@dev").unwrap();
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, "\"abc/def:rtl@dev\"");
            let parsed: LibraryKey = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, key);

            let bad: Result<ConfigKey, _> = serde_json::from_str("\"abc/def\"");
            assert!(bad.is_err());
        }
    }

    mod fingerprint {
        use super::*;

        #[test]
        fn deterministic() {
            let entries = vec!["a -> b".to_string(), "b -> c".to_string()];
            let fp1 = Fingerprint::compute(&entries);
            let fp2 = Fingerprint::compute(&entries);
            assert_eq!(fp1, fp2);
        }

        #[test]
        fn order_independent() {
            let forward = vec!["a -> b".to_string(), "b -> c".to_string()];
            let reverse = vec!["b -> c".to_string(), "a -> b".to_string()];
            assert_eq!(
                Fingerprint::compute(&forward),
                Fingerprint::compute(&reverse)
            );
        }

        #[test]
        fn different_entries_different_fingerprint() {
            let one = vec!["a -> b".to_string()];
            let other = vec!["a -> c".to_string()];
            assert_ne!(Fingerprint::compute(&one), Fingerprint::compute(&other));
        }

        #[test]
        fn short_form() {
            let fp = Fingerprint::compute(&["x".to_string()]);
            assert_eq!(fp.short(8).len(), 8);
            assert!(fp.as_str().starts_with(fp.short(8)));
            assert_eq!(fp.short(1000), fp.as_str());
        }

        #[test]
        fn empty_entries() {
            let fp = Fingerprint::compute(&[]);
            assert!(!fp.as_str().is_empty());
        }
    }
}
