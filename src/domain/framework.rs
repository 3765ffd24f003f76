//! Framework references and their dependency flags
//!
//! A framework reference names a shared framework (e.g. `Microsoft.AspNetCore.App`)
//! a project builds against. The only flag carried today is whether the
//! reference is private to the project (`all`) or flows to consumers (`none`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitOr, BitOrAssign};

use super::project::{eq_ignore_case, fold_case};

/// Bit set of framework dependency flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FrameworkDependencyFlags(u16);

impl FrameworkDependencyFlags {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(1);

    /// Builds flags from individual flag names
    ///
    /// Matching is case-insensitive. Unknown names (including `none`) are ignored.
    pub fn from_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        flags
            .into_iter()
            .fold(Self::NONE, |acc, flag| match flag.as_ref().to_ascii_lowercase().as_str() {
                "all" => acc | Self::ALL,
                _ => acc,
            })
    }

    /// Parses a comma separated flag string such as `"all"` or `" none , all "`
    pub fn parse(flags: &str) -> Self {
        Self::from_flags(flags.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Returns true if every bit of `other` is set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the friendly name of the flags
    pub fn as_str(&self) -> &'static str {
        if *self == Self::ALL {
            "all"
        } else {
            "none"
        }
    }
}

impl BitOr for FrameworkDependencyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FrameworkDependencyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for FrameworkDependencyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FrameworkDependencyFlags {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<FrameworkDependencyFlags> for String {
    fn from(flags: FrameworkDependencyFlags) -> Self {
        flags.as_str().to_string()
    }
}

/// A reference to a shared framework
///
/// Names compare case-insensitively. Ordering is by name, then by flags.
/// Unknown fields are carried along but take no part in comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkDependency {
    pub name: String,

    #[serde(default)]
    pub private_assets: FrameworkDependencyFlags,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FrameworkDependency {
    pub fn new(name: impl Into<String>, private_assets: FrameworkDependencyFlags) -> Self {
        Self {
            name: name.into(),
            private_assets,
            extra: Map::new(),
        }
    }

    fn folded_name(&self) -> String {
        fold_case(&self.name)
    }
}

impl PartialEq for FrameworkDependency {
    fn eq(&self, other: &Self) -> bool {
        eq_ignore_case(&self.name, &other.name) && self.private_assets == other.private_assets
    }
}

impl Eq for FrameworkDependency {}

impl Hash for FrameworkDependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded_name().hash(state);
        self.private_assets.hash(state);
    }
}

impl Ord for FrameworkDependency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded_name()
            .cmp(&other.folded_name())
            .then(self.private_assets.cmp(&other.private_assets))
    }
}

impl PartialOrd for FrameworkDependency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn flags_from_names() {
        assert_eq!(FrameworkDependencyFlags::from_flags(["ALL"]), FrameworkDependencyFlags::ALL);
        assert_eq!(FrameworkDependencyFlags::from_flags(["none"]), FrameworkDependencyFlags::NONE);
        assert_eq!(
            FrameworkDependencyFlags::from_flags(["bogus", "all"]),
            FrameworkDependencyFlags::ALL
        );
        assert_eq!(
            FrameworkDependencyFlags::from_flags(Vec::<String>::new()),
            FrameworkDependencyFlags::NONE
        );
    }

    #[test]
    fn flags_parse_string() {
        assert_eq!(FrameworkDependencyFlags::parse(""), FrameworkDependencyFlags::NONE);
        assert_eq!(FrameworkDependencyFlags::parse(" , ,"), FrameworkDependencyFlags::NONE);
        assert_eq!(FrameworkDependencyFlags::parse("none, All "), FrameworkDependencyFlags::ALL);
    }

    #[test]
    fn flags_display() {
        assert_eq!(FrameworkDependencyFlags::ALL.as_str(), "all");
        assert_eq!(FrameworkDependencyFlags::NONE.to_string(), "none");
        assert!(FrameworkDependencyFlags::ALL.contains(FrameworkDependencyFlags::NONE));
        assert!(!FrameworkDependencyFlags::NONE.contains(FrameworkDependencyFlags::ALL));
    }

    #[test]
    fn flags_serde_as_string() {
        let json = serde_json::to_string(&FrameworkDependencyFlags::ALL).unwrap();
        assert_eq!(json, "\"all\"");

        let parsed: FrameworkDependencyFlags = serde_json::from_str("\"ALL\"").unwrap();
        assert_eq!(parsed, FrameworkDependencyFlags::ALL);
    }

    #[test]
    fn dependency_equality_ignores_name_case() {
        let a = FrameworkDependency::new("Microsoft.AspNetCore.App", FrameworkDependencyFlags::ALL);
        let b = FrameworkDependency::new("microsoft.aspnetcore.app", FrameworkDependencyFlags::ALL);
        let c = FrameworkDependency::new("Microsoft.AspNetCore.App", FrameworkDependencyFlags::NONE);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn dependency_equality_folds_non_ascii_names() {
        let a = FrameworkDependency::new("Überframework", FrameworkDependencyFlags::NONE);
        let b = FrameworkDependency::new("überFRAMEWORK", FrameworkDependencyFlags::NONE);

        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn dependency_keeps_unknown_fields() {
        let dep: FrameworkDependency =
            serde_json::from_str(r#"{"name":"X","privateAssets":"all","version":"8.0.0"}"#).unwrap();
        assert_eq!(dep.extra["version"], "8.0.0");
        assert_eq!(dep, FrameworkDependency::new("x", FrameworkDependencyFlags::ALL));

        let back = serde_json::to_value(&dep).unwrap();
        assert_eq!(back["version"], "8.0.0");
    }

    #[test]
    fn dependency_ordering() {
        let mut deps = vec![
            FrameworkDependency::new("b", FrameworkDependencyFlags::NONE),
            FrameworkDependency::new("A", FrameworkDependencyFlags::ALL),
            FrameworkDependency::new("a", FrameworkDependencyFlags::NONE),
        ];
        deps.sort();

        assert_eq!(deps[0].private_assets, FrameworkDependencyFlags::NONE);
        assert_eq!(deps[1].private_assets, FrameworkDependencyFlags::ALL);
        assert_eq!(deps[2].name, "b");
    }

    #[test]
    fn dependency_private_assets_defaults_to_none() {
        let dep: FrameworkDependency = serde_json::from_str(r#"{"name":"X"}"#).unwrap();
        assert_eq!(dep.private_assets, FrameworkDependencyFlags::NONE);
    }
}
