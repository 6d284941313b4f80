//! Package specs
//!
//! A spec names a package build: package name, pinned version, build
//! variants, and the compiler it was built with, written in the compact
//! form `fftw@3.3.10+mpi~shared precision=double%gcc@12.2.0`. A spec
//! with parts omitted is partial and acts as a query against installed
//! packages; a spec with a version pinned is concrete enough to build.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SpecError;

/// Value of one build variant
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariantValue {
    /// Boolean variant, written `+name` or `~name`
    Bool(bool),
    /// Valued variant, written `name=value`
    Str(String),
}

/// Compiler selector, written `%name` or `%name@version`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompilerSpec {
    name: String,
    version: Option<String>,
}

impl CompilerSpec {
    /// Create a compiler selector without a version constraint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Pin the compiler version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Compiler name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiler version, if pinned.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

/// A package spec
///
/// Immutable once constructed. Equality and ordering are by value over
/// all four components, so specs can key registry maps directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageSpec {
    name: String,
    version: Option<String>,
    variants: BTreeMap<String, VariantValue>,
    compiler: Option<CompilerSpec>,
}

impl PackageSpec {
    /// Create a spec with just a package name.
    pub fn new(name: impl Into<String>) -> Result<Self, SpecError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SpecError::EmptyName);
        }
        validate_name(&name).map_err(|reason| SpecError::InvalidName {
            name: name.clone(),
            reason,
        })?;
        Ok(Self {
            name,
            version: None,
            variants: BTreeMap::new(),
            compiler: None,
        })
    }

    /// Pin the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set one variant, replacing any previous value for the same name.
    #[must_use]
    pub fn with_variant(mut self, name: impl Into<String>, value: VariantValue) -> Self {
        self.variants.insert(name.into(), value);
        self
    }

    /// Set the compiler selector.
    #[must_use]
    pub fn with_compiler(mut self, compiler: CompilerSpec) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pinned version, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Variant constraints.
    pub fn variants(&self) -> &BTreeMap<String, VariantValue> {
        &self.variants
    }

    /// Compiler selector, if any.
    pub fn compiler(&self) -> Option<&CompilerSpec> {
        self.compiler.as_ref()
    }

    /// True when the spec pins a version and can identify one build.
    pub fn is_concrete(&self) -> bool {
        self.version.is_some()
    }

    /// Error unless the spec is concrete.
    pub fn ensure_concrete(&self) -> Result<(), SpecError> {
        if self.is_concrete() {
            Ok(())
        } else {
            Err(SpecError::NotConcrete {
                spec: self.to_string(),
                reason: "no version pinned".to_string(),
            })
        }
    }

    /// True when this spec meets every constraint `query` states.
    ///
    /// Names must match exactly. A query version matches an equal or
    /// dotted-prefix concrete version, so `@1.2` matches `1.2.3` but not
    /// `1.20.3`. Every query variant must be present with the same value,
    /// and a query compiler must match name and (if given) version.
    /// Constraints the query omits are unconstrained.
    pub fn satisfies(&self, query: &PackageSpec) -> bool {
        if self.name != query.name {
            return false;
        }
        if let Some(wanted) = &query.version {
            match &self.version {
                Some(version) if version_matches(version, wanted) => {}
                _ => return false,
            }
        }
        for (name, wanted) in &query.variants {
            if self.variants.get(name) != Some(wanted) {
                return false;
            }
        }
        if let Some(wanted) = &query.compiler {
            let Some(compiler) = &self.compiler else {
                return false;
            };
            if compiler.name != wanted.name {
                return false;
            }
            if let Some(wanted_version) = &wanted.version {
                match &compiler.version {
                    Some(version) if version_matches(version, wanted_version) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        for (name, value) in &self.variants {
            if let VariantValue::Bool(enabled) = value {
                write!(f, "{}{name}", if *enabled { '+' } else { '~' })?;
            }
        }
        for (name, value) in &self.variants {
            if let VariantValue::Str(value) = value {
                write!(f, " {name}={value}")?;
            }
        }
        if let Some(compiler) = &self.compiler {
            write!(f, "%{compiler}")?;
        }
        Ok(())
    }
}

impl FromStr for PackageSpec {
    type Err = SpecError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let mut chars = trimmed.chars().peekable();

        let name = take_token(&mut chars);
        if name.is_empty() {
            return Err(SpecError::EmptyName);
        }
        validate_name(&name).map_err(|reason| SpecError::InvalidName {
            name: name.clone(),
            reason,
        })?;

        let mut spec = Self {
            name,
            version: None,
            variants: BTreeMap::new(),
            compiler: None,
        };

        loop {
            skip_whitespace(&mut chars);
            let Some(&next) = chars.peek() else { break };
            match next {
                '@' => {
                    chars.next();
                    if spec.version.is_some() {
                        return Err(invalid_version(trimmed, "version given twice"));
                    }
                    let version = take_token(&mut chars);
                    validate_version(&version)
                        .map_err(|reason| invalid_version(trimmed, &reason))?;
                    spec.version = Some(version);
                }
                '+' | '~' => {
                    chars.next();
                    let name = take_token(&mut chars);
                    if name.is_empty() {
                        return Err(invalid_variant(
                            trimmed,
                            &format!("missing variant name after '{next}'"),
                        ));
                    }
                    validate_name(&name).map_err(|reason| invalid_variant(trimmed, &reason))?;
                    let value = VariantValue::Bool(next == '+');
                    if spec.variants.insert(name.clone(), value).is_some() {
                        return Err(invalid_variant(
                            trimmed,
                            &format!("variant '{name}' given twice"),
                        ));
                    }
                }
                '%' => {
                    chars.next();
                    if spec.compiler.is_some() {
                        return Err(invalid_compiler(trimmed, "compiler given twice"));
                    }
                    let name = take_token(&mut chars);
                    if name.is_empty() {
                        return Err(invalid_compiler(trimmed, "missing compiler name after '%'"));
                    }
                    validate_name(&name).map_err(|reason| invalid_compiler(trimmed, &reason))?;
                    let mut compiler = CompilerSpec::new(name);
                    if chars.peek() == Some(&'@') {
                        chars.next();
                        let version = take_token(&mut chars);
                        validate_version(&version)
                            .map_err(|reason| invalid_compiler(trimmed, &reason))?;
                        compiler = compiler.with_version(version);
                    }
                    spec.compiler = Some(compiler);
                }
                c if is_name_char(c) => {
                    let name = take_token(&mut chars);
                    validate_name(&name).map_err(|reason| invalid_variant(trimmed, &reason))?;
                    if chars.peek() != Some(&'=') {
                        return Err(invalid_variant(
                            trimmed,
                            &format!("expected '=' after variant name '{name}'"),
                        ));
                    }
                    chars.next();
                    let value = take_token(&mut chars);
                    if value.is_empty() {
                        return Err(invalid_variant(
                            trimmed,
                            &format!("missing value for variant '{name}'"),
                        ));
                    }
                    let value = VariantValue::Str(value);
                    if spec.variants.insert(name.clone(), value).is_some() {
                        return Err(invalid_variant(
                            trimmed,
                            &format!("variant '{name}' given twice"),
                        ));
                    }
                }
                other => {
                    return Err(SpecError::UnexpectedCharacter {
                        spec: trimmed.to_string(),
                        found: other,
                    })
                }
            }
        }

        Ok(spec)
    }
}

impl Serialize for PackageSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// True when `concrete` equals `query` or extends it at a dot boundary.
fn version_matches(concrete: &str, query: &str) -> bool {
    concrete == query
        || concrete
            .strip_prefix(query)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Order two version tokens, semver-aware when both parse.
///
/// Tokens that are not semver (even after padding partial versions like
/// `3.3` to `3.3.0`) fall back to lexicographic order.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (lenient_semver(a), lenient_semver(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Parse a version token, padding partial forms like `3` or `3.3`.
pub(crate) fn lenient_semver(token: &str) -> Option<semver::Version> {
    if let Ok(version) = semver::Version::parse(token) {
        return Some(version);
    }
    let dots = token.chars().filter(|&c| c == '.').count();
    let padded = match dots {
        0 => format!("{token}.0.0"),
        1 => format!("{token}.0"),
        _ => return None,
    };
    semver::Version::parse(&padded).ok()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn validate_name(name: &str) -> Result<(), String> {
    let Some(first) = name.chars().next() else {
        return Err("name is empty".to_string());
    };
    if !first.is_ascii_alphanumeric() {
        return Err(format!(
            "must start with an alphanumeric character, found '{first}'"
        ));
    }
    if let Some(bad) = name.chars().find(|&c| !is_name_char(c)) {
        return Err(format!("contains invalid character '{bad}'"));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<(), String> {
    if version.is_empty() {
        return Err("version is empty".to_string());
    }
    if let Some(bad) = version.chars().find(|&c| !is_version_char(c)) {
        return Err(format!("contains invalid character '{bad}'"));
    }
    Ok(())
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn take_token(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut token = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || matches!(c, '@' | '+' | '~' | '%' | '=') {
            break;
        }
        token.push(c);
        chars.next();
    }
    token
}

fn invalid_version(spec: &str, reason: &str) -> SpecError {
    SpecError::InvalidVersion {
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}

fn invalid_variant(spec: &str, reason: &str) -> SpecError {
    SpecError::InvalidVariant {
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}

fn invalid_compiler(spec: &str, reason: &str) -> SpecError {
    SpecError::InvalidCompiler {
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}
