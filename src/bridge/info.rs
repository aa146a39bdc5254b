//! `mod_info`: read-only build metadata of the bridge library

use std::any::Any;
use std::borrow::Cow;

use crate::errors::{BridgeError, HostError};
use crate::host::{HostClass, HostValue};

const UNKNOWN: &str = "unknown";

/// Library metadata exposed to the host as `mod_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModInfo {
    pub name: &'static str,
    pub author: &'static str,
    pub copyright: &'static str,
    pub version: String,
    pub license: &'static str,
    pub build_flags: String,
    pub compiler_version: &'static str,
    pub target: &'static str,
}

impl ModInfo {
    pub const PROPERTIES: [&'static str; 8] = [
        "name",
        "author",
        "copyright",
        "version",
        "license",
        "build_flags",
        "compiler_version",
        "target",
    ];

    /// Metadata recorded when this crate was built
    pub fn current() -> Self {
        let commit = option_env!("GRAFT_GIT_COMMIT").unwrap_or(UNKNOWN);
        let date = option_env!("GRAFT_GIT_COMMIT_DATE").unwrap_or(UNKNOWN);
        let authors = env!("CARGO_PKG_AUTHORS");

        Self {
            name: env!("CARGO_PKG_NAME"),
            author: if authors.is_empty() { UNKNOWN } else { authors },
            copyright: "Copyright (C) the graft authors",
            version: format!("{} (commit {commit}, {date})", env!("CARGO_PKG_VERSION")),
            license: env!("CARGO_PKG_LICENSE"),
            build_flags: build_flags(),
            compiler_version: option_env!("GRAFT_RUSTC_VERSION").unwrap_or(UNKNOWN),
            target: option_env!("GRAFT_TARGET").unwrap_or(UNKNOWN),
        }
    }

    pub fn property(&self, name: &str) -> Option<String> {
        let value: &str = match name {
            "name" => self.name,
            "author" => self.author,
            "copyright" => self.copyright,
            "version" => &self.version,
            "license" => self.license,
            "build_flags" => &self.build_flags,
            "compiler_version" => self.compiler_version,
            "target" => self.target,
            _ => return None,
        };
        Some(value.to_owned())
    }
}

fn build_flags() -> String {
    let profile = option_env!("GRAFT_BUILD_PROFILE").unwrap_or(UNKNOWN);
    let mut flags = vec![format!("profile={profile}")];
    if cfg!(feature = "parallel") {
        flags.push("parallel".to_owned());
    }
    if cfg!(feature = "filtering") {
        flags.push("filtering".to_owned());
    }
    if cfg!(feature = "python") {
        flags.push("python".to_owned());
    }
    flags.join(" ")
}

impl HostClass for ModInfo {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Borrowed("mod_info")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_attr(&self, name: &str) -> Result<HostValue, HostError> {
        self.property(name).map(HostValue::Str).ok_or_else(|| {
            BridgeError::UnknownAttribute {
                class: "mod_info".to_owned(),
                attr: name.to_owned(),
            }
            .into()
        })
    }
}
