//! The parsed configuration value
//!
//! The discovered file is UTF-8 JSON with two recognized keys:
//!
//! ```json
//! {
//!     "global-groups": ["ecmascript", "browser"],
//!     "globals": {
//!         "myGlobal": true,
//!         "jQuery": false,
//!         "process": { "writable": false }
//!     }
//! }
//! ```
//!
//! An empty file, an unparsable file, and an absent file all yield the
//! default configuration; configuration content never fails resolution.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Globals that scripts may not assign to or shadow.
const NON_WRITABLE_GLOBALS: &[&str] = &["globalThis", "Infinity", "NaN", "undefined"];

const ECMASCRIPT_GLOBALS: &[&str] = &[
    "AggregateError",
    "Array",
    "ArrayBuffer",
    "BigInt",
    "BigInt64Array",
    "BigUint64Array",
    "Boolean",
    "DataView",
    "Date",
    "Error",
    "EvalError",
    "Float32Array",
    "Float64Array",
    "Function",
    "Infinity",
    "Int16Array",
    "Int32Array",
    "Int8Array",
    "JSON",
    "Map",
    "Math",
    "NaN",
    "Number",
    "Object",
    "Promise",
    "Proxy",
    "RangeError",
    "ReferenceError",
    "Reflect",
    "RegExp",
    "Set",
    "SharedArrayBuffer",
    "String",
    "Symbol",
    "SyntaxError",
    "TypeError",
    "URIError",
    "Uint16Array",
    "Uint32Array",
    "Uint8Array",
    "Uint8ClampedArray",
    "WeakMap",
    "WeakRef",
    "WeakSet",
    "decodeURI",
    "decodeURIComponent",
    "encodeURI",
    "encodeURIComponent",
    "eval",
    "globalThis",
    "isFinite",
    "isNaN",
    "parseFloat",
    "parseInt",
    "undefined",
];

const BROWSER_GLOBALS: &[&str] = &[
    "alert",
    "atob",
    "btoa",
    "clearInterval",
    "clearTimeout",
    "console",
    "document",
    "fetch",
    "history",
    "localStorage",
    "location",
    "navigator",
    "queueMicrotask",
    "requestAnimationFrame",
    "sessionStorage",
    "setInterval",
    "setTimeout",
    "window",
];

const GLOBAL_GROUPS: &[(&str, &[&str])] = &[
    ("ecmascript", ECMASCRIPT_GLOBALS),
    ("browser", BROWSER_GLOBALS),
];

/// How a declared global behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalFlags {
    pub writable: bool,
    pub shadowable: bool,
}

impl Default for GlobalFlags {
    fn default() -> Self {
        Self {
            writable: true,
            shadowable: true,
        }
    }
}

/// The resolved set of declared globals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Globals {
    declared: BTreeMap<String, GlobalFlags>,
}

impl Globals {
    pub fn find(&self, name: &str) -> Option<&GlobalFlags> {
        self.declared.get(name)
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }
}

/// Parsed configuration file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    globals: Globals,
}

impl Configuration {
    /// Parse configuration from file bytes.
    ///
    /// Unparsable input yields the default configuration so that linting can
    /// proceed; the problem is logged, not propagated.
    pub fn from_json(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        match serde_json::from_slice::<RawConfiguration>(bytes) {
            Ok(raw) => Self::from_raw(raw),
            Err(err) => {
                tracing::warn!("invalid configuration JSON, using defaults: {err}");
                Self::default()
            }
        }
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    fn from_raw(raw: RawConfiguration) -> Self {
        let mut declared = BTreeMap::new();

        let enabled_groups: Vec<&str> = match &raw.global_groups {
            None | Some(GlobalGroupsSetting::All(true)) => {
                GLOBAL_GROUPS.iter().map(|(name, _)| *name).collect()
            }
            Some(GlobalGroupsSetting::All(false)) => Vec::new(),
            Some(GlobalGroupsSetting::Groups(groups)) => GLOBAL_GROUPS
                .iter()
                .map(|(name, _)| *name)
                .filter(|name| groups.iter().any(|g| g.as_str() == *name))
                .collect(),
        };
        for (group_name, members) in GLOBAL_GROUPS {
            if !enabled_groups.contains(group_name) {
                continue;
            }
            for name in *members {
                let writable = !NON_WRITABLE_GLOBALS.contains(name);
                declared.insert(
                    (*name).to_string(),
                    GlobalFlags {
                        writable,
                        shadowable: writable,
                    },
                );
            }
        }

        if let Some(globals) = raw.globals {
            for (name, setting) in globals {
                match setting {
                    GlobalSetting::Declared(true) => {
                        declared.insert(name, GlobalFlags::default());
                    }
                    GlobalSetting::Declared(false) => {
                        declared.remove(&name);
                    }
                    GlobalSetting::Flags(flags) => {
                        declared.insert(
                            name,
                            GlobalFlags {
                                writable: flags.writable,
                                shadowable: flags.shadowable,
                            },
                        );
                    }
                }
            }
        }

        Self {
            globals: Globals { declared },
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::from_raw(RawConfiguration::default())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfiguration {
    #[serde(rename = "global-groups")]
    global_groups: Option<GlobalGroupsSetting>,
    globals: Option<BTreeMap<String, GlobalSetting>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GlobalGroupsSetting {
    All(bool),
    Groups(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GlobalSetting {
    Declared(bool),
    Flags(GlobalFlagsSetting),
}

#[derive(Debug, Deserialize)]
struct GlobalFlagsSetting {
    #[serde(default = "default_true")]
    writable: bool,
    #[serde(default = "default_true")]
    shadowable: bool,
}

fn default_true() -> bool {
    true
}
