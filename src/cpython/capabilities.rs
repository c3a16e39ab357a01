use log::{debug, warn};

pub const DLOPEN_VARIABLE: &str = "CPYSTRUCTS_HAVE_DLOPEN";
pub const FORK_VARIABLE: &str = "CPYSTRUCTS_HAVE_FORK";

/// Platform features that add fields to the interpreter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub have_dlopen: bool,
    pub have_fork: bool
}

impl Capabilities {
    /// Both `dlopen` and `fork` come with every unix libc.
    pub fn detect() -> Capabilities {
        Capabilities {
            have_dlopen: cfg!(unix),
            have_fork: cfg!(unix)
        }
    }

    /// `detect`, overridden by `CPYSTRUCTS_HAVE_DLOPEN` / `CPYSTRUCTS_HAVE_FORK`.
    pub fn from_env() -> Capabilities {
        let detected = Capabilities::detect();
        let capabilities = Capabilities {
            have_dlopen: env_flag(DLOPEN_VARIABLE).unwrap_or(detected.have_dlopen),
            have_fork: env_flag(FORK_VARIABLE).unwrap_or(detected.have_fork)
        };

        debug!("Capabilities: {:?}", capabilities);
        capabilities
    }

    pub fn none() -> Capabilities {
        Capabilities {
            have_dlopen: false,
            have_fork: false
        }
    }

    pub fn with_dlopen(mut self, value: bool) -> Capabilities {
        self.have_dlopen = value;
        self
    }

    pub fn with_fork(mut self, value: bool) -> Capabilities {
        self.have_fork = value;
        self
    }
}

impl Default for Capabilities {
    fn default() -> Capabilities {
        Capabilities::detect()
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    let parsed = parse_flag(&value);
    if parsed.is_none() {
        warn!("Ignoring {}={:?}, expected one of 0, 1, true, false", name, value);
    }

    parsed
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None
    }
}

#[test]
fn test_parse_flag1() {
    assert_eq!(Some(true), parse_flag("1"));
    assert_eq!(Some(true), parse_flag(" TRUE "));
    assert_eq!(Some(false), parse_flag("0"));
    assert_eq!(Some(false), parse_flag("off"));
    assert_eq!(None, parse_flag("maybe"));
}

#[test]
fn test_builder1() {
    let capabilities = Capabilities::none().with_fork(true);
    assert!(!capabilities.have_dlopen);
    assert!(capabilities.have_fork);
    assert_eq!(Capabilities::detect(), Capabilities::default());
}

#[test]
fn test_from_env1() {
    std::env::set_var(FORK_VARIABLE, "0");
    std::env::set_var(DLOPEN_VARIABLE, "1");
    let capabilities = Capabilities::from_env();
    assert!(!capabilities.have_fork);
    assert!(capabilities.have_dlopen);

    std::env::set_var(FORK_VARIABLE, "maybe");
    assert_eq!(Capabilities::detect().have_fork, Capabilities::from_env().have_fork);

    std::env::remove_var(FORK_VARIABLE);
    std::env::remove_var(DLOPEN_VARIABLE);
    assert_eq!(Capabilities::detect(), Capabilities::from_env());
}
