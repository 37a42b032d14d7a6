//! Editor and OS detection from WakaTime user-agent strings, e.g.
//! `wakatime/v1.35.4 (linux-5.15.0-x86_64) go1.18.1 vscode/1.70.0 vscode-wakatime/18.1.5`.

use once_cell::sync::Lazy;
use regex::Regex;

const UNKNOWN: &str = "unknown";

static USER_AGENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^wakatime/\S+ \(([^-)\s]+)-[^)]*\) \S+ ([^/\s]+)/\S+").expect("valid regex")
});

const OS_NAMES: &[(&str, &str)] = &[
    ("aix", "AIX"),
    ("android", "Android"),
    ("darwin", "macOS"),
    ("dragonfly", "DragonFly"),
    ("freebsd", "FreeBSD"),
    ("hurd", "Hurd"),
    ("illumos", "Illumos"),
    ("ios", "IOS"),
    ("js", "JavaScript"),
    ("linux", "Linux"),
    ("nacl", "NaCl"),
    ("netbsd", "NetBSD"),
    ("openbsd", "OpenBSD"),
    ("plan9", "Plan9"),
    ("solaris", "Solaris"),
    ("windows", "Windows"),
    ("zos", "Z/OS"),
    ("unknown", "Unknown"),
];

const EDITOR_NAMES: &[(&str, &str)] = &[("vscode", "VS Code"), ("unknown", "Unknown")];

/// Platform and editor as reported by the plugin, before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTokens<'a> {
    pub os: &'a str,
    pub editor: &'a str,
}

/// Extracts the OS and editor tokens, or `None` if `ua` is not a WakaTime agent.
pub fn parse(ua: &str) -> Option<AgentTokens<'_>> {
    let caps = USER_AGENT.captures(ua)?;
    Some(AgentTokens {
        os: caps.get(1)?.as_str(),
        editor: caps.get(2)?.as_str(),
    })
}

fn lookup<'a>(table: &[(&str, &'a str)], token: &str) -> Option<&'a str> {
    table.iter().find(|(k, _)| *k == token).map(|(_, v)| *v)
}

/// Display name for an OS token. Unmapped tokens are returned as-is.
pub fn os_name(token: &str) -> String {
    lookup(OS_NAMES, token).unwrap_or(token).to_owned()
}

/// Display name for an editor token. Unmapped tokens are returned as-is.
pub fn editor_name(token: &str) -> String {
    lookup(EDITOR_NAMES, token).unwrap_or(token).to_owned()
}

/// Canonical `(os, editor)` for a user agent; `("unknown", "unknown")` if it can't be parsed.
pub fn detect(ua: &str) -> (String, String) {
    match parse(ua) {
        Some(tokens) => (os_name(tokens.os), editor_name(tokens.editor)),
        None => (UNKNOWN.to_owned(), UNKNOWN.to_owned()),
    }
}
