//! # Device Classifier
//!
//! Maps a raw user-agent string to a coarse device/OS/browser tuple.
//! Pattern order matters: the first matching rule wins.

use domains::{Browser, DeviceInfo, DeviceType, OperatingSystem};
use once_cell::sync::Lazy;
use regex::Regex;

fn pattern(re: &str) -> Regex {
    Regex::new(&format!("(?i){re}")).expect("user-agent pattern is a valid regex")
}

static MOBILE: Lazy<Regex> =
    Lazy::new(|| pattern(r"mobile|android|iphone|ipod|blackberry|opera mini|iemobile|wpdesktop"));
static TABLET: Lazy<Regex> = Lazy::new(|| pattern(r"tablet|ipad|kindle|silk"));

static OS_RULES: Lazy<Vec<(Regex, OperatingSystem)>> = Lazy::new(|| {
    vec![
        (pattern(r"windows"), OperatingSystem::Windows),
        // Android and iOS UAs also carry "Linux" / "Mac OS X", so they go first.
        (pattern(r"android"), OperatingSystem::Android),
        (pattern(r"iphone|ipad|ipod|\bios\b"), OperatingSystem::Ios),
        (pattern(r"mac os x|macintosh"), OperatingSystem::MacOS),
        (pattern(r"linux"), OperatingSystem::Linux),
    ]
});

static CHROME: Lazy<Regex> = Lazy::new(|| pattern(r"chrome|crios"));
static SAFARI: Lazy<Regex> = Lazy::new(|| pattern(r"safari"));
static FIREFOX: Lazy<Regex> = Lazy::new(|| pattern(r"firefox|fxios"));
static EDGE: Lazy<Regex> = Lazy::new(|| pattern(r"edge|edg/|edga/|edgios/"));
static OPERA: Lazy<Regex> = Lazy::new(|| pattern(r"opr/|opera"));

/// Total function: absent or unrecognized input yields desktop/unknown/unknown.
pub fn classify(user_agent: Option<&str>) -> DeviceInfo {
    let Some(ua) = user_agent.filter(|ua| !ua.trim().is_empty()) else {
        return DeviceInfo::default();
    };

    let device_type = if MOBILE.is_match(ua) {
        DeviceType::Mobile
    } else if TABLET.is_match(ua) {
        DeviceType::Tablet
    } else {
        DeviceType::Desktop
    };

    let os = OS_RULES
        .iter()
        .find(|(re, _)| re.is_match(ua))
        .map(|(_, os)| *os)
        .unwrap_or_default();

    DeviceInfo { device_type, os, browser: browser(ua) }
}

/// Edge and Opera embed "Chrome", and every Chromium UA embeds "Safari",
/// so each engine is only reported when no derived brand is present.
fn browser(ua: &str) -> Browser {
    let derived = EDGE.is_match(ua) || OPERA.is_match(ua);
    if CHROME.is_match(ua) && !derived {
        Browser::Chrome
    } else if SAFARI.is_match(ua) && !CHROME.is_match(ua) && !derived {
        Browser::Safari
    } else if FIREFOX.is_match(ua) {
        Browser::Firefox
    } else if EDGE.is_match(ua) {
        Browser::Edge
    } else if OPERA.is_match(ua) {
        Browser::Opera
    } else {
        Browser::Unknown
    }
}
