//! Best-effort `User-Agent` breakdown for the download log.
//!
//! Only the families that matter for a file download are recognized; anything
//! else keeps empty fields. Fields are never guessed.

use lazy_regex::{regex_captures, regex_is_match};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub platform: String,
    pub model: String,
    pub os_name: String,
    pub os_version: String,
    pub browser_name: String,
    pub browser_version: String,
}

impl UserAgentInfo {
    /// Device line for notifications: platform and model.
    pub fn device(&self) -> String {
        join_nonempty(&self.platform, &self.model)
    }

    pub fn os(&self) -> String {
        join_nonempty(&self.os_name, &self.os_version)
    }

    pub fn browser(&self) -> String {
        join_nonempty(&self.browser_name, &self.browser_version)
    }
}

fn join_nonempty(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (false, false) => format!("{a} {b}"),
        (false, true) => a.to_string(),
        (true, false) => b.to_string(),
        (true, true) => String::new(),
    }
}

fn windows_version(nt: &str) -> &str {
    match nt {
        "10.0" => "10",
        "6.3" => "8.1",
        "6.2" => "8",
        "6.1" => "7",
        "6.0" => "Vista",
        "5.1" | "5.2" => "XP",
        other => other,
    }
}

pub fn parse(ua: &str) -> UserAgentInfo {
    let mut info = UserAgentInfo::default();
    parse_os(ua, &mut info);
    parse_browser(ua, &mut info);
    info
}

fn parse_os(ua: &str, info: &mut UserAgentInfo) {
    if let Some((_, nt)) = regex_captures!(r"Windows NT (\d+\.\d+)", ua) {
        info.platform = "Windows".into();
        info.os_name = "Windows".into();
        info.os_version = windows_version(nt).to_string();
    } else if let Some((_, device, version)) = regex_captures!(r"(iPhone|iPad|iPod).*? OS (\d+(?:_\d+)*)", ua) {
        info.platform = device.to_string();
        info.model = device.to_string();
        info.os_name = "iOS".into();
        info.os_version = version.replace('_', ".");
    } else if let Some((_, version, model)) = regex_captures!(r"Android (\d+(?:\.\d+)*)(?:; ([^;)]+))?", ua) {
        info.platform = "Linux".into();
        info.os_name = "Android".into();
        info.os_version = version.to_string();
        info.model = model.split(" Build/").next().unwrap_or(model).trim().to_string();
    } else if let Some((_, version)) = regex_captures!(r"Mac OS X (\d+(?:[_.]\d+)*)", ua) {
        info.platform = "Macintosh".into();
        info.os_name = "Mac OS X".into();
        info.os_version = version.replace('_', ".");
    } else if regex_is_match!(r"CrOS", ua) {
        info.platform = "X11".into();
        info.os_name = "Chrome OS".into();
    } else if regex_is_match!(r"Linux", ua) {
        info.platform = if ua.contains("X11") { "X11" } else { "Linux" }.into();
        info.os_name = "Linux".into();
    }
}

fn parse_browser(ua: &str, info: &mut UserAgentInfo) {
    let (name, version) = if let Some((_, v)) = regex_captures!(r"Edg(?:e|A|iOS)?/([\d.]+)", ua) {
        ("Edge", v)
    } else if let Some((_, v)) = regex_captures!(r"(?:OPR|Opera)/([\d.]+)", ua) {
        ("Opera", v)
    } else if let Some((_, v)) = regex_captures!(r"YaBrowser/([\d.]+)", ua) {
        ("Yandex Browser", v)
    } else if let Some((_, v)) = regex_captures!(r"SamsungBrowser/([\d.]+)", ua) {
        ("Samsung Internet", v)
    } else if let Some((_, v)) = regex_captures!(r"(?:Firefox|FxiOS)/([\d.]+)", ua) {
        ("Firefox", v)
    } else if let Some((_, v)) = regex_captures!(r"(?:Chrome|CriOS)/([\d.]+)", ua) {
        ("Chrome", v)
    } else if let Some((_, v)) = regex_captures!(r"Version/([\d.]+).*Safari/", ua) {
        ("Safari", v)
    } else if let Some((_, n, v)) = regex_captures!(r"^([A-Za-z][\w.-]*)/([\w.-]+)", ua) {
        // curl/8.4.0, Wget/1.21, python-requests/2.31 and the like
        (n, v)
    } else {
        return;
    };
    info.browser_name = name.to_string();
    info.browser_version = version.to_string();
}
