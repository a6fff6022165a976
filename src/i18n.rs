use std::collections::HashMap;

use fluent_templates::{
    fluent_bundle::{FluentArgs, FluentValue},
    static_loader, Loader,
};
use once_cell::sync::Lazy;
use unic_langid::LanguageIdentifier;

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "ru",
        // Telegram renders the Unicode isolation marks as garbage
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

/// Default language identifier used as a fallback.
pub static DEFAULT_LANG: Lazy<LanguageIdentifier> = Lazy::new(|| "ru".parse().unwrap_or_default());

static ENGLISH: Lazy<LanguageIdentifier> = Lazy::new(|| "en-US".parse().unwrap_or_default());

/// Normalizes a Telegram language code into a LanguageIdentifier (falls back to default).
pub fn lang_from_code(code: &str) -> LanguageIdentifier {
    let normalized = code.split(['-', '_']).next().unwrap_or(code).to_lowercase();
    match normalized.as_str() {
        "en" => ENGLISH.clone(),
        _ => DEFAULT_LANG.clone(),
    }
}

/// Language for an optional Telegram `language_code`.
pub fn lang_for(code: Option<&str>) -> LanguageIdentifier {
    code.map(lang_from_code).unwrap_or_else(|| DEFAULT_LANG.clone())
}

/// Returns a localized string for the given key.
/// Converts literal `\n` sequences to actual newlines for proper Telegram formatting.
pub fn t(lang: &LanguageIdentifier, key: &str) -> String {
    let text = LOCALES
        .lookup(lang, key)
        .unwrap_or_else(|| LOCALES.lookup(&DEFAULT_LANG, key).unwrap_or_else(|| key.to_string()));
    text.replace("\\n", "\n")
}

/// Returns a localized string with arguments for interpolation.
pub fn t_args(lang: &LanguageIdentifier, key: &str, args: &FluentArgs) -> String {
    let args_map: HashMap<String, FluentValue> = args.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();

    let text = LOCALES.lookup_with_args(lang, key, &args_map).unwrap_or_else(|| {
        LOCALES
            .lookup_with_args(&DEFAULT_LANG, key, &args_map)
            .unwrap_or_else(|| key.to_string())
    });
    text.replace("\\n", "\n")
}
