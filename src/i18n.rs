// ==========================================
// Internationalisation (i18n)
// ==========================================
// rust-i18n backed; fr-CA is the default locale because the import
// log is operator-facing French. The rust_i18n::i18n! macro is
// initialized in lib.rs.
// ==========================================

/// Current locale code.
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// Switches locale ("fr-CA" or "en").
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// Translates a key without arguments.
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// Translates a key, substituting `%{name}` placeholders.
pub fn t_with_args(key: &str, args: &[(&str, String)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (name, value) in args {
        let placeholder = format!("%{{{}}}", name);
        result = result.replace(&placeholder, value);
    }
    result
}

/// Like [`t_with_args`] but returns None when the key has no
/// translation in the current locale. rust-i18n echoes the key back
/// for missing translations, which is what we detect here; used to
/// walk the FileError template fallback chain.
pub fn try_translate_with_args(key: &str, args: &[(&str, String)]) -> Option<String> {
    let raw = rust_i18n::t!(key).to_string();
    if raw == key || raw.ends_with(&format!(".{}", key)) {
        return None;
    }
    let mut result = raw;
    for (name, value) in args {
        let placeholder = format!("%{{{}}}", name);
        result = result.replace(&placeholder, value);
    }
    Some(result)
}
