//! App name to package name mapping for launchable applications.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Tasker (paid Play Store build).
pub const TASKER_PACKAGE: &str = "net.dinglisch.android.taskerm";

/// Mapping from lower-cased app names to Android package names.
pub static APP_PACKAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    // Automation
    m.insert("tasker", TASKER_PACKAGE);
    m.insert("autoinput", "com.joaomgcd.autoinput");
    m.insert("autonotification", "com.joaomgcd.autonotification");

    // System (Pixel)
    m.insert("settings", "com.android.settings");
    m.insert("clock", "com.google.android.deskclock");
    m.insert("calendar", "com.google.android.calendar");
    m.insert("camera", "com.google.android.GoogleCamera");
    m.insert("chrome", "com.android.chrome");
    m.insert("contacts", "com.google.android.contacts");
    m.insert("files", "com.google.android.apps.nbu.files");
    m.insert("messages", "com.google.android.apps.messaging");
    m.insert("phone", "com.google.android.dialer");
    m.insert("photos", "com.google.android.apps.photos");
    m.insert("play store", "com.android.vending");

    m
});

/// Resolve an app name or package identifier to a package identifier.
///
/// Unknown names are assumed to already be package identifiers.
pub fn resolve_package(app: &str) -> String {
    let key = app.trim().to_lowercase();
    APP_PACKAGES
        .get(key.as_str())
        .map(|p| p.to_string())
        .unwrap_or_else(|| app.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_app() {
        assert_eq!(resolve_package("Tasker"), TASKER_PACKAGE);
        assert_eq!(resolve_package(" clock "), "com.google.android.deskclock");
    }

    #[test]
    fn test_resolve_raw_package() {
        assert_eq!(resolve_package("com.example.app"), "com.example.app");
    }
}
