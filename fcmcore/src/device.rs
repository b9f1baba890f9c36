use serde::{Deserialize, Serialize};

/// Identity of the Android device this client impersonates during checkin
/// and registration.
///
/// The values are sent verbatim to Google, so they should describe a real
/// device/build combination. Construct one with [`DeviceIdentity::pixel_7`]
/// unless there is a reason to present as different hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// `Build.FINGERPRINT`: `brand/product/device:version/build_id/build_number:type/tags`
    pub build_fingerprint: String,
    /// Android SDK level (33 for Android 13).
    pub sdk_version: u32,
    /// Google Play Services version code.
    pub gms_version: u32,
    /// Device codename (`Build.DEVICE`).
    pub device: String,
    /// Marketing model name (`Build.MODEL`).
    pub model: String,
    /// Chrome version, reported as the IID client version.
    pub chrome_version: String,
    /// `Build.HARDWARE`
    pub hardware: String,
    /// `Build.BRAND`
    pub brand: String,
    /// `Build.MANUFACTURER`
    pub manufacturer: String,
    /// `Build.PRODUCT`
    pub product: String,
    pub bootloader: String,
    pub radio: String,
    /// `Build.TIME / 1000`
    pub build_time: i64,
}

impl DeviceIdentity {
    /// A Pixel 7 (panther) on the August 2023 Android 13 factory image.
    pub fn pixel_7() -> Self {
        Self {
            build_fingerprint: "google/panther/panther:13/TQ3A.230805.001/10316531:user/release-keys"
                .to_string(),
            sdk_version: 33,
            gms_version: 241516037,
            device: "panther".to_string(),
            model: "Pixel 7".to_string(),
            chrome_version: "120.0.6099.144".to_string(),
            hardware: "panther".to_string(),
            brand: "google".to_string(),
            manufacturer: "Google".to_string(),
            product: "panther".to_string(),
            bootloader: "slider-1.2-9819352".to_string(),
            radio: "g5300g-230511-230925-B-10484716".to_string(),
            build_time: 1691193600,
        }
    }

    /// The `User-Agent` GmsCore sends to the c2dm endpoints.
    pub fn gcm_user_agent(&self) -> String {
        format!("Android-GCM/1.5 ({} {})", self.device, self.model)
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::pixel_7()
    }
}

pub const DEFAULT_APP_VERSION: &str = "160500";

/// The application whose pushes are being received: its package name, FCM
/// sender (project number) and the SHA-1 of its APK signing certificate.
/// Google binds the issued token to all three.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub package: String,
    pub sender_id: String,
    /// 40 lowercase hex characters.
    pub cert_sha1: String,
    /// Reported as `app_ver` during registration.
    pub app_version: String,
}

/// Empty package and sender; [`AppIdentity::validate`] rejects it until the
/// real values are filled in.
impl Default for AppIdentity {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

impl AppIdentity {
    pub fn new(
        package: impl Into<String>,
        sender_id: impl Into<String>,
        cert_sha1: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            sender_id: sender_id.into(),
            cert_sha1: cert_sha1.into(),
            app_version: DEFAULT_APP_VERSION.to_string(),
        }
    }

    pub fn with_app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = app_version.into();
        self
    }

    /// Checks the fields Google rejects outright when malformed.
    pub fn validate(&self) -> Result<(), String> {
        if self.package.is_empty() {
            return Err("app package must not be empty".to_string());
        }
        if self.sender_id.is_empty() {
            return Err("sender id must not be empty".to_string());
        }
        let is_sha1 = self.cert_sha1.len() == 40
            && self
                .cert_sha1
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !is_sha1 {
            return Err(format!(
                "cert SHA-1 must be 40 lowercase hex characters, got {:?}",
                self.cert_sha1
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint_is_well_formed(fp: &str) -> bool {
        // brand/product/device:version/build_id/build_number:type/tags
        let Some((head, tail)) = fp.split_once(':') else {
            return false;
        };
        if head.split('/').count() != 3 {
            return false;
        }
        let parts: Vec<&str> = tail.split(':').collect();
        if parts.len() != 2 {
            return false;
        }
        let build: Vec<&str> = parts[0].split('/').collect();
        build.len() == 3
            && build[0].chars().all(|c| c.is_ascii_digit())
            && matches!(
                parts[1],
                "user/release-keys" | "userdebug/release-keys" | "user/dev-keys" | "userdebug/dev-keys"
            )
    }

    #[test]
    fn test_pixel_7_is_plausible() {
        let device = DeviceIdentity::pixel_7();

        assert!(
            fingerprint_is_well_formed(&device.build_fingerprint),
            "bad fingerprint: {}",
            device.build_fingerprint
        );
        assert!((24..=40).contains(&device.sdk_version));
        assert_ne!(device.gms_version, 0);
        assert!(!device.device.is_empty());
        assert!(!device.model.is_empty());

        let chrome: Vec<&str> = device.chrome_version.split('.').collect();
        assert_eq!(chrome.len(), 4);
        assert!(chrome.iter().all(|p| p.parse::<u32>().is_ok()));
    }

    #[test]
    fn test_gcm_user_agent() {
        assert_eq!(
            DeviceIdentity::pixel_7().gcm_user_agent(),
            "Android-GCM/1.5 (panther Pixel 7)"
        );
    }

    #[test]
    fn test_app_identity_validation() {
        let ok = AppIdentity::new("com.example.app", "1234567890", "a".repeat(40));
        assert!(ok.validate().is_ok());
        assert_eq!(ok.app_version, DEFAULT_APP_VERSION);

        let upper = AppIdentity::new("com.example.app", "1", "A".repeat(40));
        assert!(upper.validate().is_err());

        let short = AppIdentity::new("com.example.app", "1", "abc");
        assert!(short.validate().is_err());

        let no_sender = AppIdentity::new("com.example.app", "", "a".repeat(40));
        assert!(no_sender.validate().is_err());
    }
}
