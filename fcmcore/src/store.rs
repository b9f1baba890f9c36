use crate::gcm::GcmCredentials;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of processed persistent ids remembered. The whole list is
/// resent in every LoginRequest, so it must stay bounded.
pub const MAX_PERSISTENT_IDS: usize = 200;

/// Processed delivery ids in arrival order, oldest first. Once full, each
/// insertion evicts the oldest id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PersistentIdSet {
    ids: VecDeque<String>,
    cap: usize,
}

impl PersistentIdSet {
    pub fn new() -> Self {
        Self::with_capacity(MAX_PERSISTENT_IDS)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            ids: VecDeque::new(),
            cap,
        }
    }

    /// Appends `id`, evicting from the front while over capacity.
    /// Empty ids are ignored.
    pub fn push(&mut self, id: impl Into<String>) {
        let id = id.into();
        if id.is_empty() {
            return;
        }
        self.ids.push_back(id);
        while self.ids.len() > self.cap {
            self.ids.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

impl Default for PersistentIdSet {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<String>> for PersistentIdSet {
    /// Files written by older clients may hold more than the cap; only the
    /// newest entries are kept.
    fn from(ids: Vec<String>) -> Self {
        let mut set = Self::new();
        for id in ids {
            set.push(id);
        }
        set
    }
}

impl From<PersistentIdSet> for Vec<String> {
    fn from(set: PersistentIdSet) -> Self {
        set.ids.into()
    }
}

/// Everything needed to resume receiving pushes without registering again.
///
/// Serialized as `{"raw": {"androidId", "securityToken"}, "token",
/// "persistent_ids"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "raw")]
    pub gcm: GcmCredentials,
    pub token: String,
    #[serde(default)]
    pub persistent_ids: PersistentIdSet,
}

impl Credentials {
    pub fn new(gcm: GcmCredentials, token: impl Into<String>) -> Self {
        Self {
            gcm,
            token: token.into(),
            persistent_ids: PersistentIdSet::new(),
        }
    }

    /// Usable for `listen` without another registration: a token issued to
    /// a checked-in device.
    pub fn is_registered(&self) -> bool {
        !self.token.is_empty() && !self.gcm.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut set = PersistentIdSet::new();
        for i in 0..=MAX_PERSISTENT_IDS {
            set.push(format!("id-{i}"));
        }
        assert_eq!(set.len(), MAX_PERSISTENT_IDS);
        assert!(!set.contains("id-0"));
        assert_eq!(set.iter().next(), Some("id-1"));
        assert_eq!(set.iter().last(), Some(format!("id-{MAX_PERSISTENT_IDS}").as_str()));
    }

    #[test]
    fn test_overflow_keeps_most_recent_window() {
        let mut set = PersistentIdSet::with_capacity(3);
        for id in ["a", "b", "c", "d", "e"] {
            set.push(id);
        }
        assert_eq!(set.to_vec(), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_empty_id_ignored() {
        let mut set = PersistentIdSet::new();
        set.push("");
        assert!(set.is_empty());
    }

    #[test]
    fn test_credentials_json_layout() {
        let mut creds = Credentials::new(GcmCredentials::new(u64::MAX, 7), "tok");
        creds.persistent_ids.push("0:1%abc");

        let value = serde_json::to_value(&creds).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "raw": {"androidId": u64::MAX, "securityToken": 7},
                "token": "tok",
                "persistent_ids": ["0:1%abc"],
            })
        );

        let back: Credentials = serde_json::from_value(value).unwrap();
        assert_eq!(back, creds);
    }

    #[test]
    fn test_oversized_file_list_is_trimmed() {
        let ids: Vec<String> = (0..250).map(|i| i.to_string()).collect();
        let json = serde_json::json!({
            "raw": {"androidId": 1, "securityToken": 2},
            "token": "t",
            "persistent_ids": ids,
        });
        let creds: Credentials = serde_json::from_value(json).unwrap();
        assert_eq!(creds.persistent_ids.len(), MAX_PERSISTENT_IDS);
        assert_eq!(creds.persistent_ids.iter().next(), Some("50"));
    }

    #[test]
    fn test_is_registered() {
        assert!(!Credentials::default().is_registered());
        assert!(!Credentials::new(GcmCredentials::default(), "tok").is_registered());
        assert!(!Credentials::new(GcmCredentials::new(1, 2), "").is_registered());
        assert!(Credentials::new(GcmCredentials::new(1, 2), "tok").is_registered());
    }
}
