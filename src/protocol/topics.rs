//! Broker topic naming

/// Topic pair used by one streaming session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTopics {
    /// Control topic the stream token is (re)published on
    pub publish: String,
    /// Skeleton telemetry topic
    pub subscribe: String,
}

impl StreamTopics {
    pub fn new(group_id: u64, serial: &str, token: u64) -> Self {
        Self {
            publish: format!("mobile/{}/camera/{}/token/mobileStreamToken", group_id, serial),
            subscribe: format!("mobileClient/{}/camera/{}/skeleton/{}", group_id, serial, token),
        }
    }
}
