use serde::Serialize;

/// What a participant's browser can't do, derived from its user agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrowserLimits {
    pub non_chrome: bool,
    pub safari: bool,
}

impl BrowserLimits {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let non_chrome = !user_agent.contains("Chrome");
        Self {
            non_chrome,
            safari: non_chrome && user_agent.contains("Safari"),
        }
    }
}

/// Peer-to-peer restrictions announced to data sockets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_simulcast: bool,
    #[serde(rename = "disableP2P", skip_serializing_if = "std::ops::Not::not")]
    pub disable_p2p: bool,
}

/// Reference counts of connected browsers with limits.
#[derive(Debug, Default)]
pub struct FeatureTracker {
    non_chrome: u32,
    safari: u32,
}

impl FeatureTracker {
    /// Count a joining socket. Returns `true` if the features changed.
    pub fn join(&mut self, limits: BrowserLimits) -> bool {
        let mut changed = false;
        if limits.non_chrome {
            changed |= self.non_chrome == 0;
            self.non_chrome += 1;
        }
        if limits.safari {
            changed |= self.safari == 0;
            self.safari += 1;
        }
        changed
    }

    /// Release a socket counted by [`join`](Self::join).
    pub fn leave(&mut self, limits: BrowserLimits) -> bool {
        let mut changed = false;
        if limits.non_chrome && self.non_chrome > 0 {
            self.non_chrome -= 1;
            changed |= self.non_chrome == 0;
        }
        if limits.safari && self.safari > 0 {
            self.safari -= 1;
            changed |= self.safari == 0;
        }
        changed
    }

    pub fn features(&self) -> Features {
        Features {
            disable_simulcast: self.non_chrome > 0,
            disable_p2p: self.safari > 0,
        }
    }

    /// The features as sent on the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.features()).unwrap_or_else(|_| String::from("{}"))
    }
}
