//! Application settings shared over the raw bus.
//!
//! Settings are not a namespace. Whoever changes them publishes a partial
//! [`AppSettings`] on `"appSettings:update"`, and every interested party keeps
//! its own copy, merging each update into it.

use crate::bus::{EventBus, Subscription};
use crate::infrastructure::sync::lock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Event carrying a partial [`AppSettings`].
pub const UPDATE_EVENT: &str = "appSettings:update";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Application-wide settings; every field is optional so the same type
/// doubles as its own partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

impl AppSettings {
    /// Copies every field set in `update`.
    pub fn apply(&mut self, update: &Self) {
        if let Some(count) = update.count {
            self.count = Some(count);
        }
        if let Some(theme) = update.theme {
            self.theme = Some(theme);
        }
    }

    /// Update that bumps the count, treating a missing or zero count as zero.
    #[must_use]
    pub fn next_count(&self) -> Self {
        Self {
            count: Some(self.count.unwrap_or(0) + 1),
            theme: None,
        }
    }
}

/// Publisher/subscriber pair for settings updates on one bus.
#[derive(Debug, Clone)]
pub struct AppSettingsEvents {
    bus: Arc<EventBus>,
}

impl AppSettingsEvents {
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Publishes `update`; returns how many handlers received it.
    pub fn update(&self, update: &AppSettings) -> usize {
        self.bus.publish(UPDATE_EVENT, update)
    }

    /// Calls `handler` with every published update.
    pub fn on_update<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&AppSettings) + Send + Sync + 'static,
    {
        self.bus.subscribe(UPDATE_EVENT, handler)
    }

    /// Keeps `local` in sync by merging every update into it.
    pub fn follow(&self, local: Arc<Mutex<AppSettings>>) -> Subscription {
        self.on_update(move |update: &AppSettings| lock(&local).apply(update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn followers_merge_updates_into_their_own_copy() {
        let events = AppSettingsEvents::new(Arc::new(EventBus::new()));
        let light = Arc::new(Mutex::new(AppSettings {
            count: Some(0),
            theme: Some(Theme::Light),
        }));
        let blank = Arc::new(Mutex::new(AppSettings::default()));
        let _a = events.follow(Arc::clone(&light));
        let _b = events.follow(Arc::clone(&blank));

        let bump = light.lock().unwrap().next_count();
        assert_eq!(events.update(&bump), 2);

        assert_eq!(*light.lock().unwrap(), AppSettings { count: Some(1), theme: Some(Theme::Light) });
        assert_eq!(*blank.lock().unwrap(), AppSettings { count: Some(1), theme: None });
    }

    #[test]
    fn unsubscribed_follower_stops_receiving() {
        let events = AppSettingsEvents::new(Arc::new(EventBus::new()));
        let local = Arc::new(Mutex::new(AppSettings::default()));
        let follow = events.follow(Arc::clone(&local));

        follow.unsubscribe();
        let dark = AppSettings { count: None, theme: Some(Theme::Dark) };
        assert_eq!(events.update(&dark), 0);
        assert_eq!(local.lock().unwrap().theme, None);
    }

    #[test]
    fn partial_updates_serialize_sparsely() {
        let update = AppSettings { count: Some(3), theme: None };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"count":3}"#);

        let parsed: AppSettings = serde_json::from_str(r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(parsed.theme, Some(Theme::Dark));
    }
}
