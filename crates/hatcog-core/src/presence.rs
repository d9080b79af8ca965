use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::time::{Duration, Instant};

use crate::constants::{ACTIVITY_WINDOW, USER_COLORS};
use crate::editor::NickCompleter;

/// Members of one channel, who spoke recently, and the color each is drawn in.
///
/// Membership is kept sorted so prefix completion is deterministic. Colors
/// outlive membership: a member who leaves and rejoins keeps their color.
#[derive(Debug, Clone)]
pub struct Presence {
    members: BTreeSet<String>,
    last_active: HashMap<String, Instant>,
    colors: HashMap<String, u8>,
    palette: &'static [u8],
    window: Duration,
}

impl Presence {
    pub fn new() -> Self {
        Self::with_window(ACTIVITY_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            members: BTreeSet::new(),
            last_active: HashMap::new(),
            colors: HashMap::new(),
            palette: USER_COLORS,
            window,
        }
    }

    /// Add a member, dropping a leading `@` (operator) or `+` (voice) marker.
    /// Returns false if the name was already present or empty.
    pub fn add(&mut self, name: &str) -> bool {
        let name = strip_marker(name);
        if name.is_empty() {
            return false;
        }
        self.members.insert(name.to_string())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let name = strip_marker(name);
        self.last_active.remove(name);
        self.members.remove(name)
    }

    /// Add every name of a space separated NAMES list. Returns how many were new.
    pub fn add_all(&mut self, names: &str) -> usize {
        names.split_whitespace().filter(|name| self.add(name)).count()
    }

    /// Follow a nick change, carrying activity and color to the new name.
    pub fn rename(&mut self, old: &str, new: &str) {
        let old = strip_marker(old);
        if !self.members.remove(old) {
            return;
        }
        self.add(new);
        let new = strip_marker(new);
        if let Some(at) = self.last_active.remove(old) {
            self.last_active.insert(new.to_string(), at);
        }
        if let Some(color) = self.colors.remove(old) {
            self.colors.entry(new.to_string()).or_insert(color);
        }
    }

    pub fn mark_active(&mut self, name: &str) -> bool {
        self.mark_active_at(name, Instant::now())
    }

    /// Stamp `name` as active at `at`. Names that are not members are ignored
    /// so the active set never outgrows membership.
    pub fn mark_active_at(&mut self, name: &str, at: Instant) -> bool {
        let name = strip_marker(name);
        if !self.members.contains(name) {
            return false;
        }
        self.last_active.insert(name.to_string(), at);
        true
    }

    pub fn active_count(&mut self) -> usize {
        self.active_count_at(Instant::now())
    }

    /// Purge stamps that have aged out of the activity window, then count.
    /// A stamp exactly one window old has aged out.
    pub fn active_count_at(&mut self, now: Instant) -> usize {
        if let Some(cutoff) = now.checked_sub(self.window) {
            self.last_active.retain(|_, last| *last > cutoff);
        }
        self.last_active.len()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.last_active.contains_key(strip_marker(name))
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(strip_marker(name))
    }

    /// Color for `name`, assigned on first use and kept for the session.
    pub fn color_for(&mut self, name: &str) -> u8 {
        let next = self.palette[self.colors.len() % self.palette.len()];
        *self.colors.entry(name.to_string()).or_insert(next)
    }

    pub fn has_color(&self, name: &str) -> bool {
        self.colors.contains_key(name)
    }

    /// First member starting with `prefix`, skipping `exclude`. Gives back
    /// `prefix` itself when it is empty or nothing matches.
    pub fn first_match<'a>(&'a self, prefix: &'a str, exclude: Option<&str>) -> &'a str {
        if prefix.is_empty() {
            return prefix;
        }
        self.members
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|name| name.starts_with(prefix))
            .find(|name| Some(name.as_str()) != exclude)
            .map(String::as_str)
            .unwrap_or(prefix)
    }

    /// Forget everyone; used when the channel session ends.
    pub fn clear(&mut self) {
        self.members.clear();
        self.last_active.clear();
    }
}

impl Default for Presence {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_marker(name: &str) -> &str {
    name.strip_prefix(['@', '+']).unwrap_or(name)
}

/// Nick completion against the channel's members, never completing to the
/// local user's own nick.
pub struct NickCompletion<'a> {
    presence: &'a Presence,
    own_nick: Option<&'a str>,
}

impl<'a> NickCompletion<'a> {
    pub fn new(presence: &'a Presence, own_nick: Option<&'a str>) -> Self {
        Self { presence, own_nick }
    }
}

impl NickCompleter for NickCompletion<'_> {
    fn complete(&self, prefix: &str) -> String {
        self.presence.first_match(prefix, self.own_nick).to_string()
    }
}
