//! Application-wide constants
//!
//! Centralized location for the defaults shared by the core and the
//! terminal client.

use std::time::Duration;

/// Default address of the local chat daemon
pub const DEFAULT_DAEMON_ADDR: &str = "127.0.0.1:8790";

/// Prefix marking a line of user input as a local command
pub const COMMAND_PREFIX: char = '/';

/// Members whose last message is older than this no longer count as active
pub const ACTIVITY_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Above this many members, join/part/names chatter is not displayed
pub const LARGE_CHANNEL_THRESHOLD: usize = 25;

/// Delay between identifying with services and joining the channel
pub const JOIN_DELAY: Duration = Duration::from_secs(1);

/// Lines kept for redraw after a resize and for the pager
pub const SCROLLBACK_LINES: usize = 1000;

/// Width nicknames are right-aligned to in message lines
pub const NAME_WIDTH: usize = 15;

/// ANSI-256 palette member colors are drawn from (round robin)
pub const USER_COLORS: &[u8] = &[
    31, 32, 33, 34, 35, 36, 69, 75, 107, 130, 136, 166, 172, 178, 198, 205,
];

pub const VERSION: &str = concat!("hatcog v", env!("CARGO_PKG_VERSION"));
