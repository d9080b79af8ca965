pub mod channel;
pub mod config;
pub mod constants;
pub mod editor;
pub mod event;
pub mod logging;
pub mod patterns;
pub mod presence;
pub mod template;
pub mod translator;

pub use channel::{ChannelError, LineChannel, LineFramer};
pub use config::{ClientConfig, Target};
pub use editor::{EditOutcome, EditSnapshot, Key, LineEditor, NickCompleter, RebuildReason};
pub use event::{DecodeError, Event};
pub use patterns::{PatternError, PatternTable};
pub use presence::{NickCompletion, Presence};
pub use template::{RenderError, Template, TemplateError};
pub use translator::{
    Diagnostic, HandlerOutcome, HandlerRegistry, OutboundContext, TranslateError, Translation,
    Translator,
};
