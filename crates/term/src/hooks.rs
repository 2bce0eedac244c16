// Chunk: docs/chunks/vt_state_machine - VT semantics
// Chunk: docs/chunks/shell_integration - OSC 133 prompt marks

//! The optional callback set a host wires into the terminal.
//!
//! Every hook is optional; an absent hook is a no-op. Hooks are plain
//! `FnMut` boxes invoked synchronously from inside `feed`, so they must not
//! call back into the terminal.

use txterm_cells::Color;

type Callback0 = Box<dyn FnMut()>;
type CallbackBytes = Box<dyn FnMut(&[u8])>;
type CallbackStr = Box<dyn FnMut(&str)>;
type CallbackColor = Box<dyn FnMut(Color)>;

/// Host callbacks. Build with the `with_*` methods:
///
/// ```
/// use txterm_term::TermHooks;
///
/// let hooks = TermHooks::new()
///     .with_on_title(|title| println!("title: {}", title))
///     .with_on_pty_write(|bytes| { let _ = bytes; });
/// ```
#[derive(Default)]
pub struct TermHooks {
    pub(crate) on_title: Option<CallbackStr>,
    pub(crate) on_clipboard_set: Option<CallbackBytes>,
    pub(crate) on_clipboard_get: Option<Box<dyn FnMut() -> Option<Vec<u8>>>>,
    pub(crate) on_prompt_start: Option<Callback0>,
    pub(crate) on_input_start: Option<Callback0>,
    pub(crate) on_command_start: Option<Callback0>,
    pub(crate) on_command_end: Option<Box<dyn FnMut(Option<i32>)>>,
    pub(crate) on_pty_write: Option<CallbackBytes>,
    pub(crate) on_default_fg_changed: Option<CallbackColor>,
    pub(crate) on_default_bg_changed: Option<CallbackColor>,
    pub(crate) on_screen_restored: Option<Callback0>,
}

impl std::fmt::Debug for TermHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermHooks")
            .field("on_title", &self.on_title.is_some())
            .field("on_pty_write", &self.on_pty_write.is_some())
            .finish_non_exhaustive()
    }
}

impl TermHooks {
    pub fn new() -> Self {
        TermHooks::default()
    }

    /// OSC 0/2 window title.
    pub fn with_on_title(mut self, f: impl FnMut(&str) + 'static) -> Self {
        self.on_title = Some(Box::new(f));
        self
    }

    /// OSC 52 clipboard write (already base64-decoded).
    pub fn with_on_clipboard_set(mut self, f: impl FnMut(&[u8]) + 'static) -> Self {
        self.on_clipboard_set = Some(Box::new(f));
        self
    }

    /// OSC 52 clipboard query. Returning `None` suppresses the reply.
    pub fn with_on_clipboard_get(mut self, f: impl FnMut() -> Option<Vec<u8>> + 'static) -> Self {
        self.on_clipboard_get = Some(Box::new(f));
        self
    }

    /// OSC 133 A.
    pub fn with_on_prompt_start(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_prompt_start = Some(Box::new(f));
        self
    }

    /// OSC 133 B.
    pub fn with_on_input_start(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_input_start = Some(Box::new(f));
        self
    }

    /// OSC 133 C.
    pub fn with_on_command_start(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_command_start = Some(Box::new(f));
        self
    }

    /// OSC 133 D, with the exit status when the shell reported one.
    pub fn with_on_command_end(mut self, f: impl FnMut(Option<i32>) + 'static) -> Self {
        self.on_command_end = Some(Box::new(f));
        self
    }

    /// Bytes the terminal must send upstream (DSR, DA, DECRQM, OSC 52
    /// query replies).
    pub fn with_on_pty_write(mut self, f: impl FnMut(&[u8]) + 'static) -> Self {
        self.on_pty_write = Some(Box::new(f));
        self
    }

    /// OSC 10 changed the default foreground.
    pub fn with_on_default_fg_changed(mut self, f: impl FnMut(Color) + 'static) -> Self {
        self.on_default_fg_changed = Some(Box::new(f));
        self
    }

    /// OSC 11 changed the default background.
    pub fn with_on_default_bg_changed(mut self, f: impl FnMut(Color) + 'static) -> Self {
        self.on_default_bg_changed = Some(Box::new(f));
        self
    }

    /// The alt screen was left and the primary screen is visible again.
    pub fn with_on_screen_restored(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_screen_restored = Some(Box::new(f));
        self
    }
}
