/*++

Licensed under the Apache-2.0 license.

File Name:

    log.rs

Abstract:

    File contains a shared transaction log for fake and simulated transports.

--*/
use std::{
    cell::{Ref, RefCell},
    fmt::Write,
    ops::Deref,
    rc::Rc,
};

/// A text log that can be appended to through `&self`.
///
/// Clones share one buffer, so a test can keep a handle to the log of a
/// transport after moving the transport into a [`crate::RegisterBus`].
///
/// # Example
///
/// ```
/// use hmac_fpga_bus::testing::Log;
/// use std::fmt::Write;
///
/// let log = Log::new();
/// let handle = log.clone();
/// writeln!(log.w(), "write(0x50, 000001000000)").unwrap();
/// writeln!(log.w(), "write_read(0x50, 0004, 4)").unwrap();
/// assert_eq!(handle.count_prefix("write("), 1);
/// assert_eq!(
///     "write(0x50, 000001000000)\nwrite_read(0x50, 0004, 4)\n",
///     handle.take()
/// );
/// assert_eq!("", log.take());
/// ```
#[derive(Clone, Default)]
pub struct Log {
    text: Rc<RefCell<String>>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the current contents.
    pub fn as_str(&self) -> impl Deref<Target = str> + '_ {
        Ref::map(self.text.borrow(), String::as_str)
    }

    /// Return the current contents and leave the log empty.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.text.borrow_mut())
    }

    /// Number of logged lines starting with `prefix`.
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.text
            .borrow()
            .lines()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    /// A writer for use with write!() or writeln!().
    pub fn w(&self) -> impl Write + '_ {
        LogWriter { text: &self.text }
    }
}

struct LogWriter<'a> {
    text: &'a RefCell<String>,
}

impl Write for LogWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.text.borrow_mut().push_str(s);
        Ok(())
    }
}
