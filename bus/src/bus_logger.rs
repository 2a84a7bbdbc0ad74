// Licensed under the Apache-2.0 license

use std::{
    cell::RefCell,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    rc::Rc,
};

use crate::{codec, Transport, TransportError};

/// A buffered trace file that can be shared between several loggers.
#[derive(Clone)]
pub struct LogFile(Rc<RefCell<BufWriter<File>>>);

impl LogFile {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        Ok(Self(Rc::new(RefCell::new(BufWriter::new(File::create(
            path,
        )?)))))
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

/// Wraps a transport and records every transaction to `log`.
///
/// Register frames are decoded for readability; anything else is dumped as
/// raw hex. A failed trace write turns tracing off instead of failing the
/// transaction.
pub struct BusLogger<T: Transport, W: Write = LogFile> {
    pub transport: T,
    pub log: Option<W>,
}

impl<T: Transport, W: Write> BusLogger<T, W> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            log: None,
        }
    }

    pub fn with_log(transport: T, log: W) -> Self {
        Self {
            transport,
            log: Some(log),
        }
    }

    fn trace(&mut self, line: std::fmt::Arguments) {
        if let Some(log) = &mut self.log {
            if writeln!(log, "{line}").is_err() {
                self.log = None;
            }
        }
    }

    fn log_write(&mut self, device: u8, bytes: &[u8], result: &Result<(), TransportError>) {
        if self.log.is_none() {
            return;
        }
        let access = match codec::decode_write(bytes) {
            Some((addr, val)) => format!("*0x{addr:04x} <- 0x{val:08x}"),
            None => format!("raw {}", hex::encode(bytes)),
        };
        match result {
            Ok(()) => self.trace(format_args!("{device:#04x} write {access}")),
            Err(e) => self.trace(format_args!("{device:#04x} write {access} ***FAULT {e}")),
        }
    }

    fn log_read(
        &mut self,
        device: u8,
        bytes: &[u8],
        buf: &[u8],
        result: &Result<(), TransportError>,
    ) {
        if self.log.is_none() {
            return;
        }
        let access = match codec::decode_read_request(bytes) {
            Some(addr) => format!("*0x{addr:04x}"),
            None => format!("raw {}", hex::encode(bytes)),
        };
        match result {
            Ok(()) if buf.len() == codec::READ_RESPONSE_LEN => {
                let val = codec::decode_value([buf[0], buf[1], buf[2], buf[3]]);
                self.trace(format_args!("{device:#04x}  read {access} -> 0x{val:08x}"))
            }
            Ok(()) => self.trace(format_args!(
                "{device:#04x}  read {access} -> {}",
                hex::encode(buf)
            )),
            Err(e) => self.trace(format_args!("{device:#04x}  read {access} ***FAULT {e}")),
        }
    }
}

impl<T: Transport, W: Write> Transport for BusLogger<T, W> {
    fn write(&mut self, device: u8, bytes: &[u8]) -> Result<(), TransportError> {
        let result = self.transport.write(device, bytes);
        self.log_write(device, bytes, &result);
        result
    }

    fn write_read(
        &mut self,
        device: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        let result = self.transport.write_read(device, bytes, buf);
        self.log_read(device, bytes, buf, &result);
        result
    }
}
