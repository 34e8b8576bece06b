//! While the scenario progress bar is drawing, a log line written to the console would leave
//! the tail of the bar behind it. This encoder clears the line first.

use log::Record;
use log4rs::encode::{Encode, Write};

/// Wraps a `PatternEncoder` and prepends an ANSI clear-line sequence to each record.
#[derive(Debug)]
pub struct PBWrapperEncoder {
    inner: Box<dyn Encode>,
}

impl PBWrapperEncoder {
    pub fn new(inner: Box<dyn Encode>) -> Self {
        Self { inner }
    }
}

impl Encode for PBWrapperEncoder {
    fn encode(&self, w: &mut dyn Write, record: &Record) -> Result<(), anyhow::Error> {
        // Clear the entire line and return the cursor to the beginning.
        w.write_all(b"\x1B[2K\r")?;
        self.inner.encode(w, record)
    }
}
