use std::io;

/// Byte-at-a-time serial channel
///
/// This is the polled UART primitive the pipeline is built on: the same link carries the trigger
/// bytes in and the frame bytes out.
pub trait Console {
    /// Poll for one input byte without blocking, `None` if nothing arrived
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Transmit one byte, blocking until the link accepted it
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
}

impl<C: Console + ?Sized> Console for &mut C {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).write_byte(byte)
    }
}

impl<C: Console + ?Sized> Console for Box<C> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).write_byte(byte)
    }
}
