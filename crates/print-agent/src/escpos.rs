//! ESC/POS command set and byte builder for thermal receipt printers.

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;
pub const LF: u8 = 0x0A;

/// Reset the printer to its power-on state.
pub const INIT: [u8; 2] = [ESC, 0x40];
/// Select character code table PC850 (Latin-1 subset).
pub const CODE_PAGE_PC850: [u8; 3] = [ESC, 0x74, 0x02];

pub const ALIGN_LEFT: [u8; 3] = [ESC, 0x61, 0x00];
pub const ALIGN_CENTER: [u8; 3] = [ESC, 0x61, 0x01];
pub const ALIGN_RIGHT: [u8; 3] = [ESC, 0x61, 0x02];

pub const BOLD_ON: [u8; 3] = [ESC, 0x45, 0x01];
pub const BOLD_OFF: [u8; 3] = [ESC, 0x45, 0x00];

pub const SIZE_NORMAL: [u8; 3] = [GS, 0x21, 0x00];
pub const SIZE_DOUBLE_HEIGHT: [u8; 3] = [GS, 0x21, 0x01];
pub const SIZE_DOUBLE_WIDTH: [u8; 3] = [GS, 0x21, 0x10];
pub const SIZE_DOUBLE: [u8; 3] = [GS, 0x21, 0x11];

pub const CUT_FULL: [u8; 3] = [GS, 0x56, 0x00];
pub const CUT_PARTIAL: [u8; 3] = [GS, 0x56, 0x01];

/// Pulse cash drawer pin 2.
pub const DRAWER_KICK_2: [u8; 5] = [ESC, 0x70, 0x00, 0x19, 0xFA];
/// Pulse cash drawer pin 5.
pub const DRAWER_KICK_5: [u8; 5] = [ESC, 0x70, 0x01, 0x19, 0xFA];

/// Lines fed before cutting so the last line clears the cutter.
pub const FEED_BEFORE_CUT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSize {
    Normal,
    DoubleHeight,
    DoubleWidth,
    Double,
}

/// Incremental ESC/POS job builder.
///
/// Text is written as single-byte characters; anything outside printable
/// ASCII is expected to be stripped by the caller.
#[derive(Debug, Default, Clone)]
pub struct EscPosBuilder {
    buf: Vec<u8>,
}

impl EscPosBuilder {
    /// Start a job with printer init and the PC850 code page.
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.raw(&INIT).raw(&CODE_PAGE_PC850);
        builder
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn align(&mut self, align: Align) -> &mut Self {
        let cmd = match align {
            Align::Left => ALIGN_LEFT,
            Align::Center => ALIGN_CENTER,
            Align::Right => ALIGN_RIGHT,
        };
        self.raw(&cmd)
    }

    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.raw(if on { &BOLD_ON } else { &BOLD_OFF })
    }

    pub fn size(&mut self, size: TextSize) -> &mut Self {
        let cmd = match size {
            TextSize::Normal => SIZE_NORMAL,
            TextSize::DoubleHeight => SIZE_DOUBLE_HEIGHT,
            TextSize::DoubleWidth => SIZE_DOUBLE_WIDTH,
            TextSize::Double => SIZE_DOUBLE,
        };
        self.raw(&cmd)
    }

    /// Write one line of text followed by a line feed.
    pub fn line(&mut self, text: &str) -> &mut Self {
        self.buf
            .extend(text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }));
        self.buf.push(LF);
        self
    }

    pub fn feed(&mut self, lines: usize) -> &mut Self {
        self.buf.extend(std::iter::repeat(LF).take(lines));
        self
    }

    pub fn cut(&mut self, full: bool) -> &mut Self {
        self.raw(if full { &CUT_FULL } else { &CUT_PARTIAL })
    }

    pub fn kick_drawer(&mut self) -> &mut Self {
        self.raw(&DRAWER_KICK_2)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_starts_with_init() {
        let bytes = EscPosBuilder::new().build();
        assert_eq!(bytes, [ESC, 0x40, ESC, 0x74, 0x02]);
    }

    #[test]
    fn test_builder_sequence() {
        let mut builder = EscPosBuilder::new();
        builder
            .align(Align::Center)
            .bold(true)
            .line("HI")
            .bold(false)
            .feed(2)
            .cut(false);
        let bytes = builder.build();

        let body = &bytes[5..];
        assert_eq!(&body[..3], &ALIGN_CENTER);
        assert_eq!(&body[3..6], &BOLD_ON);
        assert_eq!(&body[6..9], b"HI\n");
        assert_eq!(&body[9..12], &BOLD_OFF);
        assert_eq!(&body[12..14], &[LF, LF]);
        assert_eq!(&body[14..], &CUT_PARTIAL);
    }

    #[test]
    fn test_non_ascii_is_replaced() {
        let mut builder = EscPosBuilder::default();
        builder.line("pão");
        assert_eq!(builder.build(), b"p?o\n");
    }
}
