//! Whitespace/comment tokenizer shared by the PNM and PFM headers.

use std::io::{BufRead, ErrorKind, Read};
use std::str::FromStr;

use super::{IoError, IoResult};

/// Header parsing on top of any buffered reader.
pub(crate) trait HeaderReader: BufRead {
    /// Read the two magic bytes (`P6`, `PF`, ...).
    fn read_magic(&mut self) -> IoResult<[u8; 2]> {
        let mut magic = [0u8; 2];
        self.read_exact(&mut magic)?;
        Ok(magic)
    }

    /// Read the next whitespace-delimited token, skipping `#` comments.
    ///
    /// Exactly one whitespace byte after the token is consumed, so binary
    /// data may start right after the last header field.
    fn read_token(&mut self) -> IoResult<String> {
        let mut token = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
            match byte[0] {
                b'#' => {
                    let mut comment = Vec::new();
                    self.read_until(b'\n', &mut comment)?;
                    if !token.is_empty() {
                        break;
                    }
                }
                b if b.is_ascii_whitespace() => {
                    if !token.is_empty() {
                        break;
                    }
                }
                b if !b.is_ascii() => {
                    return Err(IoError::Header(format!("non-ASCII byte {b:#04x} in header")));
                }
                b => token.push(b),
            }
        }

        if token.is_empty() {
            return Err(IoError::Io(ErrorKind::UnexpectedEof.into()));
        }
        String::from_utf8(token).map_err(|e| IoError::Header(e.to_string()))
    }

    /// Read and parse the next token, naming the field in errors.
    fn read_value<T: FromStr>(&mut self, field: &str) -> IoResult<T> {
        let token = self.read_token()?;
        token
            .parse()
            .map_err(|_| IoError::Header(format!("bad {field}: {token:?}")))
    }
}

impl<R: BufRead> HeaderReader for R {}
