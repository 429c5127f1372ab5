use std::fmt::Write;

use bytes::{Buf, BytesMut};

use tokio_util::codec::{Decoder, Encoder};

use crate::servo_ctrl::ServoCtrl;

#[derive(Debug, PartialEq)]
pub enum CmdResp {
    Ok,
    Err(String),
}

/// Commands out, one `ok`/error line back per command
pub(crate) struct LineCodec;

impl Decoder for LineCodec {
    type Item = CmdResp;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(pos) = src.iter().position(|b| *b == b'\n') else {
            tracing::trace!("No newline found in buffer: {} bytes", src.len());
            return Ok(None);
        };

        let line = src.split_to(pos);
        src.advance(1);

        let line = String::from_utf8_lossy(&line);
        let line = line.trim();
        if line.is_empty() {
            // stray "\r\n" between responses
            return self.decode(src);
        }

        if line == "ok" {
            Ok(Some(CmdResp::Ok))
        } else {
            Ok(Some(CmdResp::Err(line.to_owned())))
        }
    }
}

impl Encoder<ServoCtrl> for LineCodec {
    type Error = std::io::Error;

    fn encode(&mut self, req_type: ServoCtrl, buf: &mut BytesMut) -> Result<(), Self::Error> {
        buf.write_fmt(format_args!("{}", req_type)).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to write to buffer: {}", e),
            )
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_responses() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from(&b"ok\r\n\r\nerror: range\nok"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(CmdResp::Ok));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(CmdResp::Err("error: range".to_owned()))
        );
        // incomplete line waits for more data
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"ok");
    }

    #[test]
    fn encode_move() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::new();

        codec
            .encode(ServoCtrl::Move { pan: 12.5, tilt: 87.0 }, &mut buf)
            .unwrap();
        codec.encode(ServoCtrl::Center, &mut buf).unwrap();

        assert_eq!(&buf[..], b"M P12.50 T87.00\nC\n");
    }
}
