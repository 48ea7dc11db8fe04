//! RFC 6455 frame codec.
//!
//! ```text
//!  0               1               2               3
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |           (16/64)             |
//! |N|V|V|V|       |S|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                 Masking-key (0 or 4 bytes)                    |
//! +---------------------------------------------------------------+
//! |                         Payload data                          |
//! +---------------------------------------------------------------+
//! ```
//!
//! Server frames are always written with FIN set and no mask. Fragmented
//! messages are not reassembled: FIN is decoded but not acted on, so each
//! continuation frame surfaces as its own payload.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Frame opcode (low 4 bits of the first header byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value & 0x0F {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
        }
    }
}

/// A decoded frame. The payload is already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub masked: bool,
    pub payload: Vec<u8>,
}

/// Errors raised while decoding. Every variant terminates the connection.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown opcode 0x{0:X}")]
    UnknownOpcode(u8),
    #[error("payload of {len} bytes exceeds limit of {max}")]
    TooLarge { len: u64, max: usize },
}

/// Encode a single unmasked server frame with FIN set.
pub fn encode(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 10);
    frame.push(0x80 | opcode.as_u8());
    push_length(&mut frame, payload.len(), 0);
    frame.extend_from_slice(payload);
    frame
}

/// Encode a masked frame the way a client would send it.
///
/// The server never writes these; they exist for clients and test harnesses
/// that need to speak to a [`super::Connection`] over a raw stream.
pub fn encode_masked(opcode: Opcode, payload: &[u8], mask_key: [u8; 4]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 14);
    frame.push(0x80 | opcode.as_u8());
    push_length(&mut frame, payload.len(), 0x80);
    frame.extend_from_slice(&mask_key);
    frame.extend(
        payload
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ mask_key[i % 4]),
    );
    frame
}

fn push_length(frame: &mut Vec<u8>, len: usize, mask_bit: u8) {
    if len < 126 {
        #[allow(clippy::cast_possible_truncation)]
        frame.push(mask_bit | len as u8);
    } else if len < 65_536 {
        frame.push(mask_bit | 126);
        #[allow(clippy::cast_possible_truncation)]
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(mask_bit | 127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

/// Read one frame from `reader`, unmasking the payload if a mask key is present.
///
/// `max_payload` bounds the declared length before anything is allocated.
/// Short reads and end of stream surface as [`FrameError::Io`].
pub async fn decode<R>(reader: &mut R, max_payload: usize) -> Result<Frame, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;

    let fin = header[0] & 0x80 != 0;
    let opcode = Opcode::from_u8(header[0]).ok_or(FrameError::UnknownOpcode(header[0] & 0x0F))?;
    let masked = header[1] & 0x80 != 0;

    let len = match header[1] & 0x7F {
        126 => {
            let mut ext = [0u8; 2];
            reader.read_exact(&mut ext).await?;
            u64::from(u16::from_be_bytes(ext))
        }
        127 => {
            let mut ext = [0u8; 8];
            reader.read_exact(&mut ext).await?;
            u64::from_be_bytes(ext)
        }
        short => u64::from(short),
    };
    if len > max_payload as u64 {
        return Err(FrameError::TooLarge {
            len,
            max: max_payload,
        });
    }

    let mask_key = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key).await?;
        Some(key)
    } else {
        None
    };

    #[allow(clippy::cast_possible_truncation)]
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    if let Some(key) = mask_key {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    Ok(Frame {
        fin,
        opcode,
        masked,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1 << 20;

    async fn decode_bytes(bytes: &[u8]) -> Result<Frame, FrameError> {
        let mut cursor = bytes;
        decode(&mut cursor, LIMIT).await
    }

    #[tokio::test]
    async fn round_trips_every_length_boundary() {
        for opcode in [Opcode::Text, Opcode::Close, Opcode::Ping, Opcode::Pong] {
            for len in [0usize, 1, 125, 126, 65_535, 65_536] {
                let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                let frame = decode_bytes(&encode(opcode, &payload)).await.unwrap();
                assert_eq!(frame.opcode, opcode, "opcode for len {len}");
                assert_eq!(frame.payload, payload, "payload for len {len}");
                assert!(frame.fin);
                assert!(!frame.masked);
            }
        }
    }

    #[test]
    fn header_uses_shortest_length_form() {
        assert_eq!(&encode(Opcode::Text, &[0; 125])[..2], &[0x81, 125]);
        assert_eq!(&encode(Opcode::Text, &[0; 126])[..4], &[0x81, 126, 0x00, 0x7E]);
        assert_eq!(
            &encode(Opcode::Binary, &[0; 65_536])[..10],
            &[0x82, 127, 0, 0, 0, 0, 0, 1, 0, 0]
        );
    }

    #[tokio::test]
    async fn unmasks_client_payload() {
        let key = [0x37, 0xFA, 0x21, 0x3D];
        // RFC 6455 §5.7 masked "Hello".
        let wire = [0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58];
        assert_eq!(encode_masked(Opcode::Text, b"Hello", key), wire);

        let frame = decode_bytes(&wire).await.unwrap();
        assert!(frame.masked);
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, b"Hello");
    }

    #[tokio::test]
    async fn short_read_is_an_error() {
        let mut wire = encode(Opcode::Text, b"truncated");
        wire.truncate(5);
        assert!(matches!(decode_bytes(&wire).await, Err(FrameError::Io(_))));
        assert!(matches!(decode_bytes(&[]).await, Err(FrameError::Io(_))));
    }

    #[tokio::test]
    async fn rejects_unknown_opcode() {
        let err = decode_bytes(&[0x83, 0x00]).await.unwrap_err();
        assert!(matches!(err, FrameError::UnknownOpcode(0x3)));
    }

    #[tokio::test]
    async fn rejects_oversized_declared_length() {
        let mut wire = vec![0x82, 127];
        wire.extend_from_slice(&u64::MAX.to_be_bytes());
        let err = decode_bytes(&wire).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn fin_bit_is_reported_but_not_enforced() {
        let wire = [0x01, 0x02, b'h', b'i'];
        let frame = decode_bytes(&wire).await.unwrap();
        assert!(!frame.fin);
        assert_eq!(frame.payload, b"hi");
    }
}
