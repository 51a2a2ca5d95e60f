//! Big-endian wire codec for fixed-layout protocol records.
//!
//! Every record exchanged on the wire is a flat sequence of big-endian
//! integers and fixed-width byte arrays. [`WireEncode`] and [`WireDecode`]
//! cover exactly those shapes; a record the codec cannot express simply has
//! no impl and fails to compile. Composite records are declared with
//! [`wire_struct!`], which walks the fields in declaration order for both
//! directions, so field order in the source is the wire order.

use log::*;
use std::io::ErrorKind;
use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Codec failure while reading or writing wire records.
#[derive(Debug, Error)]
pub enum WireError {
    /// Fewer bytes were available than the fixed-size target requires.
    #[error("truncated record: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    /// The underlying transport failed mid-operation.
    #[error("transport failure: {0}")]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// True when the peer closed the connection cleanly at a record boundary.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, WireError::Io(err) if err.kind() == ErrorKind::UnexpectedEof)
    }
}

/// Append the big-endian wire image of a value to a byte buffer.
pub trait WireEncode {
    fn encode(&self, out: &mut Vec<u8>);

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![];
        self.encode(&mut out);
        out
    }
}

/// Rebuild a fixed-size value from its big-endian wire image.
pub trait WireDecode: Sized {
    /// Exact number of bytes this type occupies on the wire.
    const WIRE_SIZE: usize;

    /// Decode from a buffer holding at least [`WIRE_SIZE`](Self::WIRE_SIZE)
    /// bytes. Never returns a partially populated value.
    fn decode(buf: &[u8]) -> Result<Self, WireError>;
}

macro_rules! wire_int {
    ($($ty:ty),+) => {
        $(
            impl WireEncode for $ty {
                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_be_bytes());
                }
            }

            impl WireDecode for $ty {
                const WIRE_SIZE: usize = size_of::<$ty>();

                fn decode(buf: &[u8]) -> Result<Self, WireError> {
                    let bytes = buf
                        .get(..Self::WIRE_SIZE)
                        .ok_or(WireError::Truncated {
                            needed: Self::WIRE_SIZE,
                            got: buf.len(),
                        })?;
                    Ok(<$ty>::from_be_bytes(bytes.try_into().unwrap()))
                }
            }
        )+
    };
}

wire_int!(u8, u16, u32, u64);

// Fixed-width byte arrays carry strings and binary blobs verbatim.
impl<const N: usize> WireEncode for [u8; N] {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl<const N: usize> WireDecode for [u8; N] {
    const WIRE_SIZE: usize = N;

    fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let bytes = buf.get(..N).ok_or(WireError::Truncated {
            needed: N,
            got: buf.len(),
        })?;
        Ok(bytes.try_into().unwrap())
    }
}

// Ordered sequences encode element by element; their length is carried
// out-of-band (e.g. the devlist count field), so there is no decode impl.
impl<T: WireEncode> WireEncode for [T] {
    fn encode(&self, out: &mut Vec<u8>) {
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        self.as_slice().encode(out);
    }
}

/// Declares a composite wire record. Field order in the declaration is the
/// wire order; encode and decode both walk the same field list, and
/// `WIRE_SIZE` sums the field sizes, so no implicit padding can creep in.
macro_rules! wire_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$field_meta:meta])* pub $field:ident : $ty:ty, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            $( $(#[$field_meta])* pub $field: $ty, )+
        }

        impl $crate::codec::WireEncode for $name {
            fn encode(&self, out: &mut Vec<u8>) {
                $( $crate::codec::WireEncode::encode(&self.$field, out); )+
            }
        }

        impl $crate::codec::WireDecode for $name {
            const WIRE_SIZE: usize =
                0 $( + <$ty as $crate::codec::WireDecode>::WIRE_SIZE )+;

            fn decode(buf: &[u8]) -> Result<Self, $crate::codec::WireError> {
                if buf.len() < Self::WIRE_SIZE {
                    return Err($crate::codec::WireError::Truncated {
                        needed: Self::WIRE_SIZE,
                        got: buf.len(),
                    });
                }
                let mut at = 0;
                $(
                    let width = <$ty as $crate::codec::WireDecode>::WIRE_SIZE;
                    let $field =
                        <$ty as $crate::codec::WireDecode>::decode(&buf[at..at + width])?;
                    at += width;
                )+
                let _ = at;
                Ok(Self { $( $field, )+ })
            }
        }
    };
}

pub(crate) use wire_struct;

/// Read exactly one `T` from the socket.
///
/// Zero bytes at the record boundary is a clean disconnect (reported as
/// [`WireError::Io`] with `UnexpectedEof`, see
/// [`is_disconnect`](WireError::is_disconnect)); end-of-stream in the middle
/// of a record is [`WireError::Truncated`].
pub async fn read_struct<T, S>(socket: &mut S) -> Result<T, WireError>
where
    T: WireDecode,
    S: AsyncReadExt + Unpin,
{
    let mut buf = vec![0u8; T::WIRE_SIZE];
    let mut filled = 0;
    while filled < buf.len() {
        let n = socket.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Err(WireError::Io(ErrorKind::UnexpectedEof.into()));
            }
            debug!("peer closed mid-record at {filled}/{} bytes", buf.len());
            return Err(WireError::Truncated {
                needed: T::WIRE_SIZE,
                got: filled,
            });
        }
        filled += n;
    }
    T::decode(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    wire_struct! {
        pub struct Sample {
            pub a: u16,
            pub b: u32,
            pub tag: [u8; 4],
            pub c: u8,
        }
    }

    #[test]
    fn integers_encode_big_endian() {
        assert_eq!(0x0111u16.to_bytes(), [0x01, 0x11]);
        assert_eq!(0xdead_beefu32.to_bytes(), [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(0x01u64.to_bytes(), [0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn composite_size_is_sum_of_fields() {
        assert_eq!(Sample::WIRE_SIZE, 2 + 4 + 4 + 1);
    }

    #[test]
    fn composite_round_trip() {
        let value = Sample {
            a: 0x0111,
            b: 7,
            tag: *b"ab\0\0",
            c: 0xff,
        };
        let bytes = value.to_bytes();
        assert_eq!(bytes.len(), Sample::WIRE_SIZE);
        assert_eq!(&bytes[..2], [0x01, 0x11]);
        assert_eq!(Sample::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let bytes = vec![0u8; Sample::WIRE_SIZE - 1];
        match Sample::decode(&bytes) {
            Err(WireError::Truncated { needed, got }) => {
                assert_eq!(needed, Sample::WIRE_SIZE);
                assert_eq!(got, Sample::WIRE_SIZE - 1);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn slices_encode_element_wise() {
        let items = vec![0x0102u16, 0x0304];
        assert_eq!(items.to_bytes(), [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn read_struct_mid_record_eof_is_truncated() {
        let mut socket = std::io::Cursor::new(vec![0u8; 3]);
        let err = read_struct::<Sample, _>(&mut socket).await.unwrap_err();
        assert!(matches!(err, WireError::Truncated { got: 3, .. }));
    }

    #[tokio::test]
    async fn read_struct_clean_eof_is_disconnect() {
        let mut socket = std::io::Cursor::new(vec![]);
        let err = read_struct::<Sample, _>(&mut socket).await.unwrap_err();
        assert!(err.is_disconnect());
    }
}
