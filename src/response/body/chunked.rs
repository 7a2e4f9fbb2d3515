use crate::error::BadChunkHeader;
use std::io::{BufRead, ErrorKind, Result};
use std::num::NonZeroU64;

/// Checks whether a character can legally appear in the chunk extensions section or a trailer
/// field.
fn is_chunk_ext_char(b: u8) -> bool {
	b == b'\t' || !b.is_ascii_control()
}

/// Decodes one ASCII hex digit.
fn hex_value(b: u8) -> Option<u64> {
	(b as char).to_digit(16).map(u64::from)
}

/// The different states that the decoder can be in.
#[derive(Debug, Eq, PartialEq)]
enum State {
	/// The size part of a chunk header is being read, and no characters have been seen yet.
	SizeFirst,

	/// The size part of a chunk header is being read, and at least one hex digit has been seen.
	///
	/// The contained value is the decoded chunk size read so far.
	SizeRest(u64),

	/// The chunk extensions are being read.
	///
	/// The contained value is the chunk size.
	Ext(u64),

	/// The LF at the end of a chunk header is being read.
	///
	/// The contained value is the chunk size.
	HeaderLF(u64),

	/// The chunk data is being read.
	///
	/// The contained value is the remaining chunk size.
	Data(NonZeroU64),

	/// The CR following the chunk data is being read.
	DataCR,

	/// The LF following the chunk data is being read.
	DataLF,

	/// The start of a trailer field, or the CR of the blank line ending the body, is being read.
	TrailerStart,

	/// A trailer field is being skipped.
	Trailer,

	/// The LF at the end of a trailer field is being read.
	TrailerLF,

	/// The LF of the blank line ending the body is being read.
	FinalLF,

	/// Everything has been read.
	Done,
}

/// A response body that is encoded using chunked transfer coding.
///
/// Trailer fields after the terminal chunk are read and discarded.
#[derive(Debug)]
pub(super) struct Receive {
	/// The current state.
	state: State,
}

impl Receive {
	pub(super) fn new() -> Self {
		Self {
			state: State::SizeFirst,
		}
	}

	/// Returns `true` if the entire response body, including the terminal chunk and trailers, has
	/// been received.
	pub(super) fn is_complete(&self) -> bool {
		self.state == State::Done
	}

	/// Reads and returns one byte from the socket.
	fn read_byte<R: BufRead + ?Sized>(socket: &mut R) -> Result<u8> {
		let b = match socket.fill_buf()?.first() {
			Some(b) => *b,
			None => return Err(ErrorKind::UnexpectedEof.into()),
		};
		socket.consume(1);
		Ok(b)
	}

	/// Reads one byte and checks that it is `expected`.
	fn expect_byte<R: BufRead + ?Sized>(socket: &mut R, expected: u8) -> Result<()> {
		if Self::read_byte(socket)? == expected {
			Ok(())
		} else {
			Err(BadChunkHeader::Newline.into())
		}
	}

	/// Advances the state to either [`State::Data`] or [`State::Done`].
	///
	/// This function returns `Some(n)` in the case of [`State::Data`], where `n` is the number of
	/// bytes of body data that can be fetched, or `None` in the case of [`State::Done`].
	fn advance_to_data<R: BufRead + ?Sized>(
		&mut self,
		socket: &mut R,
	) -> Result<Option<NonZeroU64>> {
		loop {
			match self.state {
				State::SizeFirst => match hex_value(Self::read_byte(socket)?) {
					Some(nybble) => self.state = State::SizeRest(nybble),
					None => return Err(BadChunkHeader::SizeNotHex.into()),
				},

				State::SizeRest(size_so_far) => match Self::read_byte(socket)? {
					b';' => self.state = State::Ext(size_so_far),
					b'\r' => self.state = State::HeaderLF(size_so_far),
					// Servers commonly pad the size with spaces before the extensions.
					b' ' | b'\t' => self.state = State::Ext(size_so_far),
					b => match hex_value(b) {
						Some(_) if size_so_far >= 0x1000_0000_0000_0000_u64 => {
							return Err(BadChunkHeader::SizeNotU64.into());
						}
						Some(nybble) => self.state = State::SizeRest((size_so_far << 4) | nybble),
						None => return Err(BadChunkHeader::SizeNotHex.into()),
					},
				},

				State::Ext(chunk_size) => match Self::read_byte(socket)? {
					b'\r' => self.state = State::HeaderLF(chunk_size),
					b if is_chunk_ext_char(b) => (),
					_ => return Err(BadChunkHeader::ExtChar.into()),
				},

				State::HeaderLF(chunk_size) => {
					Self::expect_byte(socket, b'\n')?;
					self.state = match NonZeroU64::new(chunk_size) {
						Some(n) => State::Data(n),
						None => State::TrailerStart,
					};
				}

				State::Data(chunk_remaining) => return Ok(Some(chunk_remaining)),

				State::DataCR => {
					Self::expect_byte(socket, b'\r')?;
					self.state = State::DataLF;
				}

				State::DataLF => {
					Self::expect_byte(socket, b'\n')?;
					self.state = State::SizeFirst;
				}

				State::TrailerStart => match Self::read_byte(socket)? {
					b'\r' => self.state = State::FinalLF,
					b if is_chunk_ext_char(b) => self.state = State::Trailer,
					_ => return Err(BadChunkHeader::ExtChar.into()),
				},

				State::Trailer => match Self::read_byte(socket)? {
					b'\r' => self.state = State::TrailerLF,
					b if is_chunk_ext_char(b) => (),
					_ => return Err(BadChunkHeader::ExtChar.into()),
				},

				State::TrailerLF => {
					Self::expect_byte(socket, b'\n')?;
					self.state = State::TrailerStart;
				}

				State::FinalLF => {
					Self::expect_byte(socket, b'\n')?;
					self.state = State::Done;
				}

				State::Done => return Ok(None),
			}
		}
	}

	/// Reads decoded body bytes from `socket` into `buf`.
	///
	/// A return value of zero means the body has ended.
	pub(super) fn read<R: BufRead + ?Sized>(
		&mut self,
		socket: &mut R,
		buf: &mut [u8],
	) -> Result<usize> {
		match self.advance_to_data(socket)? {
			None => Ok(0),
			Some(bytes_available) => {
				let to_read = std::cmp::min(buf.len() as u64, bytes_available.get()) as usize;
				let bytes_read = socket.read(&mut buf[..to_read])?;
				if bytes_read == 0 && to_read != 0 {
					return Err(ErrorKind::UnexpectedEof.into());
				}
				let bytes_remaining = bytes_available.get() - bytes_read as u64;
				self.state = match NonZeroU64::new(bytes_remaining) {
					Some(bytes_remaining) => State::Data(bytes_remaining),
					None => State::DataCR,
				};
				Ok(bytes_read)
			}
		}
	}
}
